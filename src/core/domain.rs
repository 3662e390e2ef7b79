use std::{fmt, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Cpp,
    JavaScript,
    Python,
    Java,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Cpp,
        Language::JavaScript,
        Language::Python,
        Language::Java,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown language: {0}")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.as_str() == s)
            .ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}

/// How a language is launched by the local runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguageProfile {
    pub interpreter_path: String,
    pub file_extension: String,
    pub args: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: Vec<u8>,
    pub expected_output: Vec<u8>,
    pub hidden: bool,
}

/// Verdict of a single test case or of a whole submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerdictCode {
    Pending,
    Running,
    #[serde(rename = "AC")]
    Accepted,
    #[serde(rename = "WA")]
    WrongAnswer,
    #[serde(rename = "TLE")]
    TimeLimitExceeded,
    #[serde(rename = "MLE")]
    MemoryLimitExceeded,
    #[serde(rename = "RE")]
    RuntimeError,
    #[serde(rename = "CE")]
    CompileError,
}

impl VerdictCode {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VerdictCode::Pending | VerdictCode::Running)
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            VerdictCode::Pending => "Pending",
            VerdictCode::Running => "Running",
            VerdictCode::Accepted => "AC",
            VerdictCode::WrongAnswer => "WA",
            VerdictCode::TimeLimitExceeded => "TLE",
            VerdictCode::MemoryLimitExceeded => "MLE",
            VerdictCode::RuntimeError => "RE",
            VerdictCode::CompileError => "CE",
        }
    }
}

impl fmt::Display for VerdictCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub index: usize,
    pub verdict: VerdictCode,
    pub time_ms: Option<f64>,
    pub memory_kb: Option<u64>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub external_token: Option<String>,
}

impl TestCaseResult {
    pub fn pending(index: usize) -> Self {
        Self {
            index,
            verdict: VerdictCode::Pending,
            time_ms: None,
            memory_kb: None,
            stdout: None,
            stderr: None,
            external_token: None,
        }
    }
}

/// Lifecycle of a submission as a whole.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionPhase {
    Created,
    Evaluating,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub problem_id: Uuid,
    pub code: String,
    pub language: Language,
    pub overall_verdict: VerdictCode,
    pub results: Vec<TestCaseResult>,
    pub total_time_ms: Option<f64>,
    pub total_memory_kb: Option<u64>,
    pub compile_output: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn new(
        user_id: Uuid,
        problem_id: Uuid,
        code: String,
        language: Language,
        test_count: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            problem_id,
            code,
            language,
            overall_verdict: VerdictCode::Pending,
            results: (0..test_count).map(TestCaseResult::pending).collect(),
            total_time_ms: None,
            total_memory_kb: None,
            compile_output: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn phase(&self) -> SubmissionPhase {
        if self.completed_at.is_some() {
            SubmissionPhase::Completed
        } else if self
            .results
            .iter()
            .all(|r| r.verdict == VerdictCode::Pending)
        {
            SubmissionPhase::Created
        } else {
            SubmissionPhase::Evaluating
        }
    }

    pub fn is_completed(&self) -> bool {
        self.phase() == SubmissionPhase::Completed
    }
}

/// How one execution ended, as seen by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitKind {
    Completed(i32),
    Signaled(i32),
    TimedOut,
    MemoryExceeded,
    /// Compile stage failure reported by a remote judge.
    CompileFailed,
    LaunchFailed { reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionOutcome {
    pub exit_kind: ExitKind,
    pub stdout_raw: Vec<u8>,
    pub stderr_raw: Vec<u8>,
    pub elapsed: Duration,
    pub memory_kb: Option<u64>,
}

impl ExecutionOutcome {
    pub fn launch_failed(reason: impl Into<String>) -> Self {
        Self {
            exit_kind: ExitKind::LaunchFailed {
                reason: reason.into(),
            },
            stdout_raw: Vec::new(),
            stderr_raw: Vec::new(),
            elapsed: Duration::ZERO,
            memory_kb: None,
        }
    }
}

/// Per-problem knobs supplied by the problem store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProblemSettings {
    pub time_limit_ms: Option<u64>,
    pub boilerplates: std::collections::HashMap<Language, String>,
}

pub const USER_CODE_MARKER: &str = "##USER_CODE##";

impl ProblemSettings {
    /// Code that actually gets executed: the harness for `language` with the
    /// user's code spliced in, or the user's code as is.
    pub fn wrap_code(&self, language: Language, code: &str) -> String {
        match self.boilerplates.get(&language) {
            Some(harness) if !harness.is_empty() => harness.replace(USER_CODE_MARKER, code),
            _ => code.to_string(),
        }
    }
}
