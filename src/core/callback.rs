use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{
    domain::{ExecutionOutcome, ExitKind, TestCaseResult, VerdictCode},
    state::{ApplyError, Driver, SubmissionStore, publish_completion},
    traits::problem_store::ProblemStore,
    verdict::{compile_output, score},
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteStatus {
    pub id: u32,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seconds {
    Text(String),
    Number(f64),
}

/// Result of one remote run as delivered to the callback endpoint.
/// Text fields are base64 encoded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOutcome {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub status: Option<RemoteStatus>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    #[serde(default)]
    pub time: Option<Seconds>,
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub exit_signal: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Missing status in callback payload")]
    MissingStatus,
    #[error("Unknown remote status id {0}")]
    UnknownStatus(u32),
    #[error("Invalid base64 in {field}: {msg}")]
    InvalidEncoding { field: &'static str, msg: String },
    #[error("Invalid time value: {0}")]
    InvalidTime(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The remote judge has not finished this run yet.
    InProgress,
    Finished(ExecutionOutcome),
}

fn decode_field(field: &'static str, value: &Option<String>) -> Result<Vec<u8>, PayloadError> {
    match value {
        None => Ok(Vec::new()),
        // Judge0 wraps long base64 output with newlines.
        Some(text) => STANDARD
            .decode(text.split_whitespace().collect::<String>())
            .map_err(|e| PayloadError::InvalidEncoding {
                field,
                msg: e.to_string(),
            }),
    }
}

fn decode_time(time: &Option<Seconds>) -> Result<Duration, PayloadError> {
    let secs = match time {
        None => return Ok(Duration::ZERO),
        Some(Seconds::Number(secs)) => *secs,
        Some(Seconds::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| PayloadError::InvalidTime(text.clone()))?,
    };
    Duration::try_from_secs_f64(secs).map_err(|_| PayloadError::InvalidTime(secs.to_string()))
}

impl RawOutcome {
    pub fn decode(&self) -> Result<Decoded, PayloadError> {
        let status = self.status.as_ref().ok_or(PayloadError::MissingStatus)?;
        let exit_kind = match status.id {
            1 | 2 => return Ok(Decoded::InProgress),
            3 | 4 => ExitKind::Completed(0),
            5 => ExitKind::TimedOut,
            6 => ExitKind::CompileFailed,
            7..=13 => match self.exit_signal {
                Some(signal) if signal != 0 => ExitKind::Signaled(signal),
                _ => ExitKind::Completed(self.exit_code.filter(|code| *code != 0).unwrap_or(1)),
            },
            14 => ExitKind::MemoryExceeded,
            other => return Err(PayloadError::UnknownStatus(other)),
        };

        let stdout_raw = decode_field("stdout", &self.stdout)?;
        let stderr_raw = if exit_kind == ExitKind::CompileFailed {
            decode_field("compile_output", &self.compile_output)?
        } else {
            decode_field("stderr", &self.stderr)?
        };

        Ok(Decoded::Finished(ExecutionOutcome {
            exit_kind,
            stdout_raw,
            stderr_raw,
            elapsed: decode_time(&self.time)?,
            memory_kb: self.memory,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackError {
    #[error("Submission {0} not found")]
    SubmissionNotFound(Uuid),
    #[error("Test case {index} of submission {submission_id} not found")]
    TestCaseNotFound { submission_id: Uuid, index: usize },
}

/// Applies one out-of-band test result to its submission.
///
/// Duplicate deliveries overwrite the stored fields; completion side effects
/// fire only for the write that finalizes the submission.
#[tracing::instrument(skip(store, problems, raw))]
pub async fn reconcile(
    store: &SubmissionStore,
    problems: &dyn ProblemStore,
    submission_id: Uuid,
    index: usize,
    raw: &RawOutcome,
) -> Result<(), CallbackError> {
    let record = store
        .record(submission_id)
        .ok_or(CallbackError::SubmissionNotFound(submission_id))?;

    let mut record = record.lock().await;
    if record.driver != Driver::Remote {
        tracing::warn!("Callback for a locally judged submission");
        return Err(CallbackError::SubmissionNotFound(submission_id));
    }
    let Some(expected) = record.expected_output(index).map(<[u8]>::to_vec) else {
        return Err(CallbackError::TestCaseNotFound {
            submission_id,
            index,
        });
    };

    let mut result = match raw.decode() {
        Ok(Decoded::InProgress) => TestCaseResult {
            verdict: VerdictCode::Running,
            ..TestCaseResult::pending(index)
        },
        Ok(Decoded::Finished(outcome)) => {
            if let Some(output) = compile_output(&outcome) {
                if !record.submission.is_completed()
                    && record.submission.compile_output.is_none()
                {
                    record.submission.compile_output = Some(output);
                }
            }
            score(index, &outcome, &expected, &record.policy)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to decode callback payload");
            TestCaseResult {
                verdict: VerdictCode::RuntimeError,
                stderr: Some(e.to_string()),
                ..TestCaseResult::pending(index)
            }
        }
    };
    result.external_token = raw.token.clone();

    let applied = record.apply(result).map_err(|e| match e {
        ApplyError::SubmissionNotFound(id) => CallbackError::SubmissionNotFound(id),
        ApplyError::IndexOutOfRange { index, .. } => CallbackError::TestCaseNotFound {
            submission_id,
            index,
        },
    })?;
    let problem_id = record.submission.problem_id;
    drop(record);

    tracing::debug!(?applied, "Callback applied");
    publish_completion(problems, problem_id, applied).await;

    Ok(())
}
