use std::sync::Arc;

use uuid::Uuid;

use crate::{
    config::JudgeConfig,
    core::{
        callback::{CallbackError, RawOutcome, reconcile},
        domain::{Language, Submission},
        pipeline::{dispatching::dispatch_submission, judging::judge_submission},
        state::{Driver, SubmissionRecord, SubmissionStore},
        traits::{
            executor::{Dispatcher, Executor},
            problem_store::{ProblemStore, ProblemStoreError},
        },
        verdict::ScoringPolicy,
    },
};

/// Where test runs happen.
#[derive(Clone, Debug)]
pub enum Backend {
    /// Judged in process before `submit` returns.
    Local(Arc<dyn Executor>),
    /// Dispatched to a remote judge, results arrive via callbacks.
    Remote(Arc<dyn Dispatcher>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub default_time_limit_ms: u64,
    pub memory_placeholder_kb: u64,
    pub history_limit: usize,
}

impl From<&JudgeConfig> for EngineSettings {
    fn from(config: &JudgeConfig) -> Self {
        Self {
            default_time_limit_ms: config.default_time_limit_ms,
            memory_placeholder_kb: config.memory_placeholder_kb,
            history_limit: config.history_limit,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Problem(#[from] ProblemStoreError),
    #[error("Problem {0} has no test cases")]
    NoTestCases(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("Submission {0} not found")]
    NotFound(Uuid),
    #[error("Submission {0} belongs to another user")]
    Forbidden(Uuid),
}

#[derive(Debug, Clone)]
pub struct JudgeEngine {
    problems: Arc<dyn ProblemStore>,
    backend: Backend,
    submissions: Arc<SubmissionStore>,
    settings: EngineSettings,
}

impl JudgeEngine {
    pub fn new(problems: Arc<dyn ProblemStore>, backend: Backend, settings: EngineSettings) -> Self {
        Self {
            problems,
            backend,
            submissions: Arc::new(SubmissionStore::new()),
            settings,
        }
    }

    /// Creates a submission and starts judging it. With a local backend this
    /// returns after every test has a verdict; with a remote one, right after
    /// dispatch.
    #[tracing::instrument(skip(self, code))]
    pub async fn submit(
        &self,
        user_id: Uuid,
        problem_id: Uuid,
        code: String,
        language: Language,
    ) -> Result<Uuid, SubmitError> {
        let test_cases = self.problems.get_test_cases(problem_id).await?;
        if test_cases.is_empty() {
            return Err(SubmitError::NoTestCases(problem_id));
        }
        let problem_settings = self.problems.get_settings(problem_id).await?;

        let executed_code = problem_settings.wrap_code(language, &code);
        let policy = ScoringPolicy {
            time_limit_ms: problem_settings
                .time_limit_ms
                .unwrap_or(self.settings.default_time_limit_ms),
            memory_placeholder_kb: self.settings.memory_placeholder_kb,
        };
        let driver = match self.backend {
            Backend::Local(_) => Driver::Local,
            Backend::Remote(_) => Driver::Remote,
        };

        let submission = Submission::new(user_id, problem_id, code, language, test_cases.len());
        let submission_id = submission.id;
        let test_cases: Arc<[_]> = test_cases.into();
        self.submissions.insert(SubmissionRecord {
            submission,
            test_cases: test_cases.clone(),
            policy,
            driver,
        });
        tracing::info!(%submission_id, tests = test_cases.len(), "Submission created");

        if let Err(e) = self.problems.increment_total_submissions(problem_id).await {
            tracing::error!(%problem_id, error = %e, "Failed to increment total submissions");
        }

        match &self.backend {
            Backend::Local(executor) => {
                judge_submission(
                    &self.submissions,
                    self.problems.as_ref(),
                    executor.as_ref(),
                    submission_id,
                    problem_id,
                    &executed_code,
                    language,
                    &test_cases,
                    policy,
                )
                .await
            }
            Backend::Remote(dispatcher) => {
                dispatch_submission(
                    &self.submissions,
                    self.problems.as_ref(),
                    dispatcher.as_ref(),
                    submission_id,
                    problem_id,
                    &executed_code,
                    language,
                    &test_cases,
                    policy.time_limit_ms,
                )
                .await
            }
        }

        Ok(submission_id)
    }

    pub async fn get_status(&self, submission_id: Uuid) -> Option<Submission> {
        self.submissions.snapshot(submission_id).await
    }

    /// Like [`get_status`](Self::get_status), restricted to the owner.
    pub async fn get_status_for(
        &self,
        user_id: Uuid,
        submission_id: Uuid,
    ) -> Result<Submission, StatusError> {
        let submission = self
            .get_status(submission_id)
            .await
            .ok_or(StatusError::NotFound(submission_id))?;
        if submission.user_id != user_id {
            return Err(StatusError::Forbidden(submission_id));
        }
        Ok(submission)
    }

    pub async fn list_user_submissions(&self, user_id: Uuid) -> Vec<Submission> {
        self.submissions
            .list_for_user(user_id, self.settings.history_limit)
            .await
    }

    pub async fn handle_callback(
        &self,
        submission_id: Uuid,
        test_case_index: usize,
        raw: &RawOutcome,
    ) -> Result<(), CallbackError> {
        reconcile(
            &self.submissions,
            self.problems.as_ref(),
            submission_id,
            test_case_index,
            raw,
        )
        .await
    }
}
