use uuid::Uuid;

use crate::core::domain::{ExecutionOutcome, Language};

/// Runs one (code, stdin) pair to completion or timeout.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Executor: std::fmt::Debug + Send + Sync {
    async fn run(
        &self,
        code: &str,
        language: Language,
        stdin: &[u8],
        time_limit_ms: u64,
    ) -> ExecutionOutcome;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchRequest {
    pub submission_id: Uuid,
    pub test_case_index: usize,
    pub code: String,
    pub language: Language,
    pub stdin: Vec<u8>,
    pub time_limit_ms: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid callback URL: {0}")]
    InvalidCallbackUrl(String),
    #[error("Remote judge request failed: {0}")]
    Transport(String),
    #[error("Remote judge rejected the submission with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Hands one test run to an external judge and returns the token its
/// callback will carry. Never waits for the result itself.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Dispatcher: std::fmt::Debug + Send + Sync {
    async fn dispatch(&self, request: DispatchRequest) -> Result<String, DispatchError>;
}
