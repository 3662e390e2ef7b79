use uuid::Uuid;

use crate::core::domain::{ProblemSettings, TestCase};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProblemStoreError {
    #[error("Problem {0} not found")]
    NotFound(Uuid),
    #[error("Problem store unavailable: {0}")]
    Unavailable(String),
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait ProblemStore: std::fmt::Debug + Send + Sync {
    async fn get_test_cases(&self, problem_id: Uuid) -> Result<Vec<TestCase>, ProblemStoreError>;

    async fn get_settings(&self, problem_id: Uuid) -> Result<ProblemSettings, ProblemStoreError>;

    async fn increment_total_submissions(&self, problem_id: Uuid)
    -> Result<(), ProblemStoreError>;

    async fn increment_accepted_submissions(
        &self,
        problem_id: Uuid,
    ) -> Result<(), ProblemStoreError>;
}
