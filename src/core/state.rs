use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::{
    domain::{Submission, TestCase, TestCaseResult, VerdictCode},
    traits::problem_store::ProblemStore,
    verdict::{ScoringPolicy, aggregate, totals},
};

/// Which driver produces results for a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Driver {
    Local,
    Remote,
}

/// A submission together with what is needed to judge its callbacks.
#[derive(Debug)]
pub struct SubmissionRecord {
    pub submission: Submission,
    pub test_cases: Arc<[TestCase]>,
    pub policy: ScoringPolicy,
    pub driver: Driver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Recorded,
    /// This write completed the submission with the given verdict.
    Finalized(VerdictCode),
    /// The write would have regressed a terminal state and was dropped.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error("Submission {0} not found")]
    SubmissionNotFound(Uuid),
    #[error("Test case {index} not found, submission has {count}")]
    IndexOutOfRange { index: usize, count: usize },
}

impl SubmissionRecord {
    pub fn expected_output(&self, index: usize) -> Option<&[u8]> {
        self.test_cases
            .get(index)
            .map(|tc| tc.expected_output.as_slice())
    }

    /// Writes one per-test result and finalizes the submission if it was the
    /// last non-terminal one. Completed submissions only ever gain a missing
    /// external token.
    pub fn apply(&mut self, mut result: TestCaseResult) -> Result<Applied, ApplyError> {
        let count = self.submission.results.len();
        let index = result.index;
        let Some(current) = self.submission.results.get_mut(index) else {
            return Err(ApplyError::IndexOutOfRange { index, count });
        };

        let completed = self.submission.completed_at.is_some();
        if completed || (current.verdict.is_terminal() && !result.verdict.is_terminal()) {
            // A late dispatch still fills in the token of an already judged test.
            if current.external_token.is_none() {
                current.external_token = result.external_token;
            }
            return Ok(Applied::Ignored);
        }

        if result.external_token.is_none() {
            result.external_token = current.external_token.take();
        }
        *current = result;

        if !self.submission.results.iter().all(|r| r.verdict.is_terminal()) {
            if self.submission.overall_verdict == VerdictCode::Pending {
                self.submission.overall_verdict = VerdictCode::Running;
            }
            return Ok(Applied::Recorded);
        }

        Ok(self.finalize())
    }

    fn finalize(&mut self) -> Applied {
        let submission = &mut self.submission;
        let Some(verdict) = aggregate(submission.results.iter().map(|r| r.verdict)) else {
            return Applied::Recorded;
        };
        let (time_ms, memory_kb) = totals(&submission.results);

        submission.overall_verdict = verdict;
        submission.total_time_ms = Some(time_ms);
        submission.total_memory_kb = Some(memory_kb);
        submission.completed_at = Some(Utc::now());

        tracing::info!(
            submission_id = %submission.id,
            verdict = %verdict,
            total_time_ms = time_ms,
            total_memory_kb = memory_kb,
            "Submission completed"
        );

        Applied::Finalized(verdict)
    }
}

/// All live submissions, each behind its own lock.
#[derive(Debug, Default)]
pub struct SubmissionStore {
    records: DashMap<Uuid, Arc<Mutex<SubmissionRecord>>>,
}

impl SubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: SubmissionRecord) {
        let id = record.submission.id;
        self.records.insert(id, Arc::new(Mutex::new(record)));
    }

    pub fn record(&self, id: Uuid) -> Option<Arc<Mutex<SubmissionRecord>>> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<Submission> {
        let record = self.record(id)?;
        let record = record.lock().await;
        Some(record.submission.clone())
    }

    pub async fn apply(&self, id: Uuid, result: TestCaseResult) -> Result<Applied, ApplyError> {
        let record = self.record(id).ok_or(ApplyError::SubmissionNotFound(id))?;
        let mut record = record.lock().await;
        record.apply(result)
    }

    pub async fn set_compile_output(&self, id: Uuid, output: String) {
        if let Some(record) = self.record(id) {
            let mut record = record.lock().await;
            if record.submission.compile_output.is_none() {
                record.submission.compile_output = Some(output);
            }
        }
    }

    /// Newest first, at most `limit` entries.
    pub async fn list_for_user(&self, user_id: Uuid, limit: usize) -> Vec<Submission> {
        let records: Vec<_> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut submissions = Vec::new();
        for record in records {
            let record = record.lock().await;
            if record.submission.user_id == user_id {
                submissions.push(record.submission.clone());
            }
        }

        submissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        submissions.truncate(limit);
        submissions
    }
}

/// Side effects of a submission reaching a terminal verdict.
pub async fn publish_completion(problems: &dyn ProblemStore, problem_id: Uuid, applied: Applied) {
    if applied != Applied::Finalized(VerdictCode::Accepted) {
        return;
    }
    if let Err(e) = problems.increment_accepted_submissions(problem_id).await {
        tracing::error!(
            problem_id = %problem_id,
            error = %e,
            "Failed to increment accepted submissions"
        );
    }
}
