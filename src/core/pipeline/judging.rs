use uuid::Uuid;

use crate::core::{
    domain::{Language, TestCase, TestCaseResult, VerdictCode},
    state::{Applied, SubmissionStore, publish_completion},
    traits::{executor::Executor, problem_store::ProblemStore},
    verdict::{ScoringPolicy, compile_output, score},
};

/// Runs every test case of a submission in index order, writing each result
/// before the next test starts.
#[tracing::instrument(skip_all, fields(submission_id = %submission_id, language = %language))]
#[allow(clippy::too_many_arguments)]
pub async fn judge_submission(
    store: &SubmissionStore,
    problems: &dyn ProblemStore,
    executor: &dyn Executor,
    submission_id: Uuid,
    problem_id: Uuid,
    code: &str,
    language: Language,
    test_cases: &[TestCase],
    policy: ScoringPolicy,
) {
    let mut last = Applied::Recorded;

    for (index, test_case) in test_cases.iter().enumerate() {
        let running = TestCaseResult {
            verdict: VerdictCode::Running,
            ..TestCaseResult::pending(index)
        };
        if let Err(e) = store.apply(submission_id, running).await {
            tracing::error!(index, error = %e, "Failed to mark test case running");
            return;
        }

        let outcome = executor
            .run(code, language, &test_case.input, policy.time_limit_ms)
            .await;
        if let Some(output) = compile_output(&outcome) {
            store.set_compile_output(submission_id, output).await;
        }

        let result = score(index, &outcome, &test_case.expected_output, &policy);
        tracing::debug!(index, verdict = %result.verdict, "Test case judged");

        match store.apply(submission_id, result).await {
            Ok(applied) => last = applied,
            Err(e) => {
                tracing::error!(index, error = %e, "Failed to record test case result");
                return;
            }
        }
    }

    publish_completion(problems, problem_id, last).await;
}
