use futures::future::join_all;
use uuid::Uuid;

use crate::core::{
    domain::{Language, TestCase, TestCaseResult, VerdictCode},
    state::{SubmissionStore, publish_completion},
    traits::{
        executor::{DispatchRequest, Dispatcher},
        problem_store::ProblemStore,
    },
};

/// Hands every test case to the remote judge. Results arrive later through
/// the callback reconciler; a test that cannot be dispatched is a runtime
/// error right away.
#[tracing::instrument(skip_all, fields(submission_id = %submission_id, language = %language))]
#[allow(clippy::too_many_arguments)]
pub async fn dispatch_submission(
    store: &SubmissionStore,
    problems: &dyn ProblemStore,
    dispatcher: &dyn Dispatcher,
    submission_id: Uuid,
    problem_id: Uuid,
    code: &str,
    language: Language,
    test_cases: &[TestCase],
    time_limit_ms: u64,
) {
    let dispatches = test_cases
        .iter()
        .enumerate()
        .map(|(index, test_case)| {
            dispatcher.dispatch(DispatchRequest {
                submission_id,
                test_case_index: index,
                code: code.to_string(),
                language,
                stdin: test_case.input.clone(),
                time_limit_ms,
            })
        });
    let tokens = join_all(dispatches).await;

    for (index, token) in tokens.into_iter().enumerate() {
        let result = match token {
            Ok(token) => TestCaseResult {
                verdict: VerdictCode::Running,
                external_token: Some(token),
                ..TestCaseResult::pending(index)
            },
            Err(e) => {
                tracing::error!(index, error = %e, "Failed to dispatch test case");
                TestCaseResult {
                    verdict: VerdictCode::RuntimeError,
                    stderr: Some(e.to_string()),
                    ..TestCaseResult::pending(index)
                }
            }
        };

        match store.apply(submission_id, result).await {
            Ok(applied) => publish_completion(problems, problem_id, applied).await,
            Err(e) => tracing::error!(index, error = %e, "Failed to record dispatch"),
        }
    }
}
