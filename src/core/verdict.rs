use crate::core::domain::{ExecutionOutcome, ExitKind, TestCaseResult, VerdictCode};

/// Which terminal verdict wins when several tests disagree. Higher rank wins.
pub const PRECEDENCE: [(VerdictCode, u8); 6] = [
    (VerdictCode::CompileError, 6),
    (VerdictCode::RuntimeError, 5),
    (VerdictCode::TimeLimitExceeded, 4),
    (VerdictCode::MemoryLimitExceeded, 3),
    (VerdictCode::WrongAnswer, 2),
    (VerdictCode::Accepted, 1),
];

pub fn precedence_rank(verdict: VerdictCode) -> Option<u8> {
    PRECEDENCE
        .iter()
        .find(|(code, _)| *code == verdict)
        .map(|(_, rank)| *rank)
}

/// Whitespace as recognised by `String.prototype.trim`: Unicode `White_Space`
/// without U+0085, plus the byte order mark.
fn is_trimmed(c: char) -> bool {
    (c.is_whitespace() && c != '\u{85}') || c == '\u{feff}'
}

/// Strips leading and trailing whitespace from program output.
///
/// Output that is not valid UTF-8 falls back to ASCII whitespace.
pub fn trim_output(output: &[u8]) -> &[u8] {
    match std::str::from_utf8(output) {
        Ok(text) => text.trim_matches(is_trimmed).as_bytes(),
        Err(_) => output.trim_ascii(),
    }
}

fn trimmed_text(output: &[u8]) -> String {
    String::from_utf8_lossy(trim_output(output)).to_string()
}

pub fn classify(outcome: &ExecutionOutcome, expected_output: &[u8]) -> VerdictCode {
    match &outcome.exit_kind {
        ExitKind::TimedOut => VerdictCode::TimeLimitExceeded,
        ExitKind::CompileFailed | ExitKind::LaunchFailed { .. } => VerdictCode::CompileError,
        ExitKind::MemoryExceeded => VerdictCode::MemoryLimitExceeded,
        ExitKind::Signaled(_) => VerdictCode::RuntimeError,
        ExitKind::Completed(code) if *code != 0 => VerdictCode::RuntimeError,
        ExitKind::Completed(_) => {
            if trim_output(&outcome.stdout_raw) == trim_output(expected_output) {
                VerdictCode::Accepted
            } else {
                VerdictCode::WrongAnswer
            }
        }
    }
}

/// Folds terminal per-test verdicts into the submission verdict.
///
/// Returns `None` for an empty set or when any verdict is still pending.
pub fn aggregate<I>(verdicts: I) -> Option<VerdictCode>
where
    I: IntoIterator<Item = VerdictCode>,
{
    let mut best: Option<(VerdictCode, u8)> = None;
    for verdict in verdicts {
        let rank = precedence_rank(verdict)?;
        if best.is_none_or(|(_, best_rank)| rank > best_rank) {
            best = Some((verdict, rank));
        }
    }
    best.map(|(verdict, _)| verdict)
}

/// Sum of per-test times and peak of per-test memory, missing values as zero.
pub fn totals(results: &[TestCaseResult]) -> (f64, u64) {
    let time = results.iter().map(|r| r.time_ms.unwrap_or(0.0)).sum();
    let memory = results
        .iter()
        .map(|r| r.memory_kb.unwrap_or(0))
        .max()
        .unwrap_or(0);
    (time, memory)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoringPolicy {
    pub time_limit_ms: u64,
    /// Recorded instead of `None` when the backend did not measure memory.
    pub memory_placeholder_kb: u64,
}

/// Classifies `outcome` and turns it into the stored result for `index`.
pub fn score(
    index: usize,
    outcome: &ExecutionOutcome,
    expected_output: &[u8],
    policy: &ScoringPolicy,
) -> TestCaseResult {
    let verdict = classify(outcome, expected_output);

    if verdict == VerdictCode::CompileError {
        return TestCaseResult {
            verdict,
            ..TestCaseResult::pending(index)
        };
    }

    let time_ms = match outcome.exit_kind {
        ExitKind::TimedOut => policy.time_limit_ms as f64,
        _ => outcome.elapsed.as_micros() as f64 / 1000.0,
    };
    let stderr = trimmed_text(&outcome.stderr_raw);

    TestCaseResult {
        index,
        verdict,
        time_ms: Some(time_ms),
        memory_kb: Some(outcome.memory_kb.unwrap_or(policy.memory_placeholder_kb)),
        stdout: Some(trimmed_text(&outcome.stdout_raw)),
        stderr: (!stderr.is_empty()).then_some(stderr),
        external_token: None,
    }
}

/// Reason shown to the user for a compile/launch failure, if any.
pub fn compile_output(outcome: &ExecutionOutcome) -> Option<String> {
    match &outcome.exit_kind {
        ExitKind::LaunchFailed { reason } => Some(reason.clone()),
        ExitKind::CompileFailed => {
            let text = trimmed_text(&outcome.stderr_raw);
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use itertools::Itertools;

    use super::*;

    fn outcome(exit_kind: ExitKind, stdout: &str) -> ExecutionOutcome {
        ExecutionOutcome {
            exit_kind,
            stdout_raw: stdout.as_bytes().to_vec(),
            stderr_raw: Vec::new(),
            elapsed: Duration::from_millis(40),
            memory_kb: None,
        }
    }

    const POLICY: ScoringPolicy = ScoringPolicy {
        time_limit_ms: 2000,
        memory_placeholder_kb: 1024,
    };

    #[test]
    fn test_classify_matching_output_is_accepted() {
        let verdict = classify(&outcome(ExitKind::Completed(0), "  5\n"), b"5");
        assert_eq!(verdict, VerdictCode::Accepted);
    }

    #[test]
    fn test_classify_any_difference_is_wrong_answer() {
        for stdout in ["6", "5 5", "", "5\n\n0"] {
            let verdict = classify(&outcome(ExitKind::Completed(0), stdout), b"5\n");
            assert_eq!(verdict, VerdictCode::WrongAnswer, "stdout {:?}", stdout);
        }
    }

    #[test]
    fn test_classify_does_not_normalize_internal_whitespace() {
        let verdict = classify(&outcome(ExitKind::Completed(0), "1  2"), b"1 2");
        assert_eq!(verdict, VerdictCode::WrongAnswer);
    }

    #[test]
    fn test_classify_crlf_line_endings_inside_output_differ() {
        // Only the ends are trimmed, so a CRLF between lines is still a mismatch.
        let verdict = classify(&outcome(ExitKind::Completed(0), "1\r\n2\r\n"), b"1\n2\n");
        assert_eq!(verdict, VerdictCode::WrongAnswer);

        let verdict = classify(&outcome(ExitKind::Completed(0), "1\r\n"), b"1\n");
        assert_eq!(verdict, VerdictCode::Accepted);
    }

    #[test]
    fn test_classify_trims_unicode_whitespace() {
        for stdout in ["5\x0b", "5\u{a0}", "\u{feff}5", "\u{3000}5\u{2028}", "\x0c5\t"] {
            let verdict = classify(&outcome(ExitKind::Completed(0), stdout), b"5");
            assert_eq!(verdict, VerdictCode::Accepted, "stdout {:?}", stdout);
        }

        let verdict = classify(&outcome(ExitKind::Completed(0), "5\u{85}"), b"5");
        assert_eq!(verdict, VerdictCode::WrongAnswer);
    }

    #[test]
    fn test_trim_output_falls_back_to_ascii_for_invalid_utf8() {
        assert_eq!(trim_output(b" \xff5\n"), b"\xff5");
        assert_eq!(trim_output("\u{a0}5\u{a0}".as_bytes()), b"5");
    }

    #[test]
    fn test_score_trims_stored_output_like_classify() {
        let result = score(0, &outcome(ExitKind::Completed(0), "5\u{a0}\x0b"), b"5", &POLICY);

        assert_eq!(result.verdict, VerdictCode::Accepted);
        assert_eq!(result.stdout.as_deref(), Some("5"));
    }

    #[test]
    fn test_classify_timeout_wins_over_output() {
        let verdict = classify(&outcome(ExitKind::TimedOut, "5"), b"5");
        assert_eq!(verdict, VerdictCode::TimeLimitExceeded);
    }

    #[test]
    fn test_classify_failures() {
        let cases = [
            (
                ExitKind::LaunchFailed {
                    reason: "no interpreter".to_string(),
                },
                VerdictCode::CompileError,
            ),
            (ExitKind::CompileFailed, VerdictCode::CompileError),
            (ExitKind::Completed(1), VerdictCode::RuntimeError),
            (ExitKind::Signaled(11), VerdictCode::RuntimeError),
            (ExitKind::MemoryExceeded, VerdictCode::MemoryLimitExceeded),
        ];

        for (exit_kind, expected) in cases {
            assert_eq!(classify(&outcome(exit_kind, "5"), b"5"), expected);
        }
    }

    #[test]
    fn test_aggregate_respects_precedence_in_any_order() {
        let verdicts = [
            VerdictCode::Accepted,
            VerdictCode::WrongAnswer,
            VerdictCode::MemoryLimitExceeded,
            VerdictCode::TimeLimitExceeded,
            VerdictCode::RuntimeError,
            VerdictCode::CompileError,
        ];

        for size in 1..=verdicts.len() {
            for subset in verdicts.iter().copied().combinations(size) {
                let expected = *subset
                    .iter()
                    .max_by_key(|v| precedence_rank(**v))
                    .unwrap();
                for order in subset.iter().copied().permutations(subset.len()) {
                    assert_eq!(aggregate(order), Some(expected));
                }
            }
        }
    }

    #[test]
    fn test_aggregate_undefined_for_empty_or_pending() {
        assert_eq!(aggregate([]), None);
        assert_eq!(
            aggregate([VerdictCode::Accepted, VerdictCode::Running]),
            None
        );
    }

    #[test]
    fn test_totals_sum_time_and_max_memory() {
        let mut first = TestCaseResult::pending(0);
        first.time_ms = Some(12.5);
        first.memory_kb = Some(2048);
        let mut second = TestCaseResult::pending(1);
        second.time_ms = Some(2000.0);
        second.memory_kb = Some(1024);
        let third = TestCaseResult::pending(2);

        assert_eq!(totals(&[first, second, third]), (2012.5, 2048));
    }

    #[test]
    fn test_score_timed_out_uses_full_limit() {
        let result = score(1, &outcome(ExitKind::TimedOut, ""), b"0", &POLICY);

        assert_eq!(result.verdict, VerdictCode::TimeLimitExceeded);
        assert_eq!(result.time_ms, Some(2000.0));
        assert_eq!(result.memory_kb, Some(1024));
    }

    #[test]
    fn test_score_compile_error_has_no_measurements() {
        let result = score(
            0,
            &ExecutionOutcome::launch_failed("Language not supported"),
            b"5",
            &POLICY,
        );

        assert_eq!(
            result,
            TestCaseResult {
                verdict: VerdictCode::CompileError,
                ..TestCaseResult::pending(0)
            }
        );
    }

    #[test]
    fn test_score_keeps_reported_memory() {
        let mut run = outcome(ExitKind::Completed(0), "5\n");
        run.memory_kb = Some(3000);
        run.stderr_raw = b"warning\n".to_vec();

        let result = score(0, &run, b"5", &POLICY);

        assert_eq!(result.verdict, VerdictCode::Accepted);
        assert_eq!(result.memory_kb, Some(3000));
        assert_eq!(result.time_ms, Some(40.0));
        assert_eq!(result.stdout.as_deref(), Some("5"));
        assert_eq!(result.stderr.as_deref(), Some("warning"));
    }
}
