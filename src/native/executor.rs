use std::{collections::HashMap, process::Stdio, time::Duration};

use tokio::{
    fs,
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::Command,
    task::JoinHandle,
    time::{Instant, timeout},
};

use crate::core::{
    domain::{ExecutionOutcome, ExitKind, Language, LanguageProfile},
    traits::executor::Executor,
};

/// How long to wait for output pipes to drain after the child is gone.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Runs submissions by launching the language interpreter directly.
#[derive(Clone, Debug)]
pub struct NativeExecutor {
    profiles: HashMap<Language, LanguageProfile>,
}

impl NativeExecutor {
    pub fn new(profiles: HashMap<Language, LanguageProfile>) -> Self {
        NativeExecutor { profiles }
    }

    pub fn with_interpreters<T, U>(node_path: T, python_path: U) -> Self
    where
        T: Into<String>,
        U: Into<String>,
    {
        let profiles = HashMap::from([
            (
                Language::JavaScript,
                LanguageProfile {
                    interpreter_path: node_path.into(),
                    file_extension: "js".to_string(),
                    args: Vec::new(),
                },
            ),
            (
                Language::Python,
                LanguageProfile {
                    interpreter_path: python_path.into(),
                    file_extension: "py".to_string(),
                    args: Vec::new(),
                },
            ),
        ]);
        Self::new(profiles)
    }

    pub fn profile(&self, language: Language) -> Option<&LanguageProfile> {
        self.profiles.get(&language)
    }
}

#[async_trait::async_trait]
impl Executor for NativeExecutor {
    #[tracing::instrument(skip(self, code, stdin))]
    async fn run(
        &self,
        code: &str,
        language: Language,
        stdin: &[u8],
        time_limit_ms: u64,
    ) -> ExecutionOutcome {
        let Some(profile) = self.profile(language) else {
            tracing::debug!("No execution profile for {}", language);
            return ExecutionOutcome::launch_failed("Language not supported");
        };

        // Removed when dropped, on every return path below.
        let dir = match tempfile::Builder::new().prefix("arena-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                tracing::error!("Failed to create execution directory: {}", e);
                return ExecutionOutcome::launch_failed(e.to_string());
            }
        };
        let source_path = dir
            .path()
            .join(format!("solution.{}", profile.file_extension));
        if let Err(e) = fs::write(&source_path, code).await {
            tracing::error!("Failed to write source file: {}", e);
            return ExecutionOutcome::launch_failed(e.to_string());
        }

        let start_time = Instant::now();
        let mut child = match Command::new(&profile.interpreter_path)
            .args(&profile.args)
            .arg(&source_path)
            .current_dir(dir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(
                    "Failed to launch {}: {}",
                    profile.interpreter_path,
                    e
                );
                return ExecutionOutcome::launch_failed(format!(
                    "Failed to launch {}: {}",
                    profile.interpreter_path, e
                ));
            }
        };

        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);
        if let Some(mut stdin_handle) = child.stdin.take() {
            let stdin = stdin.to_vec();
            tokio::spawn(async move {
                // The child may exit without reading its input.
                let _ = stdin_handle.write_all(&stdin).await;
            });
        }

        let wait_result = timeout(Duration::from_millis(time_limit_ms), child.wait()).await;
        let exit_kind = match wait_result {
            Ok(Ok(status)) => exit_kind_of(status),
            Ok(Err(e)) => {
                tracing::error!("Failed to wait for process: {}", e);
                ExitKind::LaunchFailed {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                tracing::debug!("Time limit of {}ms exceeded, killing", time_limit_ms);
                if let Err(e) = child.kill().await {
                    tracing::error!("Failed to kill timed out process: {}", e);
                }
                ExitKind::TimedOut
            }
        };
        let elapsed = start_time.elapsed();

        let stdout_raw = collect(stdout_reader).await;
        let stderr_raw = collect(stderr_reader).await;

        ExecutionOutcome {
            exit_kind,
            stdout_raw,
            stderr_raw,
            elapsed,
            memory_kb: None,
        }
    }
}

fn spawn_reader<R>(mut pipe: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf).await;
        buf
    })
}

async fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    let Some(mut reader) = reader else {
        return Vec::new();
    };
    match timeout(PIPE_DRAIN_TIMEOUT, &mut reader).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(e)) => {
            tracing::error!("Output reader failed: {}", e);
            Vec::new()
        }
        Err(_) => {
            // A grandchild still holds the pipe open.
            reader.abort();
            Vec::new()
        }
    }
}

fn exit_kind_of(status: std::process::ExitStatus) -> ExitKind {
    if let Some(code) = status.code() {
        return ExitKind::Completed(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitKind::Signaled(signal);
        }
    }
    ExitKind::Completed(-1)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn python_path() -> String {
        std::env::var("PYTHON_PATH").unwrap_or_else(|_| "python3".to_string())
    }

    fn executor() -> NativeExecutor {
        NativeExecutor::with_interpreters("node", python_path())
    }

    const SUM_CODE: &str = "
import sys
a, b = map(int, sys.stdin.read().split())
print(a + b)
";

    #[tokio::test]
    async fn test_run_reads_stdin_and_captures_stdout() {
        let outcome = executor()
            .run(SUM_CODE, Language::Python, b"2\n3", 5000)
            .await;

        assert_eq!(outcome.exit_kind, ExitKind::Completed(0));
        assert_eq!(outcome.stdout_raw, b"5\n");
        assert!(outcome.stderr_raw.is_empty());
        assert!(outcome.elapsed > Duration::ZERO);
        assert_eq!(outcome.memory_kb, None);
    }

    #[tokio::test]
    async fn test_run_keeps_stdout_and_stderr_apart() {
        let code = "
import sys
print('out')
print('err', file=sys.stderr)
";
        let outcome = executor().run(code, Language::Python, b"", 5000).await;

        assert_eq!(outcome.exit_kind, ExitKind::Completed(0));
        assert_eq!(outcome.stdout_raw, b"out\n");
        assert_eq!(outcome.stderr_raw, b"err\n");
    }

    #[tokio::test]
    async fn test_run_reports_nonzero_exit_code() {
        let outcome = executor()
            .run("raise SystemExit(3)", Language::Python, b"", 5000)
            .await;

        assert_eq!(outcome.exit_kind, ExitKind::Completed(3));
    }

    #[tokio::test]
    async fn test_run_kills_on_time_limit() {
        let code = "
import time
print('started', flush=True)
time.sleep(10)
";
        let started = std::time::Instant::now();
        let outcome = executor().run(code, Language::Python, b"", 300).await;

        assert_eq!(outcome.exit_kind, ExitKind::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(outcome.elapsed >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_run_unsupported_language_spawns_nothing() {
        let outcome = executor()
            .run("int main() {}", Language::Cpp, b"", 1000)
            .await;

        assert_eq!(
            outcome,
            ExecutionOutcome::launch_failed("Language not supported")
        );
    }

    #[tokio::test]
    async fn test_run_missing_interpreter_fails_to_launch() {
        let executor = NativeExecutor::with_interpreters("node", "/aboba/python3");

        let outcome = executor.run(SUM_CODE, Language::Python, b"1 2", 1000).await;

        assert!(matches!(outcome.exit_kind, ExitKind::LaunchFailed { .. }));
    }

    #[tokio::test]
    async fn test_run_removes_execution_directory() {
        let code = "import os; print(os.getcwd())";

        let outcome = executor().run(code, Language::Python, b"", 5000).await;
        let dir = PathBuf::from(String::from_utf8_lossy(&outcome.stdout_raw).trim());

        assert_eq!(outcome.exit_kind, ExitKind::Completed(0));
        assert!(
            dir.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("arena-"))
        );
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_run_removes_execution_directory_after_timeout() {
        let code = "
import os, time
print(os.getcwd(), flush=True)
time.sleep(10)
";
        let outcome = executor().run(code, Language::Python, b"", 2000).await;
        let dir = PathBuf::from(String::from_utf8_lossy(&outcome.stdout_raw).trim());

        assert_eq!(outcome.exit_kind, ExitKind::TimedOut);
        assert!(!dir.as_os_str().is_empty());
        assert!(!dir.exists());
    }
}
