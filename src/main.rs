use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arena_judge::{
    config::{JudgeConfig, JudgeMode},
    core::{
        domain::Language,
        engine::{Backend, EngineSettings, JudgeEngine},
    },
    native::executor::NativeExecutor,
    remote::judge0::Judge0Dispatcher,
    store::memory::{InMemoryProblemStore, ProblemDefinition},
};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Judge a solution file against a problem's test cases.
///
/// In local mode (`ARENA_JUDGE_MODE=local`, the default) the solution is run
/// here and the finished submission is printed. In remote mode the tests are
/// only dispatched to Judge0: the printed submission is still `Running` and
/// carries one token per test. Results are delivered to `ARENA_CALLBACK_URL`,
/// which this command does not serve.
#[derive(Debug, Parser)]
#[command(name = "arena-judge")]
struct Args {
    /// Problem file with test cases (JSON)
    #[arg(long)]
    problem: PathBuf,
    /// Source file to judge
    #[arg(long)]
    solution: PathBuf,
    /// cpp, javascript, python or java
    #[arg(long)]
    language: Language,
    #[arg(long, default_value_t = Uuid::nil())]
    user: Uuid,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    set_panic_hook();

    let args = Args::parse();
    let config = JudgeConfig::from_env()?;
    tracing::debug!("Loaded config: {:?}", config);

    let definition: ProblemDefinition =
        serde_json::from_str(&tokio::fs::read_to_string(&args.problem).await?)?;
    let code = tokio::fs::read_to_string(&args.solution).await?;

    let problems = Arc::new(InMemoryProblemStore::new());
    let problem_id = problems.insert_definition(definition);

    let backend = match &config.mode {
        JudgeMode::Local => Backend::Local(Arc::new(NativeExecutor::with_interpreters(
            config.node_path.clone(),
            config.python_path.clone(),
        ))),
        JudgeMode::Remote {
            judge0_url,
            callback_url,
        } => {
            tracing::warn!(
                %callback_url,
                "Remote mode only dispatches; results arrive at the callback URL"
            );
            Backend::Remote(Arc::new(Judge0Dispatcher::new(
                judge0_url.clone(),
                callback_url.clone(),
                Duration::from_millis(config.dispatch_timeout_ms),
            )?))
        }
    };
    let engine = JudgeEngine::new(problems, backend, EngineSettings::from(&config));

    let submission_id = engine
        .submit(args.user, problem_id, code, args.language)
        .await?;
    let submission = engine.get_status_for(args.user, submission_id).await?;
    tracing::info!(
        %submission_id,
        verdict = %submission.overall_verdict,
        "Submission processed"
    );

    println!("{}", serde_json::to_string_pretty(&submission)?);

    Ok(())
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_help_explains_remote_mode_only_dispatches() {
        let help = Args::command().render_long_help().to_string();

        assert!(help.contains("only dispatched to Judge0"));
        assert!(help.contains("ARENA_CALLBACK_URL"));
    }

    #[test]
    fn test_args_parse_language() {
        let args = Args::try_parse_from([
            "arena-judge",
            "--problem",
            "problem.json",
            "--solution",
            "solution.py",
            "--language",
            "python",
        ])
        .unwrap();

        assert_eq!(args.language, Language::Python);
        assert_eq!(args.user, Uuid::nil());
    }
}
