//! flutter-test-step CLI - Run Flutter tests and export JUnit results.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use flutter_test_step::config;
use flutter_test_step::{Envman, FlutterToolchain, Step, StepOutcome, TestResultDir};

/// Inputs are read from the environment:
/// `project_location`, `additional_params`, `tests_path_pattern`,
/// `bitrise_test_result_dir`, `generate_code_coverage_files` and
/// `BITRISE_DEPLOY_DIR`.
#[derive(Parser)]
#[command(name = "flutter-test-step")]
#[command(about = "Run Flutter tests and export JUnit results", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set up logging: {e}");
    }

    match run().await {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<StepOutcome> {
    let config = config::resolve().context("Issue with input")?;
    info!("Config:\n{}", config);

    let step = Step::new(
        config.clone(),
        FlutterToolchain::new(&config.project_location),
        Envman::new(),
        TestResultDir::new(&config.test_results_dir),
    );
    let outcome = step.run().await?;

    if outcome.test_execution_failed {
        warn!("Test run failed, results were exported anyway");
    }
    if outcome.coverage_failed {
        warn!("Coverage generation failed, partial coverage was exported");
    }
    if let Some(path) = &outcome.coverage_path {
        info!("Coverage exported to {}", path.display());
    }

    Ok(outcome)
}
