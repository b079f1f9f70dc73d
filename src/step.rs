//! The complete test step.
//!
//! [`Step`] owns its collaborators and runs the phases in order:
//!
//! 1. tokenize `additional_params` and expand `tests_path_pattern`
//! 2. make sure the converter is installed
//! 3. run the test pipeline
//! 4. export the captured output and register the JUnit report
//! 5. when requested, ensure and export the coverage file
//!
//! Fatal errors abort at the phase that raised them. Soft failures (the
//! test run or the coverage rerun failing) let every later phase run and
//! are reported through [`StepOutcome`].

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::params::{self, ParseError};
use crate::config::{JUNIT_REPORT_FILE_NAME, StepConfig};
use crate::coverage::{self, CoverageError};
use crate::export::{EnvExporter, ExportError, Exporter, ResultAggregator};
use crate::pipeline::{Pipeline, PipelineError};
use crate::report;
use crate::toolchain::{self, Toolchain, ToolchainError};

/// Fatal step failures.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Params(#[from] ParseError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Coverage(#[from] CoverageError),
}

/// Result of a step that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// The test runner failed; artifacts were still exported.
    pub test_execution_failed: bool,

    /// The coverage-only rerun failed; whatever coverage existed was still
    /// exported.
    pub coverage_failed: bool,

    /// Deployed machine-readable test output.
    pub test_result_path: PathBuf,

    /// Deployed coverage file, if coverage was requested.
    pub coverage_path: Option<PathBuf>,
}

impl StepOutcome {
    /// Whether nothing soft-failed.
    pub fn success(&self) -> bool {
        !self.test_execution_failed && !self.coverage_failed
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.success() { 0 } else { 1 }
    }
}

/// Runs the test step against injected collaborators.
pub struct Step<T, E, A> {
    config: StepConfig,
    toolchain: T,
    exporter: Exporter<E, A>,
}

impl<T, E, A> Step<T, E, A>
where
    T: Toolchain,
    E: EnvExporter,
    A: ResultAggregator,
{
    pub fn new(config: StepConfig, toolchain: T, env: E, aggregator: A) -> Self {
        Self {
            config,
            toolchain,
            exporter: Exporter::new(env, aggregator),
        }
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<StepOutcome, StepError> {
        let extra_args = params::additional_params(&self.config)?;

        let dependency = self.toolchain.converter_dependency();
        if toolchain::ensure_tool(&dependency).await? {
            info!("Installed `{}`", dependency.tool);
        }

        let pipeline = Pipeline::new(
            self.toolchain
                .test_command(self.config.generate_code_coverage_files, &extra_args),
            self.toolchain.converter_command(JUNIT_REPORT_FILE_NAME),
        );
        let outcome = pipeline.run().await?;

        let test_result_path = self
            .exporter
            .export_results(&self.config, &outcome.captured)
            .await?;

        match report::read_summary(&self.config.junit_report_path()).await {
            Ok(summary) => report::print_summary(&summary),
            Err(e) => warn!("Could not summarize test results: {:#}", e),
        }

        let mut coverage_failed = false;
        let mut coverage_path = None;
        if self.config.generate_code_coverage_files {
            let ensured = coverage::ensure_coverage_file(&self.config, &self.toolchain, &extra_args)
                .await?;
            coverage_failed = ensured.is_failure();
            coverage_path = Some(self.exporter.export_coverage(&self.config).await?);
        }

        if !outcome.test_execution_failed {
            info!("Tests finished");
        }

        Ok(StepOutcome {
            test_execution_failed: outcome.test_execution_failed,
            coverage_failed,
            test_result_path,
            coverage_path,
        })
    }
}
