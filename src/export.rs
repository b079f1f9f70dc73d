//! Artifact export.
//!
//! After the pipeline finishes, the captured machine output is written to
//! the deploy directory, its path is exported to downstream CI steps, and
//! the converted JUnit report is registered with the test-result aggregator.
//! Coverage data, when requested, is exported the same way.
//!
//! Two collaborators sit behind traits so the exporter can be exercised
//! without a CI environment:
//!
//! - [`EnvExporter`] - publishes key/value pairs ([`envman::Envman`])
//! - [`ResultAggregator`] - collects test reports ([`aggregate::TestResultDir`])
//!
//! Every failure in this module is fatal for the step.

pub mod aggregate;
pub mod envman;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::config::StepConfig;

pub use aggregate::TestResultDir;
pub use envman::Envman;

/// Deploy file name for the raw machine-readable test output.
pub const TEST_RESULT_JSON_FILE_NAME: &str = "flutter_json_test_results.json";

/// Deploy file name for the coverage data.
pub const COVERAGE_DEPLOY_FILE_NAME: &str = "flutter_coverage_lcov.info";

/// Variable holding the deployed test output path.
pub const TEST_RESULT_PATH_KEY: &str = "BITRISE_FLUTTER_TESTRESULT_PATH";

/// Variable holding the deployed coverage path.
pub const COVERAGE_PATH_KEY: &str = "BITRISE_FLUTTER_COVERAGE_PATH";

/// Display name of the registered JUnit report.
pub const TEST_NAME: &str = "Flutter test results";

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Export failures.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Writing a buffer into the deploy directory failed.
    #[error("Failed to write buffer to ({}): {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copying a file into the deploy directory failed.
    #[error("Failed to copy ({}) to ({}): {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Publishing an environment variable failed.
    #[error("Failed to export: {key}, error: {reason}")]
    Env { key: String, reason: String },

    /// Registering a report with the aggregator failed.
    #[error("Failed to export test result `{name}`: {reason}")]
    Aggregation { name: String, reason: String },
}

/// Publishes key/value pairs to later steps of the CI workflow.
#[async_trait]
pub trait EnvExporter: Send + Sync {
    /// Exports `key=value`.
    async fn export(&self, key: &str, value: &str) -> ExportResult<()>;
}

/// Collects test reports for the CI's test-result view.
#[async_trait]
pub trait ResultAggregator: Send + Sync {
    /// Registers the report at `report_path` under the display `name`.
    async fn register(&self, name: &str, report_path: &Path) -> ExportResult<()>;
}

/// Writes artifacts and publishes their locations.
pub struct Exporter<E, A> {
    env: E,
    aggregator: A,
}

impl<E, A> Exporter<E, A>
where
    E: EnvExporter,
    A: ResultAggregator,
{
    pub fn new(env: E, aggregator: A) -> Self {
        Self { env, aggregator }
    }

    /// Exports the captured test output and registers the JUnit report.
    ///
    /// Returns the deployed path of the captured output.
    pub async fn export_results(&self, config: &StepConfig, captured: &[u8]) -> ExportResult<PathBuf> {
        let deploy_path =
            write_to_deploy_dir(&config.deploy_dir, TEST_RESULT_JSON_FILE_NAME, captured).await?;
        self.env
            .export(TEST_RESULT_PATH_KEY, &deploy_path.to_string_lossy())
            .await?;
        info!("The test result JSON is available in {}", deploy_path.display());

        let report_path = config.junit_report_path();
        self.aggregator.register(TEST_NAME, &report_path).await?;
        info!("Registered {} as `{}`", report_path.display(), TEST_NAME);

        Ok(deploy_path)
    }

    /// Copies the coverage file to the deploy directory and exports its path.
    pub async fn export_coverage(&self, config: &StepConfig) -> ExportResult<PathBuf> {
        let deploy_path = copy_to_deploy_dir(
            &config.coverage_path(),
            &config.deploy_dir,
            COVERAGE_DEPLOY_FILE_NAME,
        )
        .await?;
        self.env
            .export(COVERAGE_PATH_KEY, &deploy_path.to_string_lossy())
            .await?;
        info!("The coverage data is available in {}", deploy_path.display());

        Ok(deploy_path)
    }
}

async fn write_to_deploy_dir(deploy_dir: &Path, file_name: &str, bytes: &[u8]) -> ExportResult<PathBuf> {
    let path = deploy_dir.join(file_name);
    let write_err = |source| ExportError::Write {
        path: path.clone(),
        source,
    };

    tokio::fs::create_dir_all(deploy_dir).await.map_err(write_err)?;
    tokio::fs::write(&path, bytes).await.map_err(write_err)?;
    Ok(path)
}

async fn copy_to_deploy_dir(from: &Path, deploy_dir: &Path, file_name: &str) -> ExportResult<PathBuf> {
    let to = deploy_dir.join(file_name);
    let copy_err = |source| ExportError::Copy {
        from: from.to_path_buf(),
        to: to.clone(),
        source,
    };

    tokio::fs::create_dir_all(deploy_dir).await.map_err(copy_err)?;
    tokio::fs::copy(from, &to).await.map_err(copy_err)?;
    Ok(to)
}
