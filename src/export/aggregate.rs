//! Test-result aggregation directory.
//!
//! The CI host collects every directory below its test-result root as one
//! named test run:
//!
//! ```text
//! <test_results_dir>/
//! └── Flutter test results/
//!     ├── flutter_junit_test_results.xml
//!     └── test-info.json          {"test-name":"Flutter test results"}
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ExportError, ExportResult, ResultAggregator};

/// Metadata file written next to each registered report.
pub const TEST_INFO_FILE_NAME: &str = "test-info.json";

/// Contents of [`TEST_INFO_FILE_NAME`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInfo {
    #[serde(rename = "test-name")]
    pub test_name: String,
}

/// [`ResultAggregator`] writing into the CI's test-result directory.
#[derive(Debug, Clone)]
pub struct TestResultDir {
    root: PathBuf,
}

impl TestResultDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ResultAggregator for TestResultDir {
    async fn register(&self, name: &str, report_path: &Path) -> ExportResult<()> {
        let fail = |reason: String| ExportError::Aggregation {
            name: name.to_string(),
            reason,
        };

        let file_name = report_path
            .file_name()
            .ok_or_else(|| fail(format!("invalid report path {}", report_path.display())))?;
        let exists = tokio::fs::try_exists(report_path)
            .await
            .map_err(|e| fail(format!("failed to check {}: {}", report_path.display(), e)))?;
        if !exists {
            return Err(fail(format!("report not found at {}", report_path.display())));
        }

        let run_dir = self.root.join(name);
        tokio::fs::create_dir_all(&run_dir)
            .await
            .map_err(|e| fail(format!("failed to create {}: {}", run_dir.display(), e)))?;

        let dest = run_dir.join(file_name);
        tokio::fs::copy(report_path, &dest)
            .await
            .map_err(|e| fail(format!("failed to copy report to {}: {}", dest.display(), e)))?;

        let info = TestInfo {
            test_name: name.to_string(),
        };
        let json = serde_json::to_vec(&info).map_err(|e| fail(e.to_string()))?;
        let info_path = run_dir.join(TEST_INFO_FILE_NAME);
        tokio::fs::write(&info_path, json)
            .await
            .map_err(|e| fail(format!("failed to write {}: {}", info_path.display(), e)))?;

        debug!("Registered {} in {}", report_path.display(), run_dir.display());
        Ok(())
    }
}
