//! Step input definitions.
//!
//! The step is configured entirely through environment variables set by the
//! CI orchestrator. Each input maps to one field of [`StepConfig`]:
//!
//! | Variable | Field | Required | Default |
//! |----------|-------|----------|---------|
//! | `additional_params` | `additional_params` | no | empty |
//! | `project_location` | `project_location` | yes (existing dir) | |
//! | `tests_path_pattern` | `tests_path_pattern` | no | empty |
//! | `bitrise_test_result_dir` | `test_results_dir` | yes (existing dir) | |
//! | `generate_code_coverage_files` | `generate_code_coverage_files` | no | `no` |
//! | `BITRISE_DEPLOY_DIR` | `deploy_dir` | yes | |

use std::fmt;
use std::path::PathBuf;

/// Extra arguments appended to `flutter test`.
pub const ADDITIONAL_PARAMS_VAR: &str = "additional_params";

/// Root directory of the Flutter project.
pub const PROJECT_LOCATION_VAR: &str = "project_location";

/// Glob selecting test files, relative to the project root.
pub const TESTS_PATH_PATTERN_VAR: &str = "tests_path_pattern";

/// Directory the CI test-result aggregator collects reports from.
pub const TEST_RESULTS_DIR_VAR: &str = "bitrise_test_result_dir";

/// Whether to collect code coverage (`yes`/`no`).
pub const GENERATE_COVERAGE_VAR: &str = "generate_code_coverage_files";

/// Directory where build artifacts are collected.
pub const DEPLOY_DIR_VAR: &str = "BITRISE_DEPLOY_DIR";

/// File the converter writes, relative to the project root.
pub const JUNIT_REPORT_FILE_NAME: &str = "flutter_junit_test_results.xml";

/// Coverage file `flutter test --coverage` writes, relative to the project root.
pub const COVERAGE_FILE: &str = "coverage/lcov.info";

/// Resolved step configuration.
///
/// Created once at startup by [`resolve`](super::resolve) and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepConfig {
    /// Raw, untokenized extra arguments for the test runner.
    pub additional_params: String,

    /// Project root; all tools run from here.
    pub project_location: PathBuf,

    /// Test file glob. Empty means "let the test runner decide".
    pub tests_path_pattern: String,

    /// Aggregated test-result directory.
    pub test_results_dir: PathBuf,

    /// Artifact deploy directory.
    pub deploy_dir: PathBuf,

    /// Collect and export coverage data.
    pub generate_code_coverage_files: bool,
}

impl StepConfig {
    /// Path of the JUnit report produced by the converter.
    pub fn junit_report_path(&self) -> PathBuf {
        self.project_location.join(JUNIT_REPORT_FILE_NAME)
    }

    /// Path of the coverage data file produced by the test runner.
    pub fn coverage_path(&self) -> PathBuf {
        self.project_location.join(COVERAGE_FILE)
    }
}

impl fmt::Display for StepConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- {}: {}", ADDITIONAL_PARAMS_VAR, self.additional_params)?;
        writeln!(f, "- {}: {}", PROJECT_LOCATION_VAR, self.project_location.display())?;
        writeln!(f, "- {}: {}", TESTS_PATH_PATTERN_VAR, self.tests_path_pattern)?;
        writeln!(f, "- {}: {}", TEST_RESULTS_DIR_VAR, self.test_results_dir.display())?;
        writeln!(f, "- {}: {}", DEPLOY_DIR_VAR, self.deploy_dir.display())?;
        write!(
            f,
            "- {}: {}",
            GENERATE_COVERAGE_VAR,
            if self.generate_code_coverage_files { "yes" } else { "no" }
        )
    }
}
