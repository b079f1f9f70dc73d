//! Coverage file fallback.
//!
//! `flutter test --machine --coverage` does not always leave a coverage
//! file behind. When that happens the tests are run once more in
//! coverage-only mode (no machine output, no pipe). Everything about the
//! workaround lives in [`ensure_coverage_file`].

use std::path::PathBuf;

use tracing::{error, info};

use crate::config::StepConfig;
use crate::process::{self, ProcessError};
use crate::toolchain::Toolchain;

/// Fatal coverage failures.
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    /// Whether the coverage file exists could not be determined.
    #[error("Failed to check coverage file ({}): {source}", .path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The coverage-only rerun could not be started or waited on.
    #[error("Running coverage command failed: {0}")]
    Rerun(#[from] ProcessError),
}

/// How the coverage file came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageOutcome {
    /// The primary test run produced it; nothing was rerun.
    AlreadyPresent,

    /// The coverage-only rerun succeeded.
    Regenerated,

    /// The coverage-only rerun exited non-zero. Soft failure: whatever
    /// coverage data exists is still exported.
    RegenerationFailed,
}

impl CoverageOutcome {
    /// Whether this outcome should fail the step.
    pub fn is_failure(self) -> bool {
        self == CoverageOutcome::RegenerationFailed
    }
}

/// Makes sure the coverage file exists, rerunning the tests at most once.
///
/// # Errors
///
/// - [`CoverageError::Inspect`] - the file's existence cannot be checked
/// - [`CoverageError::Rerun`] - the rerun cannot be started or waited on
pub async fn ensure_coverage_file<T>(
    config: &StepConfig,
    toolchain: &T,
    extra_args: &[String],
) -> Result<CoverageOutcome, CoverageError>
where
    T: Toolchain + ?Sized,
{
    let coverage_path = config.coverage_path();
    let exists = tokio::fs::try_exists(&coverage_path)
        .await
        .map_err(|source| CoverageError::Inspect {
            path: coverage_path.clone(),
            source,
        })?;
    if exists {
        return Ok(CoverageOutcome::AlreadyPresent);
    }

    let cmd = toolchain.coverage_command(extra_args);
    info!("Rerunning test command to generate coverage data");
    info!("$ {}", cmd);

    let status = process::run(cmd).await?;
    if status.success() {
        Ok(CoverageOutcome::Regenerated)
    } else {
        error!("Completing coverage command failed, {}", status);
        Ok(CoverageOutcome::RegenerationFailed)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    use crate::process::CommandSpec;
    use crate::toolchain::Dependency;

    /// Toolchain whose coverage command appends to `log` and optionally
    /// writes the coverage file.
    struct CoverageScript {
        project: PathBuf,
        log: PathBuf,
        exit_code: i32,
        writes_file: bool,
    }

    impl Toolchain for CoverageScript {
        fn test_command(&self, _generate_coverage: bool, _extra_args: &[String]) -> CommandSpec {
            CommandSpec::new("true")
        }

        fn converter_command(&self, _results_path: &str) -> CommandSpec {
            CommandSpec::new("cat")
        }

        fn coverage_command(&self, extra_args: &[String]) -> CommandSpec {
            let write = if self.writes_file {
                "mkdir -p coverage && printf 'SF:lib/main.dart\\n' > coverage/lcov.info;"
            } else {
                ""
            };
            CommandSpec::new("sh")
                .arg("-c")
                .arg(format!(
                    "echo \"$*\" >> '{}'; {} exit {}",
                    self.log.display(),
                    write,
                    self.exit_code
                ))
                .arg("coverage")
                .args(extra_args.iter().cloned())
                .working_dir(&self.project)
        }

        fn converter_dependency(&self) -> Dependency {
            Dependency {
                tool: "sh".to_string(),
                installer: CommandSpec::new("true"),
            }
        }
    }

    fn config(project: &Path) -> StepConfig {
        StepConfig {
            additional_params: String::new(),
            project_location: project.to_path_buf(),
            tests_path_pattern: String::new(),
            test_results_dir: PathBuf::from("/results"),
            deploy_dir: PathBuf::from("/deploy"),
            generate_code_coverage_files: true,
        }
    }

    fn invocations(log: &Path) -> Vec<String> {
        std::fs::read_to_string(log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_existing_file_needs_no_rerun() {
        let project = TempDir::new().unwrap();
        std::fs::create_dir_all(project.path().join("coverage")).unwrap();
        std::fs::write(project.path().join("coverage/lcov.info"), "").unwrap();
        let log = project.path().join("invocations.log");
        let toolchain = CoverageScript {
            project: project.path().to_path_buf(),
            log: log.clone(),
            exit_code: 0,
            writes_file: true,
        };

        let outcome = ensure_coverage_file(&config(project.path()), &toolchain, &[])
            .await
            .unwrap();

        assert_eq!(outcome, CoverageOutcome::AlreadyPresent);
        assert!(invocations(&log).is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_triggers_exactly_one_rerun() {
        let project = TempDir::new().unwrap();
        let log = project.path().join("invocations.log");
        let toolchain = CoverageScript {
            project: project.path().to_path_buf(),
            log: log.clone(),
            exit_code: 0,
            writes_file: true,
        };
        let extra = vec!["test/a_test.dart".to_string()];

        let outcome = ensure_coverage_file(&config(project.path()), &toolchain, &extra)
            .await
            .unwrap();

        assert_eq!(outcome, CoverageOutcome::Regenerated);
        assert_eq!(invocations(&log), vec!["test/a_test.dart"]);
        assert!(project.path().join("coverage/lcov.info").exists());
    }

    #[tokio::test]
    async fn test_uncheckable_coverage_path_does_not_rerun() {
        let dir = TempDir::new().unwrap();
        // A regular file where the project directory should be.
        let project = dir.path().join("project");
        std::fs::write(&project, "").unwrap();
        let log = dir.path().join("invocations.log");
        let toolchain = CoverageScript {
            project: dir.path().to_path_buf(),
            log: log.clone(),
            exit_code: 0,
            writes_file: true,
        };

        let err = ensure_coverage_file(&config(&project), &toolchain, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, CoverageError::Inspect { .. }));
        assert!(invocations(&log).is_empty());
    }

    #[tokio::test]
    async fn test_failed_rerun_is_soft() {
        let project = TempDir::new().unwrap();
        let log = project.path().join("invocations.log");
        let toolchain = CoverageScript {
            project: project.path().to_path_buf(),
            log: log.clone(),
            exit_code: 1,
            writes_file: false,
        };

        let outcome = ensure_coverage_file(&config(project.path()), &toolchain, &[])
            .await
            .unwrap();

        assert_eq!(outcome, CoverageOutcome::RegenerationFailed);
        assert!(outcome.is_failure());
        assert_eq!(invocations(&log).len(), 1);
    }
}
