//! Test-runner and converter command construction.
//!
//! A [`Toolchain`] turns resolved parameters into [`CommandSpec`]s. Building
//! a command is pure; making sure the converter is installed is a separate,
//! explicit step ([`ensure_tool`]) the caller runs once beforehand.
//!
//! | Command | Invocation |
//! |---------|------------|
//! | test | `flutter test --machine [--coverage] <extra...>` |
//! | converter | `tojunit --output <results>` |
//! | coverage rerun | `flutter test --coverage <extra...>` |
//! | converter install | `flutter pub global activate junitreport` |

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use tracing::info;

use crate::process::{self, CommandSpec, ProcessError};

/// Result type for toolchain operations.
pub type ToolchainResult<T> = Result<T, ToolchainError>;

/// Failures while making a required tool available.
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    /// The installer could not be started.
    #[error("Failed to run installer for `{tool}`: {source}")]
    InstallLaunch {
        tool: String,
        #[source]
        source: ProcessError,
    },

    /// The installer ran and exited unsuccessfully.
    #[error("Command `{tool}` failed to install, installer {status}")]
    InstallFailed { tool: String, status: ExitStatus },
}

/// An executable the step needs on `PATH`, plus how to install it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Executable name looked up on `PATH`.
    pub tool: String,

    /// Command that installs the executable.
    pub installer: CommandSpec,
}

/// Builds the commands the step runs.
///
/// [`FlutterToolchain`] is the production implementation; tests substitute
/// their own to drive the pipeline with scripted processes.
pub trait Toolchain: Send + Sync {
    /// Test-runner invocation with machine-readable output.
    ///
    /// When `generate_coverage` is set, the coverage flag precedes
    /// `extra_args`.
    fn test_command(&self, generate_coverage: bool, extra_args: &[String]) -> CommandSpec;

    /// Converter invocation reading machine output from stdin and writing
    /// the JUnit report to `results_path`.
    fn converter_command(&self, results_path: &str) -> CommandSpec;

    /// Coverage-only test-runner invocation (no machine output).
    fn coverage_command(&self, extra_args: &[String]) -> CommandSpec;

    /// The converter executable and its installer.
    fn converter_dependency(&self) -> Dependency;
}

/// Toolchain backed by the `flutter` CLI and the `tojunit` converter.
#[derive(Debug, Clone)]
pub struct FlutterToolchain {
    project_dir: PathBuf,
}

impl FlutterToolchain {
    /// Creates a toolchain whose commands run in `project_dir`.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }

    /// Directory the commands run in.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    fn flutter(&self) -> CommandSpec {
        CommandSpec::new("flutter").working_dir(&self.project_dir)
    }
}

impl Toolchain for FlutterToolchain {
    fn test_command(&self, generate_coverage: bool, extra_args: &[String]) -> CommandSpec {
        let mut cmd = self.flutter().args(["test", "--machine"]);
        if generate_coverage {
            cmd = cmd.arg("--coverage");
        }
        cmd.args(extra_args.iter().cloned())
    }

    fn converter_command(&self, results_path: &str) -> CommandSpec {
        CommandSpec::new("tojunit")
            .args(["--output", results_path])
            .working_dir(&self.project_dir)
    }

    fn coverage_command(&self, extra_args: &[String]) -> CommandSpec {
        self.flutter()
            .args(["test", "--coverage"])
            .args(extra_args.iter().cloned())
    }

    fn converter_dependency(&self) -> Dependency {
        Dependency {
            tool: "tojunit".to_string(),
            installer: self.flutter().args(["pub", "global", "activate", "junitreport"]),
        }
    }
}

/// Makes sure `dependency.tool` is resolvable on `PATH`, running its
/// installer synchronously when it is not.
///
/// Returns `true` if the installer ran. Not safe for concurrent callers.
///
/// # Errors
///
/// - [`ToolchainError::InstallLaunch`] - the installer could not start
/// - [`ToolchainError::InstallFailed`] - the installer exited non-zero
pub async fn ensure_tool(dependency: &Dependency) -> ToolchainResult<bool> {
    if which::which(&dependency.tool).is_ok() {
        return Ok(false);
    }

    info!("Command `{}` not found, installing...", dependency.tool);
    info!("$ {}", dependency.installer);

    let status = process::run(dependency.installer.clone())
        .await
        .map_err(|source| ToolchainError::InstallLaunch {
            tool: dependency.tool.clone(),
            source,
        })?;

    if !status.success() {
        return Err(ToolchainError::InstallFailed {
            tool: dependency.tool.clone(),
            status,
        });
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_test_command_without_coverage() {
        let toolchain = FlutterToolchain::new("/app");
        let cmd = toolchain.test_command(false, &strings(&["--name", "login", "test/a_test.dart"]));

        assert_eq!(cmd.program, "flutter");
        assert_eq!(cmd.args, strings(&["test", "--machine", "--name", "login", "test/a_test.dart"]));
        assert_eq!(cmd.working_dir, Some(PathBuf::from("/app")));
    }

    #[test]
    fn test_test_command_coverage_flag_precedes_extra_args() {
        let toolchain = FlutterToolchain::new("/app");
        let cmd = toolchain.test_command(true, &strings(&["test/a_test.dart"]));

        assert_eq!(
            cmd.args,
            strings(&["test", "--machine", "--coverage", "test/a_test.dart"])
        );
    }

    #[test]
    fn test_converter_command() {
        let toolchain = FlutterToolchain::new("/app");
        let cmd = toolchain.converter_command("flutter_junit_test_results.xml");

        assert_eq!(cmd.to_shell_string(), "tojunit --output flutter_junit_test_results.xml");
        assert_eq!(cmd.working_dir, Some(PathBuf::from("/app")));
    }

    #[test]
    fn test_coverage_command_has_no_machine_output() {
        let toolchain = FlutterToolchain::new("/app");
        let cmd = toolchain.coverage_command(&strings(&["--reporter", "compact"]));

        assert_eq!(cmd.args, strings(&["test", "--coverage", "--reporter", "compact"]));
        assert!(!cmd.args.contains(&"--machine".to_string()));
    }

    #[test]
    fn test_converter_dependency() {
        let dependency = FlutterToolchain::new("/app").converter_dependency();

        assert_eq!(dependency.tool, "tojunit");
        assert_eq!(
            dependency.installer.to_shell_string(),
            "flutter pub global activate junitreport"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ensure_tool_present_skips_installer() {
        let dependency = Dependency {
            tool: "sh".to_string(),
            installer: CommandSpec::new("flutter-test-step-no-such-installer"),
        };

        assert!(!ensure_tool(&dependency).await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ensure_tool_runs_installer_when_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("installed");
        let dependency = Dependency {
            tool: "flutter-test-step-missing-tool".to_string(),
            installer: CommandSpec::new("sh")
                .arg("-c")
                .arg(format!("touch '{}'", marker.display())),
        };

        assert!(ensure_tool(&dependency).await.unwrap());
        assert!(marker.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ensure_tool_installer_failure() {
        let dependency = Dependency {
            tool: "flutter-test-step-missing-tool".to_string(),
            installer: CommandSpec::new("sh").args(["-c", "exit 4"]),
        };

        let err = ensure_tool(&dependency).await.unwrap_err();
        match err {
            ToolchainError::InstallFailed { tool, status } => {
                assert_eq!(tool, "flutter-test-step-missing-tool");
                assert_eq!(status.code(), Some(4));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_ensure_tool_installer_cannot_start() {
        let dependency = Dependency {
            tool: "flutter-test-step-missing-tool".to_string(),
            installer: CommandSpec::new("flutter-test-step-no-such-installer"),
        };

        let err = ensure_tool(&dependency).await.unwrap_err();
        assert!(matches!(err, ToolchainError::InstallLaunch { .. }));
    }
}
