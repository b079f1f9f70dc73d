//! Step configuration resolved from the environment.
//!
//! [`resolve`] reads the process environment; [`resolve_with`] accepts any
//! lookup function so tests never touch the real environment. The
//! [`params`] submodule turns the raw inputs into the argument list handed
//! to the test runner.

pub mod params;
pub mod schema;

pub use schema::*;

use std::path::PathBuf;

/// Result type for configuration resolution.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors in the step's inputs. All of them abort the step before any
/// subprocess runs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("Required input `{0}` is not set")]
    Missing(&'static str),

    /// A directory input does not point to an existing directory.
    #[error("Input `{var}` is not a directory: {}", .path.display())]
    NotADirectory { var: &'static str, path: PathBuf },

    /// A boolean input holds something other than yes/no/true/false.
    #[error("Input `{var}` must be `yes` or `no`, got `{value}`")]
    InvalidBool { var: &'static str, value: String },
}

/// Resolves the step configuration from the process environment.
pub fn resolve() -> ConfigResult<StepConfig> {
    resolve_with(|key| std::env::var(key).ok())
}

/// Resolves the step configuration using `lookup` to read variables.
///
/// Empty values are treated as unset.
///
/// # Example
///
/// ```no_run
/// use flutter_test_step::config::resolve_with;
///
/// let config = resolve_with(|key| match key {
///     "project_location" => Some("/app".to_string()),
///     "bitrise_test_result_dir" => Some("/tmp/results".to_string()),
///     "BITRISE_DEPLOY_DIR" => Some("/tmp/deploy".to_string()),
///     _ => None,
/// })?;
/// assert!(!config.generate_code_coverage_files);
/// # Ok::<(), flutter_test_step::config::ConfigError>(())
/// ```
pub fn resolve_with<F>(lookup: F) -> ConfigResult<StepConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &'static str| lookup(var).filter(|value| !value.is_empty());
    let require = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));

    let project_location = existing_dir(PROJECT_LOCATION_VAR, require(PROJECT_LOCATION_VAR)?)?;
    let test_results_dir = existing_dir(TEST_RESULTS_DIR_VAR, require(TEST_RESULTS_DIR_VAR)?)?;
    let deploy_dir = PathBuf::from(require(DEPLOY_DIR_VAR)?);

    let generate_code_coverage_files = match get(GENERATE_COVERAGE_VAR) {
        Some(value) => parse_bool(GENERATE_COVERAGE_VAR, &value)?,
        None => false,
    };

    Ok(StepConfig {
        additional_params: get(ADDITIONAL_PARAMS_VAR).unwrap_or_default(),
        project_location,
        tests_path_pattern: get(TESTS_PATH_PATTERN_VAR).unwrap_or_default(),
        test_results_dir,
        deploy_dir,
        generate_code_coverage_files,
    })
}

fn existing_dir(var: &'static str, value: String) -> ConfigResult<PathBuf> {
    let path = PathBuf::from(value);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(ConfigError::NotADirectory { var, path })
    }
}

fn parse_bool(var: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" => Ok(true),
        "no" | "false" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(vars: HashMap<&'static str, String>) -> impl Fn(&str) -> Option<String> {
        move |key| vars.get(key).cloned()
    }

    fn base_vars(project: &TempDir, results: &TempDir) -> HashMap<&'static str, String> {
        HashMap::from([
            (
                PROJECT_LOCATION_VAR,
                project.path().to_string_lossy().into_owned(),
            ),
            (
                TEST_RESULTS_DIR_VAR,
                results.path().to_string_lossy().into_owned(),
            ),
            (DEPLOY_DIR_VAR, "/tmp/deploy".to_string()),
        ])
    }

    #[test]
    fn test_resolve_minimal_config() {
        let project = TempDir::new().unwrap();
        let results = TempDir::new().unwrap();

        let config = resolve_with(lookup_from(base_vars(&project, &results))).unwrap();

        assert_eq!(config.project_location, project.path());
        assert_eq!(config.test_results_dir, results.path());
        assert_eq!(config.deploy_dir, PathBuf::from("/tmp/deploy"));
        assert_eq!(config.additional_params, "");
        assert_eq!(config.tests_path_pattern, "");
        assert!(!config.generate_code_coverage_files);
    }

    #[test]
    fn test_resolve_all_inputs() {
        let project = TempDir::new().unwrap();
        let results = TempDir::new().unwrap();
        let mut vars = base_vars(&project, &results);
        vars.insert(ADDITIONAL_PARAMS_VAR, "--verbose --name 'a b'".to_string());
        vars.insert(TESTS_PATH_PATTERN_VAR, "test/**/*_test.dart".to_string());
        vars.insert(GENERATE_COVERAGE_VAR, "Yes".to_string());

        let config = resolve_with(lookup_from(vars)).unwrap();

        assert_eq!(config.additional_params, "--verbose --name 'a b'");
        assert_eq!(config.tests_path_pattern, "test/**/*_test.dart");
        assert!(config.generate_code_coverage_files);
    }

    #[test]
    fn test_missing_project_location() {
        let project = TempDir::new().unwrap();
        let results = TempDir::new().unwrap();
        let mut vars = base_vars(&project, &results);
        vars.remove(PROJECT_LOCATION_VAR);

        let err = resolve_with(lookup_from(vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(PROJECT_LOCATION_VAR)));
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let project = TempDir::new().unwrap();
        let results = TempDir::new().unwrap();
        let mut vars = base_vars(&project, &results);
        vars.insert(DEPLOY_DIR_VAR, String::new());

        let err = resolve_with(lookup_from(vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(DEPLOY_DIR_VAR)));
    }

    #[test]
    fn test_project_location_must_exist() {
        let project = TempDir::new().unwrap();
        let results = TempDir::new().unwrap();
        let mut vars = base_vars(&project, &results);
        let missing = project.path().join("does-not-exist");
        vars.insert(PROJECT_LOCATION_VAR, missing.to_string_lossy().into_owned());

        let err = resolve_with(lookup_from(vars)).unwrap_err();
        match err {
            ConfigError::NotADirectory { var, path } => {
                assert_eq!(var, PROJECT_LOCATION_VAR);
                assert_eq!(path, missing);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_results_dir_must_be_a_directory() {
        let project = TempDir::new().unwrap();
        let results = TempDir::new().unwrap();
        let file = results.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        let mut vars = base_vars(&project, &results);
        vars.insert(TEST_RESULTS_DIR_VAR, file.to_string_lossy().into_owned());

        let err = resolve_with(lookup_from(vars)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotADirectory {
                var: TEST_RESULTS_DIR_VAR,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_coverage_flag() {
        let project = TempDir::new().unwrap();
        let results = TempDir::new().unwrap();
        let mut vars = base_vars(&project, &results);
        vars.insert(GENERATE_COVERAGE_VAR, "maybe".to_string());

        let err = resolve_with(lookup_from(vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBool { .. }));
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn test_parse_bool_variants() {
        assert!(parse_bool("x", "yes").unwrap());
        assert!(parse_bool("x", "TRUE").unwrap());
        assert!(!parse_bool("x", "no").unwrap());
        assert!(!parse_bool("x", " false ").unwrap());
        assert!(parse_bool("x", "1").is_err());
    }

    #[test]
    fn test_derived_paths() {
        let config = StepConfig {
            additional_params: String::new(),
            project_location: PathBuf::from("foo/bar"),
            tests_path_pattern: String::new(),
            test_results_dir: PathBuf::from("/results"),
            deploy_dir: PathBuf::from("/deploy"),
            generate_code_coverage_files: false,
        };

        assert_eq!(
            config.junit_report_path(),
            PathBuf::from("foo/bar/flutter_junit_test_results.xml")
        );
        assert_eq!(config.coverage_path(), PathBuf::from("foo/bar/coverage/lcov.info"));
        assert!(config.to_string().contains("- project_location: foo/bar"));
        assert!(config.to_string().ends_with("- generate_code_coverage_files: no"));
    }
}
