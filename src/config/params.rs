//! Test-runner argument assembly.
//!
//! The additional-arguments input is split like a POSIX shell would split
//! it, then the expanded test-file glob is appended. Order is preserved and
//! becomes the literal argument order of `flutter test`.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use super::StepConfig;

/// The additional-arguments input could not be split into words.
#[derive(Debug, thiserror::Error)]
#[error("Failed to parse additional parameters: {0}")]
pub struct ParseError(#[from] shell_words::ParseError);

/// Splits `raw` into shell words, honoring single/double quotes and escapes.
///
/// # Errors
///
/// Returns [`ParseError`] on unbalanced quoting.
///
/// # Example
///
/// ```
/// use flutter_test_step::config::params::tokenize;
///
/// assert!(tokenize("").unwrap().is_empty());
/// assert_eq!(tokenize("--foo 'a b'").unwrap(), vec!["--foo", "a b"]);
/// ```
pub fn tokenize(raw: &str) -> Result<Vec<String>, ParseError> {
    Ok(shell_words::split(raw)?)
}

/// Expands `pattern` below `root` and returns matches relative to `root`.
///
/// An empty pattern, an invalid pattern, or a pattern with no matches all
/// yield an empty list. Results are sorted.
pub fn expand_glob(root: &Path, pattern: &str) -> Vec<String> {
    if pattern.is_empty() {
        return Vec::new();
    }

    let base = without_cur_dir(root);
    let root_str = base.to_string_lossy();
    let full_pattern = if root_str.is_empty() {
        pattern.to_string()
    } else {
        format!(
            "{}/{}",
            glob::Pattern::escape(root_str.trim_end_matches('/')),
            pattern
        )
    };

    let paths = match glob::glob(&full_pattern) {
        Ok(paths) => paths,
        Err(e) => {
            warn!("Couldn't expand pattern: {}: {}", pattern, e);
            return Vec::new();
        }
    };

    let mut matches: Vec<String> = paths
        .filter_map(|entry| entry.ok())
        .filter_map(|path| relative_to(&path, root))
        .collect();
    matches.sort();

    debug!("Pattern {} matched {} paths", pattern, matches.len());
    matches
}

/// Returns `path` relative to `root`, ignoring `.` components on both
/// sides. `glob` drops a leading `./` from its matches, so `./proj` must
/// still strip `proj/test/a_test.dart`.
fn relative_to(path: &Path, root: &Path) -> Option<String> {
    let path = without_cur_dir(path);
    let root = without_cur_dir(root);
    let rel = path.strip_prefix(&root).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    Some(rel.to_string_lossy().into_owned())
}

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| *c != Component::CurDir)
        .collect()
}

/// Builds the extra test-runner arguments for `config`: tokenized
/// additional parameters followed by the expanded test paths.
pub fn additional_params(config: &StepConfig) -> Result<Vec<String>, ParseError> {
    let mut params = tokenize(&config.additional_params)?;
    params.extend(expand_glob(
        &config.project_location,
        &config.tests_path_pattern,
    ));
    Ok(params)
}
