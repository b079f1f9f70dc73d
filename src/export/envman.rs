//! Environment export through `envman`.
//!
//! The CI host ships `envman`, which persists key/value pairs so later steps
//! of the workflow see them as environment variables:
//!
//! ```text
//! envman add --key BITRISE_FLUTTER_TESTRESULT_PATH --value /deploy/flutter_json_test_results.json
//! ```

use async_trait::async_trait;
use tracing::debug;

use super::{EnvExporter, ExportError, ExportResult};
use crate::process::{self, CommandSpec};

/// [`EnvExporter`] that shells out to `envman add`.
#[derive(Debug, Clone)]
pub struct Envman {
    program: String,
}

impl Envman {
    pub fn new() -> Self {
        Self::with_program("envman")
    }

    /// Uses `program` instead of `envman` found on `PATH`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, key: &str, value: &str) -> CommandSpec {
        CommandSpec::new(&self.program).args(["add", "--key", key, "--value", value])
    }
}

impl Default for Envman {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnvExporter for Envman {
    async fn export(&self, key: &str, value: &str) -> ExportResult<()> {
        let cmd = self.command(key, value);
        debug!("$ {}", cmd);

        let status = process::run(cmd).await.map_err(|e| ExportError::Env {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        if !status.success() {
            return Err(ExportError::Env {
                key: key.to_string(),
                reason: format!("envman {}", status),
            });
        }
        Ok(())
    }
}
