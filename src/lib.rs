//! flutter-test-step: run Flutter tests as a CI step.
//!
//! The step runs `flutter test --machine`, streams the machine-readable
//! output into the `tojunit` converter while keeping a copy in memory,
//! exports both artifacts to the CI host, and optionally makes sure a
//! coverage file exists and exports it too.
//!
//! # Architecture
//!
//! - **Config**: step inputs resolved from the environment
//! - **Toolchain**: command construction and converter installation
//! - **Pipeline**: the test runner piped into the converter, with capture
//! - **Export**: deploy-directory artifacts, `envman`, result aggregation
//! - **Coverage**: the coverage-file fallback rerun
//! - **Step**: the phases above wired together
//!
//! # Example
//!
//! ```no_run
//! use flutter_test_step::{Envman, FlutterToolchain, Step, TestResultDir, config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = config::resolve()?;
//!     let step = Step::new(
//!         config.clone(),
//!         FlutterToolchain::new(&config.project_location),
//!         Envman::new(),
//!         TestResultDir::new(&config.test_results_dir),
//!     );
//!     let outcome = step.run().await?;
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

pub mod config;
pub mod coverage;
pub mod export;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod step;
pub mod toolchain;

// Re-export commonly used types
pub use config::{StepConfig, resolve};
pub use export::{EnvExporter, Envman, ResultAggregator, TestResultDir};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use step::{Step, StepError, StepOutcome};
pub use toolchain::{FlutterToolchain, Toolchain};
