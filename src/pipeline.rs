//! Dual-process test pipeline.
//!
//! Runs the test runner and the converter concurrently, with the test
//! runner's stdout streamed into the converter's stdin and captured in
//! memory at the same time:
//!
//! ```text
//!   test runner ──stdout──► duplicate() ──pipe──► converter ──► JUnit report
//!                               │
//!                               └──► captured buffer (raw machine output)
//! ```
//!
//! # State machine
//!
//! ```text
//!  Idle ─► Started ─► TestRunning ─► TestDone ─► PipeClosed ─► ConverterDone ─► Finished
//! ```
//!
//! Both processes are started before either is waited on. The pipe's write
//! end is closed only once the test runner's wait has returned and the
//! duplicator has drained its stdout.
//!
//! # Failure policy
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | either process fails to start | [`PipelineError::Launch`] |
//! | test runner exits non-zero / wait fails | soft: `test_execution_failed` |
//! | converter stops reading (broken pipe) | soft: `test_execution_failed` |
//! | closing the pipe fails | [`PipelineError::ClosePipe`] |
//! | converter exits non-zero / wait fails | [`PipelineError::Conversion`] |

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::process::{CommandSpec, ProcessError, Subprocess};

/// Read size for the duplicating writer.
const CHUNK_SIZE: usize = 8 * 1024;

/// Result type for pipeline runs.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fatal pipeline failures. Test failures are not errors; see
/// [`PipelineOutcome::test_execution_failed`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A subprocess could not be started.
    #[error("Running command failed: {0}")]
    Launch(#[source] ProcessError),

    /// Closing the write end of the pipe failed.
    #[error("Closing pipe failed: {0}")]
    ClosePipe(#[source] io::Error),

    /// The converter failed, so no usable report exists.
    #[error("Converting test results to JUnit format failed: {0}")]
    Conversion(String),
}

/// What a completed pipeline run hands to the exporter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Exactly the bytes the converter received.
    pub captured: Vec<u8>,

    /// The test runner failed (non-zero exit, failed wait, or its output
    /// could not be delivered). The run still produced artifacts.
    pub test_execution_failed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Started,
    TestRunning,
    TestDone,
    PipeClosed,
    ConverterDone,
    Finished,
}

/// The test runner piped into the converter.
#[derive(Debug, Clone)]
pub struct Pipeline {
    test: CommandSpec,
    converter: CommandSpec,
}

impl Pipeline {
    /// Creates a pipeline from the two invocations.
    pub fn new(test: CommandSpec, converter: CommandSpec) -> Self {
        Self { test, converter }
    }

    /// Runs both processes to completion.
    ///
    /// # Errors
    ///
    /// See the module-level failure policy.
    pub async fn run(self) -> PipelineResult<PipelineOutcome> {
        let test = Subprocess::new(self.test).piped_stdout();
        let converter = Subprocess::new(self.converter).piped_stdin();
        transition(State::Started);

        info!("Running test");
        info!("$ {} | {}", test.spec(), converter.spec());

        let mut test = test.start().map_err(PipelineError::Launch)?;
        transition(State::TestRunning);

        let mut converter = match converter.start() {
            Ok(converter) => converter,
            Err(e) => {
                test.kill().await;
                return Err(PipelineError::Launch(e));
            }
        };

        let pipes = test
            .take_stdout()
            .and_then(|stdout| converter.take_stdin().map(|stdin| (stdout, stdin)));
        let (stdout, stdin) = match pipes {
            Ok(pipes) => pipes,
            Err(e) => {
                test.kill().await;
                converter.kill().await;
                return Err(PipelineError::Launch(e));
            }
        };

        let test_command = test.command().to_string();
        let (test_status, duplicated) = tokio::join!(test.wait(), duplicate(stdout, stdin));
        transition(State::TestDone);

        let mut test_execution_failed = false;
        match test_status {
            Ok(status) if status.success() => {}
            Ok(status) => {
                error!("Completing test command failed, `{}` {}", test_command, status);
                test_execution_failed = true;
            }
            Err(e) => {
                error!("Completing test command failed, error: {}", e);
                test_execution_failed = true;
            }
        }

        if let Some(e) = &duplicated.error {
            error!("Streaming test output to the converter failed: {}", e);
            test_execution_failed = true;
        }

        match duplicated.sink {
            Some(mut sink) => {
                let closed = close(&mut sink).await;
                // Dropping the write end is what delivers EOF to the converter.
                drop(sink);
                if let Err(e) = closed {
                    converter.kill().await;
                    return Err(PipelineError::ClosePipe(e));
                }
            }
            None => debug!("Pipe already closed after a write failure"),
        }
        transition(State::PipeClosed);

        let converter_command = converter.command().to_string();
        match converter.wait().await {
            Ok(status) if status.success() => {}
            Ok(status) => {
                return Err(PipelineError::Conversion(format!(
                    "`{}` {}",
                    converter_command, status
                )));
            }
            Err(e) => return Err(PipelineError::Conversion(e.to_string())),
        }
        transition(State::ConverterDone);

        transition(State::Finished);
        Ok(PipelineOutcome {
            captured: duplicated.captured,
            test_execution_failed,
        })
    }
}

fn transition(state: State) {
    debug!("Pipeline state: {:?}", state);
}

/// Result of draining the test runner's output.
#[derive(Debug)]
struct Duplicated<W> {
    /// Every chunk the sink accepted, in order.
    captured: Vec<u8>,

    /// The write end, still open. `None` once a write to it failed.
    sink: Option<W>,

    /// First read or write error, if any.
    error: Option<io::Error>,
}

/// Copies `source` into `sink` until EOF, keeping a copy of every chunk.
///
/// A chunk is appended to the capture only after `sink` accepted it, so the
/// capture always equals what the reader on the other end received. On a
/// write error the sink is dropped and `source` is abandoned. The sink is
/// not closed on EOF; the caller decides when.
async fn duplicate<R, W>(mut source: R, mut sink: W) -> Duplicated<W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut captured = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match source.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                return Duplicated {
                    captured,
                    sink: Some(sink),
                    error: Some(e),
                };
            }
        };

        if let Err(e) = sink.write_all(&chunk[..n]).await {
            return Duplicated {
                captured,
                sink: None,
                error: Some(e),
            };
        }
        captured.extend_from_slice(&chunk[..n]);
    }

    Duplicated {
        captured,
        sink: Some(sink),
        error: None,
    }
}

/// Flushes the write end of the pipe and shuts it down.
///
/// For a child's stdin the shutdown is a no-op; the pipe only closes once
/// the handle is dropped.
async fn close<W: AsyncWrite + Unpin>(sink: &mut W) -> io::Result<()> {
    sink.flush().await?;
    sink.shutdown().await
}
