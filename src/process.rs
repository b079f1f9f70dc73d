//! Subprocess handles for the external tools driven by the step.
//!
//! A command is described as plain data ([`CommandSpec`]) and turned into a
//! running process in two explicit steps:
//!
//! ```text
//!   CommandSpec ──► Subprocess ──start()──► Running ──wait()──► ExitStatus
//!    (data)          (created)              (started)          (terminal)
//! ```
//!
//! [`Running::wait`] consumes the handle, so a process can only be waited on
//! after it was started, and only once.
//!
//! # Stream wiring
//!
//! By default a subprocess reads from `/dev/null` and inherits the step's
//! stdout and stderr, so tool output shows up in the CI log. The pipeline
//! asks for piped stdout (test runner) or piped stdin (converter) instead.
//!
//! A [`Running`] handle dropped without being waited on kills its process,
//! so an aborted pipeline never leaves a tool running behind the step.

use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStdin, ChildStdout};
use tracing::{debug, warn};

/// Result type for process operations.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Errors raised while starting or waiting on a subprocess.
///
/// A process that runs and exits non-zero is NOT an error at this layer;
/// callers inspect the returned [`ExitStatus`] and decide.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The executable could not be started (not found, permission denied).
    #[error("Failed to start `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the process to terminate failed.
    #[error("Failed to wait for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A stream that was configured as piped was not available.
    #[error("No {stream} pipe available for `{command}`")]
    MissingPipe {
        command: String,
        stream: &'static str,
    },
}

/// An external command described as data.
///
/// Built with a fluent API and handed to [`Subprocess::new`] to run it.
///
/// # Example
///
/// ```
/// use flutter_test_step::process::CommandSpec;
///
/// let cmd = CommandSpec::new("flutter")
///     .arg("test")
///     .args(["--machine", "test/widget test.dart"])
///     .working_dir("/app");
///
/// assert_eq!(cmd.program, "flutter");
/// assert_eq!(cmd.to_shell_string(), "flutter test --machine 'test/widget test.dart'");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program/executable to run, resolved through `PATH`.
    pub program: String,

    /// Arguments passed to the program, in order.
    pub args: Vec<String>,

    /// Working directory. `None` runs in the step's current directory.
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables, layered over the inherited environment.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Creates a command for the given program with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    /// Adds a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments, preserving their order.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Adds an environment variable for this command.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Renders the command as a shell-escaped string, for logging.
    pub fn to_shell_string(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|part| shell_words::quote(part).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_tokio(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args).kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wiring {
    Inherit,
    Piped,
    Null,
}

impl Wiring {
    fn to_stdio(self) -> Stdio {
        match self {
            Wiring::Inherit => Stdio::inherit(),
            Wiring::Piped => Stdio::piped(),
            Wiring::Null => Stdio::null(),
        }
    }
}

/// A subprocess that has been created but not started.
#[derive(Debug)]
pub struct Subprocess {
    spec: CommandSpec,
    stdin: Wiring,
    stdout: Wiring,
}

impl Subprocess {
    /// Creates a handle for `spec` with null stdin and inherited output.
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            stdin: Wiring::Null,
            stdout: Wiring::Inherit,
        }
    }

    /// Captures the process's stdout through a pipe ([`Running::take_stdout`]).
    pub fn piped_stdout(mut self) -> Self {
        self.stdout = Wiring::Piped;
        self
    }

    /// Feeds the process's stdin through a pipe ([`Running::take_stdin`]).
    pub fn piped_stdin(mut self) -> Self {
        self.stdin = Wiring::Piped;
        self
    }

    /// Returns the command this handle will run.
    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Starts the process without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Launch`] if the executable cannot be started.
    pub fn start(self) -> ProcessResult<Running> {
        let command = self.spec.to_shell_string();
        let mut cmd = self.spec.to_tokio();
        cmd.stdin(self.stdin.to_stdio());
        cmd.stdout(self.stdout.to_stdio());
        cmd.stderr(Stdio::inherit());

        let child = cmd.spawn().map_err(|source| ProcessError::Launch {
            command: command.clone(),
            source,
        })?;

        debug!("Started `{}` (pid {:?})", command, child.id());
        Ok(Running { command, child })
    }
}

/// A subprocess that has been started and not yet waited on.
#[derive(Debug)]
pub struct Running {
    command: String,
    child: Child,
}

impl Running {
    /// The printable command line of this process.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Takes the read end of the stdout pipe.
    pub fn take_stdout(&mut self) -> ProcessResult<ChildStdout> {
        self.child
            .stdout
            .take()
            .ok_or_else(|| ProcessError::MissingPipe {
                command: self.command.clone(),
                stream: "stdout",
            })
    }

    /// Takes the write end of the stdin pipe.
    pub fn take_stdin(&mut self) -> ProcessResult<ChildStdin> {
        self.child
            .stdin
            .take()
            .ok_or_else(|| ProcessError::MissingPipe {
                command: self.command.clone(),
                stream: "stdin",
            })
    }

    /// Blocks until the process terminates and returns its exit status.
    pub async fn wait(mut self) -> ProcessResult<ExitStatus> {
        let status = self.child.wait().await.map_err(|source| ProcessError::Wait {
            command: self.command.clone(),
            source,
        })?;
        debug!("`{}` finished with {}", self.command, status);
        Ok(status)
    }

    /// Kills the process and reaps it.
    ///
    /// Used when a sibling process failed to start and this one would
    /// otherwise be left running unattended.
    pub async fn kill(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill `{}`: {}", self.command, e);
        }
    }
}

/// Starts `spec` with inherited output and waits for it to finish.
pub async fn run(spec: CommandSpec) -> ProcessResult<ExitStatus> {
    Subprocess::new(spec).start()?.wait().await
}
