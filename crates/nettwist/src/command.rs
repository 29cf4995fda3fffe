//! Running external commands.
//!
//! The latency backend drives the `tc` binary. All invocations go through
//! the [`CommandRunner`] trait so tests can swap the host binary for an
//! in-memory fake.
//!
//! Commands run on the tokio process driver and are killed when their future
//! is dropped, so a caller can bound a wedged `tc` with a timeout.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{self, Stdio};

/// Errors from running an external command.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The command could not be spawned.
    #[error("run {command}: {source}")]
    Io {
        /// The command line.
        command: String,
        /// The spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The command exited unsuccessfully.
    #[error("{command} failed ({}): `{}`", .output.describe_status(), .output.combined().trim())]
    NonZero {
        /// The command line.
        command: String,
        /// What the command produced.
        output: Output,
    },
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    /// A successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }

    fn describe_status(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {code}"),
            None => "killed by signal".to_string(),
        }
    }
}

impl From<process::Output> for Output {
    fn from(value: process::Output) -> Self {
        Self {
            code: value.status.code(),
            stdout: String::from_utf8_lossy(&value.stdout).to_string(),
            stderr: String::from_utf8_lossy(&value.stderr).to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Future returned by [`CommandRunner::run`].
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<Output>> + Send + 'a>>;

/// Something that can locate and run programs.
pub trait CommandRunner: Send + Sync + fmt::Debug {
    /// Resolve `program` to an executable path, searching `PATH` for bare names.
    fn resolve(&self, program: &str) -> Option<PathBuf>;

    /// Run `program` with `args`, failing on a non-zero exit status.
    ///
    /// Dropping the future before it completes kills the child.
    fn run<'a>(&'a self, program: &'a Path, args: &'a [String]) -> RunFuture<'a>;
}

/// Runs commands on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn resolve(&self, program: &str) -> Option<PathBuf> {
        let candidate = Path::new(program);
        if candidate.components().count() > 1 {
            return candidate.is_file().then(|| candidate.to_path_buf());
        }

        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|path| path.is_file())
    }

    fn run<'a>(&'a self, program: &'a Path, args: &'a [String]) -> RunFuture<'a> {
        Box::pin(async move {
            let command = command_line(program, args);
            tracing::debug!(%command, "running command");

            let output: Output = tokio::process::Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|source| Error::Io {
                    command: command.clone(),
                    source,
                })?
                .into();

            if !output.success() {
                tracing::debug!(%command, stderr = %output.stderr, "command returned non-zero status");
                return Err(Error::NonZero { command, output });
            }

            Ok(output)
        })
    }
}

/// Render a command line for logs and error messages.
pub fn command_line(program: &Path, args: &[String]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}
