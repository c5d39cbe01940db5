//! Sandbox ports for ephemeral remote execution environments.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::PortFuture;

/// A command to run inside a sandbox session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Shell command line.
    pub command: String,
    /// Upper bound on run time, in seconds.
    pub timeout_secs: u64,
    /// Start the command and return without waiting for it.
    #[serde(default)]
    pub background: bool,
}

impl CommandSpec {
    /// A foreground command with the given timeout.
    #[must_use]
    pub fn new(command: impl Into<String>, timeout_secs: u64) -> Self {
        Self { command: command.into(), timeout_secs, background: false }
    }

    /// A detached command; the sandbox returns as soon as it is started.
    #[must_use]
    pub fn background(command: impl Into<String>) -> Self {
        Self { command: command.into(), timeout_secs: 0, background: true }
    }
}

/// Output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Process exit code.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the command exited with code zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One live sandbox: a file store plus command runner with public ports.
pub trait SandboxSession: Send + Sync {
    /// Remote identifier of the session.
    fn id(&self) -> &str;

    /// Writes a file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected.
    fn write_file<'a>(&'a self, path: &'a str, content: &'a str) -> PortFuture<'a, ()>;

    /// Runs a command and waits for it, unless it is a background command.
    ///
    /// A non-zero exit code is reported in [`CommandOutput`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not be dispatched.
    fn run<'a>(&'a self, command: &'a CommandSpec) -> PortFuture<'a, CommandOutput>;

    /// Reads a file's text content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist.
    fn read_file<'a>(&'a self, path: &'a str) -> PortFuture<'a, String>;

    /// Public host name for a port exposed by the session.
    fn host(&self, port: u16) -> String;

    /// Tears the session down.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote side refuses the teardown.
    fn close(&self) -> PortFuture<'_, ()>;
}

/// Creates sandbox sessions.
pub trait SandboxProvider: Send + Sync {
    /// Returns `false` when no credentials are configured.
    fn is_available(&self) -> bool;

    /// Opens a new session that the remote side reaps after `lifetime`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be created.
    fn open(&self, lifetime: Duration) -> PortFuture<'_, Box<dyn SandboxSession>>;
}
