//! External process execution
//!
//! All side effects outside this process go through [`CommandRunner`]. The
//! production implementation, [`SystemRunner`], executes a [`SystemCommand`]
//! with tokio; tests substitute a recording runner with scripted responses
//! (see `test_utils`). Commands run strictly one at a time: every caller
//! awaits the result before issuing the next command.

pub mod command_builder;

pub use command_builder::{CommandOutput, OutputMode, SystemCommand};

use anyhow::Result;
use std::future::Future;

/// Executes external commands on behalf of the migration steps.
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion and return its output.
    ///
    /// Implementations report a non-zero exit through [`CommandOutput`], and
    /// return `Err` only when the command could not be run at all.
    fn run(&self, command: SystemCommand) -> impl Future<Output = Result<CommandOutput>> + Send;
}

/// Runs commands on the local system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Create a runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, command: SystemCommand) -> Result<CommandOutput> {
        command.execute().await
    }
}

impl<R: CommandRunner> CommandRunner for &R {
    fn run(&self, command: SystemCommand) -> impl Future<Output = Result<CommandOutput>> + Send {
        (**self).run(command)
    }
}
