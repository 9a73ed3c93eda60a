//! Command runner that records invocations and replays scripted results.

use anyhow::{Result, anyhow};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::process::{CommandOutput, CommandRunner, SystemCommand};

/// One command as the runner saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub env_keys: Vec<String>,
    /// Same text as [`SystemCommand::display_line`]
    pub line: String,
}

#[derive(Debug, Clone)]
enum Reply {
    Output(CommandOutput),
    SpawnError(String),
}

#[derive(Debug)]
struct Rule {
    pattern: String,
    reply: Reply,
    once: bool,
}

/// Records every command and answers from a list of rules.
///
/// Rules match when the command line contains their pattern. One-shot rules
/// are consulted first, in the order added, and removed when used; then
/// persistent rules, in the order added. Unmatched commands succeed with
/// empty output.
///
/// ```rust,no_run
/// use erp_migrate::process::CommandOutput;
/// use erp_migrate::test_utils::RecordingRunner;
///
/// let runner = RecordingRunner::new()
///     .respond("systemctl is-active", CommandOutput::failed(3, "inactive"))
///     .respond_once("rsync", CommandOutput::failed(23, "partial transfer"));
/// ```
#[derive(Debug, Default)]
pub struct RecordingRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<RecordedCommand>>,
}

impl RecordingRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every matching command with `output`.
    #[must_use]
    pub fn respond(self, pattern: &str, output: CommandOutput) -> Self {
        self.push(pattern, Reply::Output(output), false)
    }

    /// Answer the next matching command with `output`.
    #[must_use]
    pub fn respond_once(self, pattern: &str, output: CommandOutput) -> Self {
        self.push(pattern, Reply::Output(output), true)
    }

    /// Make every matching command fail to start.
    #[must_use]
    pub fn fail_to_spawn(self, pattern: &str) -> Self {
        let message = format!("No such file or directory: {pattern}");
        self.push(pattern, Reply::SpawnError(message), false)
    }

    fn push(self, pattern: &str, reply: Reply, once: bool) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                pattern: pattern.to_string(),
                reply,
                once,
            });
        }
        self
    }

    /// Every command run so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCommand> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Command lines run so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.line).collect()
    }

    /// Number of commands whose line contains `pattern`.
    #[must_use]
    pub fn count(&self, pattern: &str) -> usize {
        self.lines().iter().filter(|l| l.contains(pattern)).count()
    }

    /// Index of the first command whose line contains `pattern`.
    #[must_use]
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.lines().iter().position(|l| l.contains(pattern))
    }

    fn reply_for(&self, line: &str) -> Reply {
        let Ok(mut rules) = self.rules.lock() else {
            return Reply::Output(CommandOutput::ok(""));
        };
        if let Some(index) = rules.iter().position(|r| r.once && line.contains(&r.pattern)) {
            return rules.remove(index).reply;
        }
        rules
            .iter()
            .find(|r| !r.once && line.contains(&r.pattern))
            .map_or_else(|| Reply::Output(CommandOutput::ok("")), |r| r.reply.clone())
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, command: SystemCommand) -> Result<CommandOutput> {
        let line = command.display_line();
        let recorded = RecordedCommand {
            program: command.program().to_string(),
            args: command.get_args().to_vec(),
            current_dir: command.get_current_dir().map(PathBuf::from),
            env_keys: command.env_keys().into_iter().map(ToString::to_string).collect(),
            line: line.clone(),
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(recorded);
        }

        match self.reply_for(&line) {
            Reply::Output(output) => Ok(output),
            Reply::SpawnError(message) => Err(anyhow!(message)),
        }
    }
}
