//! Type-safe builder for external commands
//!
//! Every program erp-migrate starts (`ssh`, `rsync`, `systemctl`, the delegate
//! scripts, package managers) is described by a [`SystemCommand`]: a program,
//! an argument vector and a child-only environment. Nothing is ever composed
//! into a local shell string, so operator input cannot be reinterpreted by a
//! shell on this host.

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::SYSTEM_COMMAND_TIMEOUT;
use crate::core::MigrateError;
use crate::logging::PROCESS_TARGET;
use crate::remote::Secret;

/// How the child's stdout/stderr are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Collect output silently; lines are logged at debug level afterwards.
    Capture,
    /// Forward every line to the run log while the command runs.
    Stream,
}

/// Builder for one external process invocation.
///
/// # Examples
///
/// ```rust,no_run
/// use erp_migrate::process::SystemCommand;
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let output = SystemCommand::new("systemctl")
///     .args(["is-active", "erp.service"])
///     .with_timeout(Some(Duration::from_secs(30)))
///     .execute()
///     .await?;
///
/// if output.success() {
///     println!("state: {}", output.stdout.trim());
/// }
/// # Ok(())
/// # }
/// ```
///
/// New commands capture output and have a 5 minute timeout.
#[derive(Clone)]
pub struct SystemCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    /// Environment entries whose values must never be logged
    secret_env: Vec<(String, Secret)>,
    output_mode: OutputMode,
    timeout_duration: Option<Duration>,
    context: Option<String>,
    progress: Option<ProgressBar>,
}

impl SystemCommand {
    /// Create a builder for `program` with default settings.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            secret_env: Vec::new(),
            output_mode: OutputMode::Capture,
            timeout_duration: Some(SYSTEM_COMMAND_TIMEOUT),
            context: None,
            progress: None,
        }
    }

    /// Set the child's working directory.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set a secret environment variable for the child only. The value is never logged.
    pub fn secret_env(mut self, key: impl Into<String>, value: &Secret) -> Self {
        self.secret_env.push((key.into(), value.clone()));
        self
    }

    /// Forward output line by line to the run log while the command runs.
    pub const fn streamed(mut self) -> Self {
        self.output_mode = OutputMode::Stream;
        self
    }

    /// Set a custom timeout (None for no timeout).
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Set a label prefixed to every log line of this command.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Show transient output (carriage-return progress) as this bar's message.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Argument vector.
    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Working directory, if set.
    #[must_use]
    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Names of all environment variables set for the child, secret ones included.
    #[must_use]
    pub fn env_keys(&self) -> Vec<&str> {
        self.env_vars
            .iter()
            .map(|(k, _)| k.as_str())
            .chain(self.secret_env.iter().map(|(k, _)| k.as_str()))
            .collect()
    }

    /// The command line as it appears in logs. Secret values never appear here.
    #[must_use]
    pub fn display_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    fn log_prefix(&self) -> String {
        self.context.as_ref().map(|ctx| format!("({ctx}) ")).unwrap_or_default()
    }

    /// Run the command to completion.
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`], not as an
    /// error. Errors are reserved for spawn failures and timeouts.
    pub async fn execute(self) -> Result<CommandOutput> {
        let start = std::time::Instant::now();
        let line = self.display_line();
        let prefix = self.log_prefix();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            tracing::trace!(target: PROCESS_TARGET, "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }
        for (key, value) in &self.secret_env {
            tracing::trace!(target: PROCESS_TARGET, "Setting env var: {}=***", key);
            cmd.env(key, value.expose());
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!(target: PROCESS_TARGET, "{}Executing command: {}", prefix, line);

        let mut child = cmd.spawn().with_context(|| format!("Failed to execute {line}"))?;
        let stdout = child.stdout.take().context("child stdout was not piped")?;
        let stderr = child.stderr.take().context("child stderr was not piped")?;

        let stream = self.output_mode == OutputMode::Stream;
        let stdout_task = tokio::spawn(pump(stdout, stream, prefix.clone(), self.progress.clone()));
        let stderr_task = tokio::spawn(pump(stderr, stream, prefix.clone(), None));

        let status = if let Some(duration) = self.timeout_duration {
            let waited = timeout(duration, child.wait()).await;
            if let Ok(result) = waited {
                result.with_context(|| format!("Failed to wait for {line}"))?
            } else {
                tracing::warn!(
                    target: PROCESS_TARGET,
                    "{}Command timed out after {} seconds: {}",
                    prefix,
                    duration.as_secs(),
                    line
                );
                let _ = child.kill().await;
                return Err(MigrateError::CommandTimeout {
                    command: line,
                    seconds: duration.as_secs(),
                }
                .into());
            }
        } else {
            child.wait().await.with_context(|| format!("Failed to wait for {line}"))?
        };

        let stdout = stdout_task.await.context("stdout reader panicked")??;
        let stderr = stderr_task.await.context("stderr reader panicked")??;

        if !stream {
            if !stdout.trim().is_empty() {
                tracing::debug!(target: PROCESS_TARGET, "{}{}", prefix, stdout.trim());
            }
            if !stderr.trim().is_empty() {
                tracing::debug!(target: PROCESS_TARGET, "{}{}", prefix, stderr.trim());
            }
        }

        if !status.success() {
            tracing::debug!(
                target: PROCESS_TARGET,
                "{}Command exited with code: {:?}",
                prefix,
                status.code()
            );
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::debug!(
                target: "erp_migrate::perf",
                "{}{} took {:.2}s",
                prefix,
                self.program,
                elapsed.as_secs_f64()
            );
        }

        Ok(CommandOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Read a child stream to the end, splitting on `\n` and `\r`.
///
/// In stream mode, `\n`-terminated lines go to the log at info level and
/// `\r`-terminated segments (progress updates) only to the progress bar.
async fn pump<R>(
    mut reader: R,
    stream: bool,
    prefix: String,
    progress: Option<ProgressBar>,
) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut collected = Vec::new();
    let mut pending = Vec::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader.read(&mut buf).await.context("Failed to read child output")?;
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&buf[..n]);
        if !stream {
            continue;
        }
        for &byte in &buf[..n] {
            if byte == b'\n' || byte == b'\r' {
                emit_line(&pending, byte == b'\r', &prefix, progress.as_ref());
                pending.clear();
            } else {
                pending.push(byte);
            }
        }
    }
    if stream && !pending.is_empty() {
        emit_line(&pending, false, &prefix, progress.as_ref());
    }

    Ok(String::from_utf8_lossy(&collected).into_owned())
}

fn emit_line(raw: &[u8], transient: bool, prefix: &str, progress: Option<&ProgressBar>) {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end();
    if line.trim().is_empty() {
        return;
    }
    if transient {
        if let Some(pb) = progress {
            pb.set_message(line.trim().to_string());
        }
        tracing::trace!(target: "erp_migrate::output", "{}{}", prefix, line);
    } else {
        if let Some(pb) = progress {
            pb.suspend(|| tracing::info!(target: "erp_migrate::output", "{}{}", prefix, line));
        } else {
            tracing::info!(target: "erp_migrate::output", "{}{}", prefix, line);
        }
    }
}

/// Result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` if the process was killed by a signal
    pub code: Option<i32>,
    /// Everything written to stdout
    pub stdout: String,
    /// Everything written to stderr
    pub stderr: String,
}

impl CommandOutput {
    /// A successful output with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given exit code and stderr.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// True if the process exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Convert a non-zero exit into [`MigrateError::CommandFailed`].
    pub fn into_result(self, command: &str) -> Result<Self, MigrateError> {
        if self.success() {
            Ok(self)
        } else {
            Err(MigrateError::CommandFailed {
                command: command.to_string(),
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}
