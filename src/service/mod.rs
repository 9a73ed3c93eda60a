//! Application service control through systemd
//!
//! Stopping is strict: the stop request itself may fail (the unit may already
//! be stopped), but if `systemctl is-active` still exits 0 afterwards (the
//! unit is `active` or `reloading`) the run is aborted, since mirroring into a live application's storage
//! would corrupt it.
//!
//! Starting is lenient: after the start request and a short settle delay the
//! unit must be active. If it is not, the last journal lines are shown and
//! the [`RestartPolicy`] decides whether that is fatal.

use anyhow::Result;
use std::time::Duration;

use crate::config::RestartPolicy;
use crate::constants::SYSTEM_COMMAND_TIMEOUT;
use crate::core::MigrateError;
use crate::process::{CommandRunner, SystemCommand};
use crate::report::StepOutcome;

/// Result of the restart step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartResult {
    pub outcome: StepOutcome,
    /// Journal excerpt shown when the unit did not come back
    pub journal: Option<String>,
    /// Last state reported by systemd
    pub state: String,
    /// True if the policy turns this outcome into a non-zero exit
    pub fatal: bool,
}

/// Controls one systemd unit.
pub struct ServiceController<'a, R> {
    runner: &'a R,
    unit: &'a str,
    settle: Duration,
    journal_lines: u32,
}

impl<'a, R: CommandRunner> ServiceController<'a, R> {
    pub const fn new(runner: &'a R, unit: &'a str, settle: Duration, journal_lines: u32) -> Self {
        Self {
            runner,
            unit,
            settle,
            journal_lines,
        }
    }

    fn systemctl(&self, verb: &str) -> SystemCommand {
        SystemCommand::new("systemctl")
            .args([verb, self.unit])
            .with_timeout(Some(SYSTEM_COMMAND_TIMEOUT))
    }

    /// Whether `systemctl is-active` considers the unit active, and the state
    /// it printed (`active`, `reloading`, `inactive`, `failed`, ...).
    ///
    /// The exit status decides; the text is only for messages.
    ///
    /// # Errors
    ///
    /// Fails only if `systemctl` cannot be run.
    pub async fn state(&self) -> Result<(bool, String)> {
        let output = self.runner.run(self.systemctl("is-active")).await?;
        let active = output.success();
        let state = match output.stdout.trim() {
            "" if active => "active",
            "" => "unknown",
            state => state,
        };
        Ok((active, state.to_string()))
    }

    /// Stop the unit and verify it is no longer active.
    ///
    /// # Errors
    ///
    /// [`MigrateError::ServiceStillActive`] if the unit is still active.
    pub async fn stop(&self) -> Result<()> {
        tracing::info!("Stopping {}", self.unit);
        match self.runner.run(self.systemctl("stop")).await {
            Ok(output) if output.success() => {}
            Ok(output) => tracing::warn!("systemctl stop {} failed: {}", self.unit, output.stderr.trim()),
            Err(e) => tracing::warn!("systemctl stop {} could not run: {e:#}", self.unit),
        }

        let (active, state) = self.state().await?;
        if active {
            tracing::error!("{} is still {}", self.unit, state);
            return Err(MigrateError::ServiceStillActive {
                service: self.unit.to_string(),
            }
            .into());
        }
        tracing::info!("{} is stopped ({})", self.unit, state);
        Ok(())
    }

    /// Start the unit, wait, and check that it is active.
    ///
    /// Never returns an error for a unit that does not come back; the result
    /// carries the outcome and whether `policy` makes it fatal.
    ///
    /// # Errors
    ///
    /// Fails only if `systemctl` cannot be run for the status check.
    pub async fn start(&self, policy: RestartPolicy) -> Result<RestartResult> {
        tracing::info!("Starting {}", self.unit);
        match self.runner.run(self.systemctl("start")).await {
            Ok(output) if output.success() => {}
            Ok(output) => tracing::warn!("systemctl start {} failed: {}", self.unit, output.stderr.trim()),
            Err(e) => tracing::warn!("systemctl start {} could not run: {e:#}", self.unit),
        }

        if !self.settle.is_zero() {
            tracing::debug!("Waiting {}s for {} to settle", self.settle.as_secs(), self.unit);
            tokio::time::sleep(self.settle).await;
        }

        let (active, state) = self.state().await?;
        if active {
            tracing::info!("{} is {}", self.unit, state);
            return Ok(RestartResult {
                outcome: StepOutcome::Succeeded,
                journal: None,
                state,
                fatal: false,
            });
        }

        let error = MigrateError::ServiceNotActive {
            service: self.unit.to_string(),
            state: state.clone(),
        };
        tracing::warn!("{}", error);
        let journal = self.journal().await;
        if let Some(lines) = &journal {
            tracing::warn!("Last {} journal lines of {}:", self.journal_lines, self.unit);
            for line in lines.lines() {
                tracing::warn!("  {}", line);
            }
        }

        Ok(RestartResult {
            outcome: StepOutcome::Failed(error.to_string()),
            journal,
            state,
            fatal: policy == RestartPolicy::Fatal,
        })
    }

    /// Recent journal lines of the unit, if available.
    pub async fn journal(&self) -> Option<String> {
        let command = SystemCommand::new("journalctl")
            .args(["-u", self.unit, "-n"])
            .arg(self.journal_lines.to_string())
            .arg("--no-pager")
            .with_timeout(Some(SYSTEM_COMMAND_TIMEOUT));
        match self.runner.run(command).await {
            Ok(output) if output.success() => Some(output.stdout),
            Ok(output) => {
                tracing::warn!("journalctl failed: {}", output.stderr.trim());
                None
            }
            Err(e) => {
                tracing::warn!("journalctl could not run: {e:#}");
                None
            }
        }
    }
}
