//! Run report
//!
//! Every step, and every sync path, ends in a [`StepOutcome`]. Tolerated
//! failures (a path that did not mirror, a restore delegate that exited
//! non-zero, a service that did not come back under the `warn` policy) are
//! recorded here instead of being returned as errors, so the end of the run
//! can show exactly what needs a human look.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::utils::atomic_write;

/// Log target of the summary lines; written to the log file only.
pub const SUMMARY_TARGET: &str = "erp_migrate::summary";

/// How a step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Skipped(String),
    Failed(String),
}

impl StepOutcome {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "ok",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "FAILED",
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            Self::Succeeded => None,
            Self::Skipped(d) | Self::Failed(d) => Some(d),
        }
    }
}

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: String,
    pub outcome: StepOutcome,
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step succeeded or was skipped on purpose
    Completed,
    /// Finished, with tolerated failures to inspect
    CompletedWithWarnings,
    /// Stopped by a fatal error
    Aborted,
}

/// Outcomes of one run, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    started_at: DateTime<Local>,
    finished_at: Option<DateTime<Local>>,
    steps: Vec<StepRecord>,
    fatal: Option<String>,
    log_file: Option<PathBuf>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RunReport {
    #[must_use]
    pub fn new(log_file: Option<PathBuf>) -> Self {
        Self {
            started_at: Local::now(),
            finished_at: None,
            steps: Vec::new(),
            fatal: None,
            log_file,
        }
    }

    /// Append an outcome.
    pub fn record(&mut self, step: impl Into<String>, outcome: StepOutcome) {
        let step = step.into();
        match &outcome {
            StepOutcome::Succeeded => tracing::debug!("{}: ok", step),
            StepOutcome::Skipped(why) => tracing::debug!("{}: skipped ({})", step, why),
            StepOutcome::Failed(why) => tracing::debug!("{}: failed ({})", step, why),
        }
        self.steps.push(StepRecord { step, outcome });
    }

    /// Record the fatal error that stopped the run.
    pub fn abort(&mut self, step: impl Into<String>, error: &anyhow::Error) {
        let message = format!("{error:#}");
        self.record(step, StepOutcome::Failed(message.clone()));
        self.fatal = Some(message);
        self.finished_at = Some(Local::now());
    }

    /// Mark the run as failed without adding a step, for a failure already
    /// recorded by its own step.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.fatal = Some(message.into());
        self.finished_at = Some(Local::now());
    }

    /// Mark the run as finished.
    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Outcome of the first step with this exact name.
    #[must_use]
    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|r| r.step == step).map(|r| &r.outcome)
    }

    /// Records whose step name starts with `prefix`.
    pub fn matching<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a StepRecord> + 'a {
        self.steps.iter().filter(move |r| r.step.starts_with(prefix))
    }

    /// Number of tolerated failures.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.steps.iter().filter(|r| r.outcome.is_failed()).count()
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        if self.fatal.is_some() {
            RunStatus::Aborted
        } else if self.failure_count() > 0 {
            RunStatus::CompletedWithWarnings
        } else {
            RunStatus::Completed
        }
    }

    /// Print the coloured summary to stdout and log it to the run log.
    pub fn print_summary(&self) {
        println!();
        println!("{}", "Migration summary".bold());
        for record in &self.steps {
            let padded = format!("{:<8}", record.outcome.label());
            let label = match record.outcome {
                StepOutcome::Succeeded => padded.green(),
                StepOutcome::Skipped(_) => padded.yellow(),
                StepOutcome::Failed(_) => padded.red().bold(),
            };
            match record.outcome.detail() {
                Some(detail) => println!("  {} {}  {}", label, record.step, detail.dimmed()),
                None => println!("  {} {}", label, record.step),
            }
            tracing::info!(
                target: SUMMARY_TARGET,
                "{:<8} {} {}",
                record.outcome.label(),
                record.step,
                record.outcome.detail().unwrap_or_default()
            );
        }

        let status = match self.status() {
            RunStatus::Completed => "completed".green().bold(),
            RunStatus::CompletedWithWarnings => {
                format!("completed with {} warning(s)", self.failure_count()).yellow().bold()
            }
            RunStatus::Aborted => "aborted".red().bold(),
        };
        println!();
        println!("{}: {}", "Status".bold(), status);
        if let Some(log) = &self.log_file {
            println!("{}: {}", "Log".bold(), log.display());
        }
        tracing::info!(target: SUMMARY_TARGET, "status: {:?}", self.status());
    }

    /// Write the report as pretty JSON.
    ///
    /// # Errors
    ///
    /// Fails if serialization or the write fails.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        #[derive(Serialize)]
        struct Document<'a> {
            status: RunStatus,
            #[serde(flatten)]
            report: &'a RunReport,
        }

        let json = serde_json::to_string_pretty(&Document {
            status: self.status(),
            report: self,
        })
        .context("Failed to serialize run report")?;
        atomic_write(path, json.as_bytes())
            .with_context(|| format!("Failed to write run report {}", path.display()))?;
        tracing::info!("Run report written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_status_follows_outcomes() {
        let mut report = RunReport::new(None);
        report.record("stop service", StepOutcome::Succeeded);
        report.record("sync /opt/erp/data", StepOutcome::Skipped("missing on old server".to_string()));
        assert_eq!(report.status(), RunStatus::Completed);

        report.record("restore RUN_DBRestore.sh", StepOutcome::Failed("exit code 1".to_string()));
        assert_eq!(report.status(), RunStatus::CompletedWithWarnings);
        assert_eq!(report.failure_count(), 1);

        report.abort("start service", &anyhow::anyhow!("not active"));
        assert_eq!(report.status(), RunStatus::Aborted);
    }

    #[test]
    fn test_matching_prefix() {
        let mut report = RunReport::new(None);
        report.record("sync /a", StepOutcome::Succeeded);
        report.record("permissions", StepOutcome::Succeeded);
        report.record("sync /b", StepOutcome::Succeeded);
        assert_eq!(report.matching("sync ").count(), 2);
        assert_eq!(report.outcome("permissions"), Some(&StepOutcome::Succeeded));
    }

    #[test]
    fn test_json_shape() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("migration_x.report.json");
        let mut report = RunReport::new(Some(temp.path().join("migration_x.log")));
        report.record("sync /a", StepOutcome::Skipped("no alternate given".to_string()));
        report.record("sync /b", StepOutcome::Failed("rsync exited with code 23".to_string()));
        report.finish();
        report.write_json(&path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "completed_with_warnings");
        assert_eq!(value["steps"][0]["outcome"]["status"], "skipped");
        assert_eq!(value["steps"][0]["outcome"]["detail"], "no alternate given");
        assert_eq!(value["steps"][1]["outcome"]["status"], "failed");
        assert!(value["fatal"].is_null());
    }
}
