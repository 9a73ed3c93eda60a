//! Database restore delegates
//!
//! The database restore and the schema/data sync are performed by two site
//! scripts in the utility directory (`RUN_DBRestore.sh`, then
//! `RUN_SyncDB.sh` by default). Their exit codes are not trusted as a success
//! signal: a non-zero exit is recorded as a failed outcome and the next
//! delegate still runs. A missing utility directory is fatal and is checked
//! before either script starts.

use anyhow::Result;
use std::path::Path;

use crate::core::MigrateError;
use crate::process::{CommandRunner, SystemCommand};
use crate::report::StepOutcome;

/// Outcome of one delegate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateRun {
    pub script: String,
    pub outcome: StepOutcome,
}

impl DelegateRun {
    /// Name used in the run report.
    #[must_use]
    pub fn step_name(&self) -> String {
        format!("restore {}", self.script)
    }
}

/// Runs the delegates in the utility directory.
pub struct RestoreRunner<'a, R> {
    runner: &'a R,
    utils_dir: &'a Path,
}

impl<'a, R: CommandRunner> RestoreRunner<'a, R> {
    pub const fn new(runner: &'a R, utils_dir: &'a Path) -> Self {
        Self { runner, utils_dir }
    }

    /// Run each script in order with `bash`, from the utility directory.
    ///
    /// # Errors
    ///
    /// [`MigrateError::UtilsDirMissing`] if the utility directory does not
    /// exist; no script is started in that case.
    pub async fn run(&self, scripts: &[&str]) -> Result<Vec<DelegateRun>> {
        if !self.utils_dir.is_dir() {
            return Err(MigrateError::UtilsDirMissing {
                path: self.utils_dir.display().to_string(),
            }
            .into());
        }

        let mut runs = Vec::with_capacity(scripts.len());
        for script in scripts {
            let outcome = self.run_one(script).await;
            runs.push(DelegateRun {
                script: (*script).to_string(),
                outcome,
            });
        }
        Ok(runs)
    }

    async fn run_one(&self, script: &str) -> StepOutcome {
        let path = self.utils_dir.join(script);
        if !path.is_file() {
            tracing::warn!("{} not found in {}", script, self.utils_dir.display());
            return StepOutcome::Failed(format!("{} not found", path.display()));
        }

        tracing::info!("Running {}", script);
        let command = SystemCommand::new("bash")
            .arg(script)
            .current_dir(self.utils_dir)
            .streamed()
            .with_timeout(None)
            .with_context(script.to_string());

        match self.runner.run(command).await {
            Ok(output) if output.success() => {
                tracing::info!("{} finished", script);
                StepOutcome::Succeeded
            }
            Ok(output) => {
                let reason = match output.code {
                    Some(code) => format!("exited with code {code}"),
                    None => "terminated by a signal".to_string(),
                };
                tracing::warn!("{} {}; continuing, check the log", script, reason);
                StepOutcome::Failed(reason)
            }
            Err(e) => {
                tracing::warn!("{} could not run: {e:#}", script);
                StepOutcome::Failed(format!("{e:#}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use crate::test_utils::RecordingRunner;
    use tempfile::TempDir;

    fn utils_with(scripts: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for script in scripts {
            std::fs::write(temp.path().join(script), "#!/bin/bash\nexit 0\n").unwrap();
        }
        temp
    }

    #[tokio::test]
    async fn test_missing_utils_dir_runs_nothing() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("utils");
        let runner = RecordingRunner::new();

        let err = RestoreRunner::new(&runner, &missing)
            .run(&["RUN_DBRestore.sh", "RUN_SyncDB.sh"])
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<MigrateError>(), Some(MigrateError::UtilsDirMissing { .. })));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failing_restore_still_runs_sync() {
        let utils = utils_with(&["RUN_DBRestore.sh", "RUN_SyncDB.sh"]);
        let runner = RecordingRunner::new().respond("RUN_DBRestore.sh", CommandOutput::failed(1, "ORA-00001"));

        let runs = RestoreRunner::new(&runner, utils.path())
            .run(&["RUN_DBRestore.sh", "RUN_SyncDB.sh"])
            .await
            .unwrap();

        assert_eq!(runs[0].outcome, StepOutcome::Failed("exited with code 1".to_string()));
        assert_eq!(runs[1].outcome, StepOutcome::Succeeded);
        assert_eq!(runner.lines(), ["bash RUN_DBRestore.sh", "bash RUN_SyncDB.sh"]);
        assert!(runner.calls().iter().all(|c| c.current_dir.as_deref() == Some(utils.path())));
    }

    #[tokio::test]
    async fn test_missing_script_is_a_failed_outcome() {
        let utils = utils_with(&["RUN_SyncDB.sh"]);
        let runner = RecordingRunner::new();

        let runs = RestoreRunner::new(&runner, utils.path())
            .run(&["RUN_DBRestore.sh", "RUN_SyncDB.sh"])
            .await
            .unwrap();

        assert!(runs[0].outcome.is_failed());
        assert_eq!(runs[1].outcome, StepOutcome::Succeeded);
        assert_eq!(runner.lines(), ["bash RUN_SyncDB.sh"]);
    }
}
