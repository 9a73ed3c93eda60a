//! Migration workflow
//!
//! Runs the steps of a migration strictly in order and records every outcome
//! in a [`RunReport`]:
//!
//! 1. hostname and hosts file
//! 2. connection negotiation (password helper, password)
//! 3. reachability of the old server
//! 4. database export check
//! 5. service stop
//! 6. directory sync
//! 7. ownership and mode reset
//! 8. restore delegates
//! 9. service start
//!
//! Fatal errors stop the run at the failing step; everything already done
//! stays done. Tolerated failures (one directory, one delegate, the
//! permission reset) are recorded and the run continues. Subcommands run a
//! [`Plan`] that selects a subset of the steps.

use anyhow::Result;
use std::time::Duration;

use crate::config::MigrationConfig;
use crate::core::MigrateError;
use crate::hostname::HostnameUpdater;
use crate::permissions::fix_permissions;
use crate::preflight::{ExportStatus, PreflightVerifier};
use crate::process::CommandRunner;
use crate::prompt::Prompter;
use crate::remote::RemoteConnection;
use crate::report::{RunReport, StepOutcome};
use crate::restore::RestoreRunner;
use crate::service::ServiceController;
use crate::sync::PathSynchronizer;

/// Which steps a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Everything
    Full,
    /// Read-only checks against the old server
    Check,
    /// Mirror again after a source change: stop, sync, permissions, start
    Sync,
}

/// One step of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Hostname,
    Connect,
    Reachability,
    Export,
    StopService,
    Sync,
    Permissions,
    Restore,
    StartService,
}

impl Plan {
    /// Steps of this plan, in execution order.
    #[must_use]
    pub const fn steps(self) -> &'static [Step] {
        match self {
            Self::Full => &[
                Step::Hostname,
                Step::Connect,
                Step::Reachability,
                Step::Export,
                Step::StopService,
                Step::Sync,
                Step::Permissions,
                Step::Restore,
                Step::StartService,
            ],
            Self::Check => &[Step::Connect, Step::Reachability, Step::Export],
            Self::Sync => &[
                Step::Connect,
                Step::StopService,
                Step::Sync,
                Step::Permissions,
                Step::StartService,
            ],
        }
    }
}

impl Step {
    /// Name used in the run report.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hostname => "hostname",
            Self::Connect => "connect",
            Self::Reachability => "reachability",
            Self::Export => "export",
            Self::StopService => "stop service",
            Self::Sync => "sync",
            Self::Permissions => "permissions",
            Self::Restore => "restore",
            Self::StartService => "start service",
        }
    }

    const fn title(self) -> &'static str {
        match self {
            Self::Hostname => "Updating hostname",
            Self::Connect => "Connecting to old server",
            Self::Reachability => "Checking old server is reachable",
            Self::Export => "Checking database export",
            Self::StopService => "Stopping service",
            Self::Sync => "Syncing directories",
            Self::Permissions => "Fixing ownership and permissions",
            Self::Restore => "Restoring database",
            Self::StartService => "Starting service",
        }
    }
}

/// Drives one run.
pub struct Migration<'a, R, P: ?Sized> {
    runner: &'a R,
    prompter: &'a P,
    config: &'a MigrationConfig,
    stamp: &'a str,
    show_progress: bool,
    report: RunReport,
    remote: Option<RemoteConnection>,
    /// Failure already recorded by its step that still fails the run
    deferred: Option<anyhow::Error>,
}

impl<'a, R, P> Migration<'a, R, P>
where
    R: CommandRunner,
    P: Prompter + ?Sized,
{
    pub fn new(runner: &'a R, prompter: &'a P, config: &'a MigrationConfig, stamp: &'a str, report: RunReport) -> Self {
        Self {
            runner,
            prompter,
            config,
            stamp,
            show_progress: false,
            report,
            remote: None,
            deferred: None,
        }
    }

    /// Draw spinners while rsync runs.
    #[must_use]
    pub const fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Outcomes so far.
    #[must_use]
    pub const fn report(&self) -> &RunReport {
        &self.report
    }

    #[must_use]
    pub fn into_report(self) -> RunReport {
        self.report
    }

    /// Run every step of `plan` in order.
    ///
    /// The report is complete when this returns, whether or not it fails.
    ///
    /// # Errors
    ///
    /// The fatal error that stopped the run, or
    /// [`MigrateError::ServiceNotActive`] when the service did not come back
    /// and the restart policy is fatal.
    pub async fn run(&mut self, plan: Plan) -> Result<()> {
        let steps = plan.steps();
        let total = steps.len();

        for (index, step) in steps.iter().enumerate() {
            tracing::info!("Step {}/{}: {}", index + 1, total, step.title());
            if let Err(e) = self.execute(*step).await {
                self.report.abort(step.name(), &e);
                return Err(e);
            }
        }

        match self.deferred.take() {
            Some(e) => {
                self.report.fail(format!("{e:#}"));
                Err(e)
            }
            None => {
                self.report.finish();
                Ok(())
            }
        }
    }

    async fn execute(&mut self, step: Step) -> Result<()> {
        match step {
            Step::Hostname => self.update_hostname().await,
            Step::Connect => self.connect().await,
            Step::Reachability => self.check_reachable().await,
            Step::Export => self.check_export().await,
            Step::StopService => self.stop_service().await,
            Step::Sync => self.sync_paths().await,
            Step::Permissions => {
                self.reset_permissions().await;
                Ok(())
            }
            Step::Restore => self.restore().await,
            Step::StartService => self.start_service().await,
        }
    }

    fn remote(&self) -> Result<&RemoteConnection> {
        self.remote.as_ref().ok_or_else(|| {
            MigrateError::Other {
                message: "no connection to the old server was negotiated".to_string(),
            }
            .into()
        })
    }

    fn service(&self) -> ServiceController<'_, R> {
        let settings = &self.config.settings;
        ServiceController::new(
            self.runner,
            &settings.service_name,
            Duration::from_secs(settings.restart_settle_secs),
            settings.journal_lines,
        )
    }

    async fn update_hostname(&mut self) -> Result<()> {
        let Some(identity) = &self.config.identity else {
            tracing::info!("Hostname update skipped");
            self.report
                .record(Step::Hostname.name(), StepOutcome::Skipped("not requested".to_string()));
            return Ok(());
        };

        let settings = &self.config.settings;
        let updater = HostnameUpdater::new(self.runner, &settings.hosts_file, settings.host_match, self.stamp);
        let change = updater.update(identity).await?;
        tracing::info!(
            "Hostname {} -> {} ({} mapped to {})",
            if change.previous.is_empty() { "(unknown)" } else { &change.previous },
            change.fqdn,
            settings.hosts_file.display(),
            change.mapped_ip
        );
        self.report.record(Step::Hostname.name(), StepOutcome::Succeeded);
        Ok(())
    }

    async fn connect(&mut self) -> Result<()> {
        let connection = RemoteConnection::negotiate(self.runner, self.prompter, self.config).await?;
        self.remote = Some(connection);
        self.report.record(Step::Connect.name(), StepOutcome::Succeeded);
        Ok(())
    }

    async fn check_reachable(&mut self) -> Result<()> {
        let remote = self.remote()?;
        PreflightVerifier::new(self.runner, self.prompter, remote)
            .verify_reachable()
            .await?;
        self.report.record(Step::Reachability.name(), StepOutcome::Succeeded);
        Ok(())
    }

    async fn check_export(&mut self) -> Result<()> {
        let remote = self.remote()?;
        let status = PreflightVerifier::new(self.runner, self.prompter, remote)
            .check_export(&self.config.export_path, &self.config.settings.export_script_hint)
            .await?;
        let outcome = match status {
            ExportStatus::Present { .. } => StepOutcome::Succeeded,
            ExportStatus::MissingAccepted => {
                StepOutcome::Skipped(format!("{} missing, continued by operator", self.config.export_path))
            }
        };
        self.report.record(Step::Export.name(), outcome);
        Ok(())
    }

    async fn stop_service(&mut self) -> Result<()> {
        self.service().stop().await?;
        self.report.record(Step::StopService.name(), StepOutcome::Succeeded);
        Ok(())
    }

    async fn sync_paths(&mut self) -> Result<()> {
        let remote = self.remote()?;
        let tasks = PathSynchronizer::new(self.runner, self.prompter, remote, self.show_progress)
            .run(&self.config.sync_paths)
            .await?;
        for task in &tasks {
            self.report.record(task.step_name(), task.outcome());
        }
        Ok(())
    }

    async fn reset_permissions(&mut self) {
        let settings = &self.config.settings;
        let outcome = fix_permissions(self.runner, &settings.app_root, &settings.app_owner, &settings.app_mode).await;
        self.report.record(Step::Permissions.name(), outcome);
    }

    async fn restore(&mut self) -> Result<()> {
        let settings = &self.config.settings;
        let scripts = [settings.restore_script.as_str(), settings.sync_script.as_str()];
        let runs = RestoreRunner::new(self.runner, &settings.utils_dir).run(&scripts).await?;
        for run in &runs {
            self.report.record(run.step_name(), run.outcome.clone());
        }
        Ok(())
    }

    async fn start_service(&mut self) -> Result<()> {
        let policy = self.config.settings.restart_policy;
        let result = self.service().start(policy).await?;
        let failed = result.outcome.is_failed();
        self.report.record(Step::StartService.name(), result.outcome);

        if failed {
            if result.fatal {
                self.deferred = Some(
                    MigrateError::ServiceNotActive {
                        service: self.config.settings.service_name.clone(),
                        state: result.state,
                    }
                    .into(),
                );
            } else {
                tracing::warn!("Restart policy is 'warn'; finishing with warnings");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestartPolicy;
    use crate::process::CommandOutput;
    use crate::report::RunStatus;
    use crate::test_utils::{RecordingRunner, ScriptedPrompter, TestHost};
    use std::sync::Arc;

    /// Runner for a healthy migration: the service stops, then comes back.
    fn healthy_runner() -> RecordingRunner {
        RecordingRunner::new().respond_once("systemctl is-active", CommandOutput::failed(3, ""))
    }

    #[test]
    fn test_full_plan_order() {
        let names: Vec<_> = Plan::Full.steps().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            [
                "hostname",
                "connect",
                "reachability",
                "export",
                "stop service",
                "sync",
                "permissions",
                "restore",
                "start service"
            ]
        );
        assert!(!Plan::Sync.steps().contains(&Step::Hostname));
        assert!(!Plan::Sync.steps().contains(&Step::Restore));
        assert!(!Plan::Check.steps().contains(&Step::StopService));
    }

    #[tokio::test]
    async fn test_skipped_directory_does_not_stop_the_run() {
        let host = TestHost::new().unwrap();
        let config = host.config().unwrap();
        let missing = format!("test -d '{}'", config.sync_paths[3].display());
        let runner = healthy_runner().respond(&missing, CommandOutput::failed(1, ""));
        let prompter = ScriptedPrompter::new().text("");

        let mut migration = Migration::new(&runner, &prompter, &config, "20260101-000000", RunReport::default());
        migration.run(Plan::Full).await.unwrap();
        let report = migration.into_report();

        let synced = report.matching("sync ").filter(|r| r.outcome == StepOutcome::Succeeded).count();
        let skipped = report
            .matching("sync ")
            .filter(|r| matches!(r.outcome, StepOutcome::Skipped(_)))
            .count();
        assert_eq!((synced, skipped), (5, 1));
        assert_eq!(report.outcome("permissions"), Some(&StepOutcome::Succeeded));
        assert_eq!(report.outcome("restore RUN_DBRestore.sh"), Some(&StepOutcome::Succeeded));
        assert_eq!(report.outcome("restore RUN_SyncDB.sh"), Some(&StepOutcome::Succeeded));
        assert_eq!(report.outcome("start service"), Some(&StepOutcome::Succeeded));
        assert_eq!(report.status(), RunStatus::Completed);

        assert_eq!(runner.count("rsync "), 5);
        assert!(runner.position("systemctl stop").unwrap() < runner.position("rsync ").unwrap());
        assert!(runner.position("bash RUN_SyncDB.sh").unwrap() < runner.position("systemctl start").unwrap());
        assert!(host.hosts_content().unwrap().contains("127.0.1.1 zion zion"));
    }

    #[tokio::test]
    async fn test_missing_utils_dir_aborts_before_any_delegate() {
        let host = TestHost::new().unwrap();
        host.remove_utils_dir().unwrap();
        let config = host.config().unwrap();
        let runner = healthy_runner();
        let prompter = ScriptedPrompter::new();

        let mut migration = Migration::new(&runner, &prompter, &config, "20260101-000000", RunReport::default());
        let err = migration.run(Plan::Full).await.unwrap_err();

        assert!(matches!(err.downcast_ref::<MigrateError>(), Some(MigrateError::UtilsDirMissing { .. })));
        assert_eq!(runner.count("bash "), 0);
        assert_eq!(runner.count("systemctl start"), 0);
        let report = migration.report();
        assert_eq!(report.status(), RunStatus::Aborted);
        assert!(report.outcome("restore").is_some_and(StepOutcome::is_failed));
        assert_eq!(report.matching("sync ").count(), 6);
    }

    #[tokio::test]
    async fn test_unreachable_remote_changes_nothing_remote() {
        let host = TestHost::new().unwrap();
        let config = host.config().unwrap();
        let runner = RecordingRunner::new().respond(
            "root@old true",
            CommandOutput::failed(255, "ssh: connect to host old port 22: Connection refused"),
        );
        let prompter = ScriptedPrompter::new();

        let mut migration = Migration::new(&runner, &prompter, &config, "20260101-000000", RunReport::default());
        let err = migration.run(Plan::Full).await.unwrap_err();

        assert!(matches!(err.downcast_ref::<MigrateError>(), Some(MigrateError::RemoteUnreachable { .. })));
        assert_eq!(runner.count("systemctl"), 0);
        assert_eq!(runner.count("rsync"), 0);
        assert_eq!(migration.report().outcome("hostname"), Some(&StepOutcome::Succeeded));
    }

    #[tokio::test]
    async fn test_service_that_will_not_stop_aborts_before_sync() {
        let host = TestHost::new().unwrap();
        let config = host.config().unwrap();
        let runner = RecordingRunner::new();
        let prompter = ScriptedPrompter::new();

        let mut migration = Migration::new(&runner, &prompter, &config, "20260101-000000", RunReport::default());
        let err = migration.run(Plan::Sync).await.unwrap_err();

        assert!(matches!(err.downcast_ref::<MigrateError>(), Some(MigrateError::ServiceStillActive { .. })));
        assert_eq!(runner.count("rsync"), 0);
    }

    #[tokio::test]
    async fn test_restart_failure_policy() {
        for (policy, fatal) in [(RestartPolicy::Fatal, true), (RestartPolicy::Warn, false)] {
            let host = TestHost::new().unwrap();
            let mut settings = host.settings.clone();
            settings.restart_policy = policy;
            let mut config = host.config().unwrap();
            config.settings = Arc::new(settings);
            let runner = RecordingRunner::new()
                .respond("systemctl is-active", CommandOutput::failed(3, ""))
                .respond("journalctl", CommandOutput::ok("erp[42]: could not bind port 8069\n"));
            let prompter = ScriptedPrompter::new();

            let mut migration = Migration::new(&runner, &prompter, &config, "20260101-000000", RunReport::default());
            let result = migration.run(Plan::Sync).await;

            assert_eq!(result.is_err(), fatal, "{policy:?}");
            let report = migration.report();
            assert!(report.outcome("start service").is_some_and(StepOutcome::is_failed));
            assert_eq!(runner.count("journalctl -u erp.service -n 50 --no-pager"), 1);
            let expected = if fatal { RunStatus::Aborted } else { RunStatus::CompletedWithWarnings };
            assert_eq!(report.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_declined_missing_export_stops_before_service() {
        let host = TestHost::new().unwrap();
        let config = host.config().unwrap();
        let runner = RecordingRunner::new().respond("test -f", CommandOutput::failed(1, ""));
        let prompter = ScriptedPrompter::new().confirm(false);

        let mut migration = Migration::new(&runner, &prompter, &config, "20260101-000000", RunReport::default());
        let err = migration.run(Plan::Check).await.unwrap_err();

        assert!(matches!(err.downcast_ref::<MigrateError>(), Some(MigrateError::ExportMissing { .. })));
        assert_eq!(runner.count("systemctl"), 0);
        assert_eq!(migration.report().outcome("export").map(StepOutcome::is_failed), Some(true));
    }

    #[tokio::test]
    async fn test_skipped_hostname_leaves_hosts_file_alone() {
        let host = TestHost::new().unwrap();
        let mut config = host.config().unwrap();
        config.identity = None;
        let runner = healthy_runner();
        let prompter = ScriptedPrompter::new();

        let mut migration = Migration::new(&runner, &prompter, &config, "20260101-000000", RunReport::default());
        migration.run(Plan::Full).await.unwrap();

        assert!(matches!(migration.report().outcome("hostname"), Some(StepOutcome::Skipped(_))));
        assert_eq!(runner.count("hostnamectl"), 0);
        assert!(host.hosts_backups().unwrap().is_empty());
        assert_eq!(host.hosts_content().unwrap(), crate::test_utils::DEFAULT_HOSTS);
    }
}
