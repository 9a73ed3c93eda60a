//! Plumbing shared by the commands: privilege check, settings, run log,
//! shared flags and the end-of-run summary.

use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use super::CliConfig;
use crate::config::{AuthMode, MigrationConfig, MigrationSettings, PresetAnswers};
use crate::logging::{RunLog, init_logging};
use crate::preflight::check_root;
use crate::process::CommandRunner;
use crate::prompt::Prompter;
use crate::report::RunReport;
use crate::utils::run_stamp;
use crate::workflow::{Migration, Plan};

/// Flags that pre-answer the questions about the old server.
#[derive(Args, Debug, Clone, Default)]
pub struct RemoteArgs {
    /// Old server host name or address
    #[arg(long, value_name = "HOST")]
    pub remote_host: Option<String>,

    /// User on the old server
    #[arg(long, value_name = "USER")]
    pub remote_user: Option<String>,

    /// Database export path on the old server
    #[arg(long, value_name = "PATH")]
    pub export_path: Option<String>,

    /// How to authenticate against the old server
    #[arg(long, value_enum)]
    pub auth: Option<AuthMode>,
}

/// Flags that pre-answer the questions about the new identity.
#[derive(Args, Debug, Clone, Default)]
pub struct IdentityArgs {
    /// New short hostname
    #[arg(long, value_name = "NAME")]
    pub hostname: Option<String>,

    /// Domain of the new hostname; empty for none
    #[arg(long, value_name = "DOMAIN")]
    pub domain: Option<String>,
}

/// Merge the flag groups into preset answers.
#[must_use]
pub fn preset_answers(identity: Option<&IdentityArgs>, remote: &RemoteArgs) -> PresetAnswers {
    PresetAnswers {
        hostname: identity.and_then(|i| i.hostname.clone()),
        domain: identity.and_then(|i| i.domain.clone()),
        remote_host: remote.remote_host.clone(),
        remote_user: remote.remote_user.clone(),
        export_path: remote.export_path.clone(),
        auth: remote.auth,
    }
}

/// One command invocation: settings, timestamp and log file.
#[derive(Debug)]
pub struct Session {
    pub settings: Arc<MigrationSettings>,
    pub stamp: String,
    pub run_log: Option<RunLog>,
    pub show_progress: bool,
}

impl Session {
    /// Check privileges, load settings and start logging.
    ///
    /// Privileged commands fail if the log file cannot be created; the others
    /// log to the console only in that case.
    ///
    /// # Errors
    ///
    /// Not root (privileged commands), invalid settings, or logging setup failure.
    pub async fn start(config: &CliConfig, privileged: bool) -> Result<Self> {
        if privileged {
            check_root()?;
        }

        let settings = MigrationSettings::load_with_optional(config.config_path.as_deref()).await?;
        settings.validate()?;
        let stamp = run_stamp();

        let (run_log, file, log_error) = match RunLog::create(&settings.log_dir, &stamp) {
            Ok((log, file)) => (Some(log), Some(file), None),
            Err(e) if !privileged => (None, None, Some(e)),
            Err(e) => return Err(e),
        };
        init_logging(config.log_level, file)?;

        match (&run_log, log_error) {
            (Some(log), _) => tracing::info!("Logging to {}", log.path().display()),
            (None, Some(e)) => tracing::warn!("No log file for this run: {e:#}"),
            (None, None) => {}
        }
        tracing::debug!("Settings: {:?}", settings);

        Ok(Self {
            settings: Arc::new(settings),
            stamp,
            run_log,
            show_progress: config.show_progress,
        })
    }

    /// An empty report pointing at this run's log.
    #[must_use]
    pub fn report(&self) -> RunReport {
        RunReport::new(self.run_log.as_ref().map(|log| log.path().to_path_buf()))
    }

    /// Run `plan` and summarize, whether or not it fails.
    ///
    /// # Errors
    ///
    /// The error that failed the run.
    pub async fn migrate<R, P>(&self, runner: &R, prompter: &P, config: &MigrationConfig, plan: Plan) -> Result<()>
    where
        R: CommandRunner,
        P: Prompter + ?Sized,
    {
        let mut migration =
            Migration::new(runner, prompter, config, &self.stamp, self.report()).with_progress(self.show_progress);
        let result = migration.run(plan).await;
        self.summarize(migration.report());
        result
    }

    /// Print the summary and write the JSON report next to the log.
    pub fn summarize(&self, report: &RunReport) {
        report.print_summary();

        if let Some(log) = &self.run_log {
            if self.settings.report_json {
                if let Err(e) = report.write_json(&log.report_path()) {
                    tracing::warn!("Could not write the run report: {e:#}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_answers_merge() {
        let identity = IdentityArgs {
            hostname: Some("erp01".to_string()),
            domain: None,
        };
        let remote = RemoteArgs {
            remote_host: Some("old".to_string()),
            auth: Some(AuthMode::Key),
            ..RemoteArgs::default()
        };

        let preset = preset_answers(Some(&identity), &remote);
        assert_eq!(preset.hostname.as_deref(), Some("erp01"));
        assert_eq!(preset.domain, None);
        assert_eq!(preset.remote_host.as_deref(), Some("old"));
        assert_eq!(preset.auth, Some(AuthMode::Key));

        let preset = preset_answers(None, &remote);
        assert_eq!(preset.hostname, None);
    }
}
