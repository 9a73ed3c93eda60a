//! The whole migration.
//!
//! Order of work:
//!
//! 1. root check, settings, run log
//! 2. questions not answered by flags (hostname, domain, old server, export
//!    path, auth mode)
//! 3. hostname and hosts file
//! 4. password helper and password (password mode only)
//! 5. reachability and database export check
//! 6. service stop, directory mirror, ownership reset
//! 7. restore delegates, service start
//!
//! The summary is printed whether the run finishes or stops early.

use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use super::CliConfig;
use super::common::{IdentityArgs, RemoteArgs, Session, preset_answers};
use crate::config::{PresetAnswers, RestartPolicy, collect_config};
use crate::process::SystemRunner;
use crate::prompt::TerminalPrompter;
use crate::workflow::Plan;

#[derive(Args)]
pub struct RunCommand {
    #[command(flatten)]
    identity: IdentityArgs,

    #[command(flatten)]
    remote: RemoteArgs,

    /// Whether a service that does not come back fails the run
    #[arg(long, value_enum)]
    pub(super) restart_policy: Option<RestartPolicy>,

    /// Keep the current hostname and hosts file
    #[arg(long, conflicts_with_all = ["hostname", "domain"])]
    pub(super) skip_hostname: bool,
}

impl RunCommand {
    pub(super) fn preset(&self) -> PresetAnswers {
        preset_answers(Some(&self.identity), &self.remote)
    }

    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let session = Session::start(cli, true).await?;

        let settings = match self.restart_policy {
            Some(policy) if policy != session.settings.restart_policy => {
                let mut settings = (*session.settings).clone();
                settings.restart_policy = policy;
                Arc::new(settings)
            }
            _ => Arc::clone(&session.settings),
        };

        let prompter = TerminalPrompter::new();
        let config = collect_config(&prompter, &self.preset(), settings, !self.skip_hostname)?;
        tracing::info!(
            "Migrating from {} ({} directories, restart policy {:?})",
            config.remote.destination(),
            config.sync_paths.len(),
            config.settings.restart_policy
        );

        session.migrate(&SystemRunner::new(), &prompter, &config, Plan::Full).await
    }
}
