//! Mirror the application directories again.
//!
//! Stops the service, re-runs the mirror for every configured directory,
//! resets ownership and starts the service. The hostname, the export check
//! and the restore delegates are left out.

use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use super::CliConfig;
use super::common::{RemoteArgs, Session, preset_answers};
use crate::config::{RestartPolicy, collect_config};
use crate::process::SystemRunner;
use crate::prompt::TerminalPrompter;
use crate::workflow::Plan;

#[derive(Args)]
pub struct SyncCommand {
    #[command(flatten)]
    remote: RemoteArgs,

    /// Whether a service that does not come back fails the run
    #[arg(long, value_enum)]
    restart_policy: Option<RestartPolicy>,
}

impl SyncCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let session = Session::start(cli, true).await?;

        let settings = match self.restart_policy {
            Some(policy) => {
                let mut settings = (*session.settings).clone();
                settings.restart_policy = policy;
                Arc::new(settings)
            }
            None => Arc::clone(&session.settings),
        };

        let prompter = TerminalPrompter::new();
        let config = collect_config(&prompter, &preset_answers(None, &self.remote), settings, false)?;

        session.migrate(&SystemRunner::new(), &prompter, &config, Plan::Sync).await
    }
}
