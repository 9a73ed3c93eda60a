//! Read-only checks against the old server.
//!
//! Negotiates the connection (installing the password helper if needed),
//! then verifies ssh access and the database export. Nothing on this machine
//! or the old server is changed, so root is not required.

use anyhow::Result;
use clap::Args;

use super::CliConfig;
use super::common::{RemoteArgs, Session, preset_answers};
use crate::config::collect_config;
use crate::process::SystemRunner;
use crate::prompt::TerminalPrompter;
use crate::workflow::Plan;

#[derive(Args)]
pub struct CheckCommand {
    #[command(flatten)]
    remote: RemoteArgs,
}

impl CheckCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let session = Session::start(cli, false).await?;
        let prompter = TerminalPrompter::new();
        let config = collect_config(
            &prompter,
            &preset_answers(None, &self.remote),
            session.settings.clone(),
            false,
        )?;

        session.migrate(&SystemRunner::new(), &prompter, &config, Plan::Check).await
    }
}
