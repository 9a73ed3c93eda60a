//! Set the hostname and rewrite the hosts file, nothing else.

use anyhow::Result;
use clap::Args;

use super::CliConfig;
use super::common::{IdentityArgs, RemoteArgs, Session, preset_answers};
use crate::config::collect_identity;
use crate::hostname::HostnameUpdater;
use crate::process::SystemRunner;
use crate::prompt::TerminalPrompter;
use crate::report::StepOutcome;
use crate::workflow::Step;

#[derive(Args)]
pub struct HostnameCommand {
    #[command(flatten)]
    identity: IdentityArgs,
}

impl HostnameCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let session = Session::start(cli, true).await?;
        let prompter = TerminalPrompter::new();
        let identity = collect_identity(&prompter, &preset_answers(Some(&self.identity), &RemoteArgs::default()))?;

        let runner = SystemRunner::new();
        let settings = &session.settings;
        let updater = HostnameUpdater::new(&runner, &settings.hosts_file, settings.host_match, &session.stamp);

        let mut report = session.report();
        let result = updater.update(&identity).await;
        match &result {
            Ok(change) => {
                tracing::info!("Hostname set to {} (backup {})", change.fqdn, change.backup.display());
                report.record(Step::Hostname.name(), StepOutcome::Succeeded);
                report.finish();
            }
            Err(e) => report.abort(Step::Hostname.name(), e),
        }
        session.summarize(&report);
        result.map(|_| ())
    }
}
