//! Directory mirroring from the old server
//!
//! Each configured directory becomes a [`SyncTask`]. Tasks run strictly in
//! order, one rsync at a time:
//!
//! 1. check the remote directory with `test -d` (remote path defaults to the
//!    local path)
//! 2. if it is missing, ask for an alternate; an empty answer skips the
//!    directory, an alternate that does not exist skips it with a warning
//! 3. create the local directory
//! 4. `rsync -a --delete` the remote tree onto the local one, so the local
//!    copy becomes an exact mirror, including deletions
//!
//! A failing rsync is recorded on its task and the loop moves on; no single
//! directory can stop the migration. Re-running converges to the same state.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::process::{CommandRunner, SystemCommand};
use crate::prompt::Prompter;
use crate::remote::RemoteConnection;
use crate::report::StepOutcome;
use crate::utils::{ensure_dir, quote, spinner};

/// State of one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Pending,
    Synced,
    Skipped(String),
    Failed(String),
}

/// One directory to mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTask {
    pub local_path: PathBuf,
    /// Path on the old server; the local path unless the operator replaced it
    pub remote_path: String,
    pub status: SyncStatus,
}

impl SyncTask {
    #[must_use]
    pub fn new(local_path: &Path) -> Self {
        Self {
            local_path: local_path.to_path_buf(),
            remote_path: local_path.to_string_lossy().into_owned(),
            status: SyncStatus::Pending,
        }
    }

    /// Name used in the run report.
    #[must_use]
    pub fn step_name(&self) -> String {
        format!("sync {}", self.local_path.display())
    }

    /// Report outcome; a task still pending counts as failed.
    #[must_use]
    pub fn outcome(&self) -> StepOutcome {
        match &self.status {
            SyncStatus::Synced => StepOutcome::Succeeded,
            SyncStatus::Skipped(why) => StepOutcome::Skipped(why.clone()),
            SyncStatus::Failed(why) => StepOutcome::Failed(why.clone()),
            SyncStatus::Pending => StepOutcome::Failed("not attempted".to_string()),
        }
    }
}

/// Mirrors the configured directories from the old server.
pub struct PathSynchronizer<'a, R, P: ?Sized> {
    runner: &'a R,
    prompter: &'a P,
    remote: &'a RemoteConnection,
    show_progress: bool,
}

impl<'a, R, P> PathSynchronizer<'a, R, P>
where
    R: CommandRunner,
    P: Prompter + ?Sized,
{
    pub const fn new(runner: &'a R, prompter: &'a P, remote: &'a RemoteConnection, show_progress: bool) -> Self {
        Self {
            runner,
            prompter,
            remote,
            show_progress,
        }
    }

    /// Mirror every path in order and return one resolved task per path.
    ///
    /// # Errors
    ///
    /// Only if a prompt cannot be answered; rsync and filesystem failures are
    /// recorded on the task.
    pub async fn run(&self, paths: &[PathBuf]) -> Result<Vec<SyncTask>> {
        let total = paths.len();
        let mut tasks = Vec::with_capacity(total);
        for (index, path) in paths.iter().enumerate() {
            let mut task = SyncTask::new(path);
            self.resolve(&mut task, index + 1, total).await?;
            match &task.status {
                SyncStatus::Synced => tracing::info!("[{}/{}] {} synced", index + 1, total, path.display()),
                SyncStatus::Skipped(why) => {
                    tracing::warn!("[{}/{}] {} skipped: {}", index + 1, total, path.display(), why);
                }
                SyncStatus::Failed(why) => {
                    tracing::warn!("[{}/{}] {} failed: {}", index + 1, total, path.display(), why);
                }
                SyncStatus::Pending => {}
            }
            tasks.push(task);
        }
        Ok(tasks)
    }

    async fn resolve(&self, task: &mut SyncTask, index: usize, total: usize) -> Result<()> {
        tracing::info!("[{}/{}] Syncing {}", index, total, task.local_path.display());

        match self.remote_dir_exists(&task.remote_path).await {
            Ok(true) => {}
            Ok(false) => {
                let prompt = format!(
                    "Remote directory {} not found on {}. Alternate remote path (empty to skip)",
                    task.remote_path,
                    self.remote.target().host
                );
                let alternate = self.prompter.input(&prompt, None, true)?;
                let alternate = alternate.trim();
                if alternate.is_empty() {
                    task.status = SyncStatus::Skipped(format!("{} not found on old server", task.remote_path));
                    return Ok(());
                }
                match self.remote_dir_exists(alternate).await {
                    Ok(true) => task.remote_path = alternate.to_string(),
                    Ok(false) => {
                        task.status = SyncStatus::Skipped(format!("alternate {alternate} not found on old server"));
                        return Ok(());
                    }
                    Err(e) => {
                        task.status = SyncStatus::Failed(format!("{e:#}"));
                        return Ok(());
                    }
                }
            }
            Err(e) => {
                task.status = SyncStatus::Failed(format!("{e:#}"));
                return Ok(());
            }
        }

        if let Err(e) = ensure_dir(&task.local_path) {
            task.status = SyncStatus::Failed(format!("{e:#}"));
            return Ok(());
        }

        let bar = spinner(format!("[{index}/{total}]"), task.local_path.display().to_string(), self.show_progress);
        let command = self.rsync_command(&task.remote_path, &task.local_path).with_progress(bar.clone());
        let result = self.runner.run(command).await;
        bar.finish_and_clear();

        task.status = match result {
            Ok(output) if output.success() => SyncStatus::Synced,
            Ok(output) => {
                let last = output.stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or_default();
                SyncStatus::Failed(match output.code {
                    Some(code) => format!("rsync exited with code {code}: {}", last.trim()),
                    None => format!("rsync was terminated: {}", last.trim()),
                })
            }
            Err(e) => SyncStatus::Failed(format!("{e:#}")),
        };
        Ok(())
    }

    /// `test -d` on the old server.
    ///
    /// # Errors
    ///
    /// Fails if ssh cannot be started.
    pub async fn remote_dir_exists(&self, path: &str) -> Result<bool> {
        let command = self.remote.ssh_command(format!("test -d {}", quote(path)));
        Ok(self.runner.run(command).await?.success())
    }

    /// rsync invocation mirroring `remote_path` onto `local_path`.
    #[must_use]
    pub fn rsync_command(&self, remote_path: &str, local_path: &Path) -> SystemCommand {
        let source = self.remote.remote_spec(&with_trailing_slash(remote_path));
        let destination = with_trailing_slash(&local_path.to_string_lossy());
        let command = SystemCommand::new("rsync")
            .args([
                "-a",
                "-z",
                "--delete",
                "--protect-args",
                "--human-readable",
                "--info=progress2,stats1",
                "-e",
            ])
            .arg(self.remote.rsync_shell())
            .arg(source)
            .arg(destination)
            .streamed()
            .with_timeout(None)
            .with_context("rsync");
        self.remote.authenticate(command)
    }
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}
