//! Preflight checks
//!
//! - [`check_root`]: the migration rewrites `/etc/hosts`, controls systemd
//!   units and resets ownership, so it must run as root
//! - [`PreflightVerifier::verify_reachable`]: `ssh ... true` must succeed
//! - [`PreflightVerifier::check_export`]: the database export must exist on
//!   the old server, or the operator must explicitly accept continuing
//!   without it

use anyhow::Result;

use crate::core::MigrateError;
use crate::process::CommandRunner;
use crate::prompt::Prompter;
use crate::remote::RemoteConnection;
use crate::utils::quote;

/// Fail unless running with effective uid 0.
///
/// # Errors
///
/// [`MigrateError::NotRoot`] with the current effective uid.
pub fn check_root() -> Result<(), MigrateError> {
    #[cfg(unix)]
    let uid = unsafe { libc::geteuid() };
    #[cfg(not(unix))]
    let uid = u32::MAX;
    check_uid(uid)
}

fn check_uid(uid: u32) -> Result<(), MigrateError> {
    if uid == 0 {
        Ok(())
    } else {
        Err(MigrateError::NotRoot { uid })
    }
}

/// Result of the export check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    /// The export exists; `details` is its size and modification time
    Present { details: String },
    /// The export is missing and the operator chose to continue
    MissingAccepted,
}

/// Checks against the old server.
pub struct PreflightVerifier<'a, R, P: ?Sized> {
    runner: &'a R,
    prompter: &'a P,
    remote: &'a RemoteConnection,
}

impl<'a, R, P> PreflightVerifier<'a, R, P>
where
    R: CommandRunner,
    P: Prompter + ?Sized,
{
    pub const fn new(runner: &'a R, prompter: &'a P, remote: &'a RemoteConnection) -> Self {
        Self {
            runner,
            prompter,
            remote,
        }
    }

    /// Run a no-op command on the old server.
    ///
    /// # Errors
    ///
    /// [`MigrateError::RemoteUnreachable`] if ssh cannot be started or exits non-zero.
    pub async fn verify_reachable(&self) -> Result<()> {
        let target = self.remote.target().destination();
        tracing::info!("Checking ssh access to {}", target);

        let reason = match self.runner.run(self.remote.ssh_command("true")).await {
            Ok(output) if output.success() => {
                tracing::info!("{} is reachable", target);
                return Ok(());
            }
            Ok(output) => {
                let stderr = output.stderr.trim();
                if stderr.is_empty() {
                    format!("ssh exited with code {:?}", output.code)
                } else {
                    stderr.to_string()
                }
            }
            Err(e) => format!("{e:#}"),
        };

        Err(MigrateError::RemoteUnreachable { target, reason }.into())
    }

    /// Check that the export file exists on the old server.
    ///
    /// If it is missing, explain how to create it with `export_hint` and ask
    /// whether to continue anyway.
    ///
    /// # Errors
    ///
    /// [`MigrateError::ExportMissing`] if the file is missing and the operator
    /// declines to continue; ssh start failures.
    pub async fn check_export(&self, path: &str, export_hint: &str) -> Result<ExportStatus> {
        let test = self.remote.ssh_command(format!("test -f {}", quote(path)));
        let output = self.runner.run(test).await?;

        if output.success() {
            let details = self.describe_remote_file(path).await;
            tracing::info!("Export found: {} ({})", path, details);
            return Ok(ExportStatus::Present { details });
        }

        tracing::warn!(
            "Database export {} not found on {}",
            path,
            self.remote.target().host
        );
        tracing::warn!(
            "Run {} on the old server first, or continue if the database is restored another way",
            export_hint
        );
        if self.prompter.confirm("Continue without the database export?", false)? {
            tracing::warn!("Continuing without database export (operator override)");
            Ok(ExportStatus::MissingAccepted)
        } else {
            Err(MigrateError::ExportMissing {
                path: path.to_string(),
                export_hint: export_hint.to_string(),
            }
            .into())
        }
    }

    /// Size and modification time of a remote file, best effort.
    async fn describe_remote_file(&self, path: &str) -> String {
        let stat = format!("stat -c {} {}", quote("%s bytes, modified %y"), quote(path));
        let ls = format!("ls -lh {}", quote(path));

        for remote_cmd in [stat, ls] {
            if let Ok(output) = self.runner.run(self.remote.ssh_command(remote_cmd)).await {
                if output.success() && !output.stdout.trim().is_empty() {
                    return output.stdout.trim().to_string();
                }
            }
        }
        "details unavailable".to_string()
    }
}
