//! Connection to the old server
//!
//! A [`RemoteConnection`] turns the operator's answers (host, user, auth mode
//! and, in password mode, the password) into ready-to-run commands:
//!
//! - [`RemoteConnection::ssh_command`] runs one command in the remote shell
//! - [`RemoteConnection::rsync_shell`] is the `-e` transport for rsync
//!
//! Both carry identical ssh options. In password mode the program becomes
//! `sshpass -e`, and the password is handed over through the `SSHPASS`
//! variable of the child process only, never through argv or a shell string.
//!
//! Password mode needs the `sshpass` helper on this host;
//! [`ensure_password_helper`] installs it through the first package manager
//! found on `PATH` if it is missing.

pub mod secret;

pub use secret::Secret;

use anyhow::Result;
use std::time::Duration;

use crate::config::{AuthMode, MigrationConfig, RemoteTarget};
use crate::constants::{PASSWORD_ENV_VAR, PASSWORD_HELPER, REMOTE_PROBE_TIMEOUT};
use crate::core::MigrateError;
use crate::process::{CommandRunner, SystemCommand};
use crate::prompt::Prompter;

/// Negotiated access to the old server, valid for one run.
#[derive(Debug, Clone)]
pub struct RemoteConnection {
    target: RemoteTarget,
    secret: Option<Secret>,
    connect_timeout_secs: u64,
}

impl RemoteConnection {
    /// Build a connection.
    ///
    /// # Errors
    ///
    /// [`MigrateError::InvalidInput`] if password mode is chosen without a
    /// password or the password is empty.
    pub fn new(
        target: RemoteTarget,
        secret: Option<Secret>,
        connect_timeout_secs: u64,
    ) -> Result<Self, MigrateError> {
        if target.auth == AuthMode::Password && secret.as_ref().is_none_or(Secret::is_empty) {
            return Err(MigrateError::InvalidInput {
                field: "password".to_string(),
                reason: "password authentication needs a non-empty password".to_string(),
            });
        }
        // A password is only ever used in password mode.
        let secret = if target.auth == AuthMode::Password { secret } else { None };
        Ok(Self {
            target,
            secret,
            connect_timeout_secs,
        })
    }

    /// Ensure the helper (password mode), read the password, and build the connection.
    ///
    /// # Errors
    ///
    /// Fails if the helper cannot be provided or the password is empty.
    pub async fn negotiate<R, P>(runner: &R, prompter: &P, config: &MigrationConfig) -> Result<Self>
    where
        R: CommandRunner,
        P: Prompter + ?Sized,
    {
        let target = config.remote.clone();
        tracing::info!(
            "Remote: {} (auth: {})",
            target.destination(),
            target.auth
        );

        let secret = match target.auth {
            AuthMode::Key => None,
            AuthMode::Password => {
                ensure_password_helper(runner, &config.settings.package_managers).await?;
                Some(prompter.password(&format!("Password for {}", target.destination()))?)
            }
        };

        Ok(Self::new(target, secret, config.settings.ssh_connect_timeout_secs)?)
    }

    /// The remote host and user.
    #[must_use]
    pub fn target(&self) -> &RemoteTarget {
        &self.target
    }

    /// ssh options shared by every invocation.
    fn ssh_options(&self) -> Vec<String> {
        let mut opts = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
        ];
        match self.target.auth {
            AuthMode::Key => {
                opts.push("-o".to_string());
                opts.push("BatchMode=yes".to_string());
            }
            AuthMode::Password => {
                opts.push("-o".to_string());
                opts.push("NumberOfPasswordPrompts=1".to_string());
            }
        }
        opts
    }

    /// Add the password to the child environment in password mode.
    pub fn authenticate(&self, command: SystemCommand) -> SystemCommand {
        match &self.secret {
            Some(secret) => command.secret_env(PASSWORD_ENV_VAR, secret),
            None => command,
        }
    }

    /// Run `remote_cmd` in the remote login shell.
    ///
    /// `remote_cmd` is interpreted by the remote shell; quote paths with
    /// [`crate::utils::quote`].
    pub fn ssh_command(&self, remote_cmd: impl Into<String>) -> SystemCommand {
        let command = match self.target.auth {
            AuthMode::Key => SystemCommand::new("ssh"),
            AuthMode::Password => SystemCommand::new(PASSWORD_HELPER).args(["-e", "ssh"]),
        };
        let command = command
            .args(self.ssh_options())
            .arg(self.target.destination())
            .arg(remote_cmd)
            .with_timeout(Some(REMOTE_PROBE_TIMEOUT))
            .with_context(self.target.host.clone());
        self.authenticate(command)
    }

    /// Value for rsync's `-e` option. rsync runs it with the same environment
    /// as itself, so [`Self::authenticate`] must be applied to the rsync command.
    #[must_use]
    pub fn rsync_shell(&self) -> String {
        let mut parts = match self.target.auth {
            AuthMode::Key => vec!["ssh".to_string()],
            AuthMode::Password => vec![PASSWORD_HELPER.to_string(), "-e".to_string(), "ssh".to_string()],
        };
        parts.extend(self.ssh_options());
        parts.join(" ")
    }

    /// `user@host:path` for rsync. IPv6 literals are bracketed, since rsync
    /// reads `host::path` as a daemon module.
    #[must_use]
    pub fn remote_spec(&self, path: &str) -> String {
        if self.target.host.contains(':') {
            format!("{}@[{}]:{}", self.target.user, self.target.host, path)
        } else {
            format!("{}:{}", self.target.destination(), path)
        }
    }
}

/// Make sure `sshpass` is on `PATH`, installing it if needed.
///
/// # Errors
///
/// [`MigrateError::HelperUnavailable`] if no package manager is found, the
/// installation fails, or the helper is still missing afterwards.
pub async fn ensure_password_helper<R: CommandRunner>(runner: &R, managers: &[String]) -> Result<()> {
    ensure_password_helper_with(runner, managers, |tool| which::which(tool).is_ok()).await
}

/// [`ensure_password_helper`] with an injectable `PATH` lookup.
pub async fn ensure_password_helper_with<R, F>(runner: &R, managers: &[String], on_path: F) -> Result<()>
where
    R: CommandRunner,
    F: Fn(&str) -> bool,
{
    if on_path(PASSWORD_HELPER) {
        tracing::debug!("{} is available", PASSWORD_HELPER);
        return Ok(());
    }

    tracing::warn!("{} not found, installing it", PASSWORD_HELPER);
    let Some(manager) = managers.iter().find(|m| on_path(m)) else {
        return Err(MigrateError::HelperUnavailable {
            helper: PASSWORD_HELPER.to_string(),
            reason: format!("no supported package manager found (tried {})", managers.join(", ")),
        }
        .into());
    };

    let command = install_command(manager)?;
    let line = command.display_line();
    let output = runner.run(command).await?;
    if !output.success() {
        return Err(MigrateError::HelperUnavailable {
            helper: PASSWORD_HELPER.to_string(),
            reason: format!("'{line}' failed: {}", output.stderr.trim()),
        }
        .into());
    }

    if !on_path(PASSWORD_HELPER) {
        return Err(MigrateError::HelperUnavailable {
            helper: PASSWORD_HELPER.to_string(),
            reason: format!("still not on PATH after '{line}'"),
        }
        .into());
    }

    tracing::info!("Installed {} with {}", PASSWORD_HELPER, manager);
    Ok(())
}

/// Non-interactive install of the helper with `manager`.
fn install_command(manager: &str) -> Result<SystemCommand, MigrateError> {
    let args: &[&str] = match manager {
        "apt-get" | "apt" => &["install", "-y"],
        "dnf" | "yum" => &["install", "-y"],
        "zypper" => &["--non-interactive", "install"],
        "pacman" => &["-S", "--noconfirm"],
        other => {
            return Err(MigrateError::HelperUnavailable {
                helper: PASSWORD_HELPER.to_string(),
                reason: format!("unsupported package manager '{other}'"),
            });
        }
    };

    let mut command = SystemCommand::new(manager)
        .args(args.iter().copied())
        .arg(PASSWORD_HELPER)
        .streamed()
        .with_timeout(Some(Duration::from_secs(600)))
        .with_context(manager.to_string());
    if manager == "apt-get" || manager == "apt" {
        command = command.env("DEBIAN_FRONTEND", "noninteractive");
    }
    Ok(command)
}
