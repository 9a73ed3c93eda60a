//! Run configuration
//!
//! Two layers:
//!
//! - [`MigrationSettings`]: site settings from `/etc/erp-migrate/config.toml`
//!   (or `--config`), with a default for every key.
//! - [`MigrationConfig`]: the immutable per-run configuration assembled once
//!   from flags and prompts, then passed by reference to every step.
//!
//! Operator answers are validated when the [`MigrationConfig`] is built, so a
//! bad hostname or remote target stops the run before anything is changed.

pub mod answers;
pub mod settings;

pub use answers::{PresetAnswers, collect_config, collect_identity, collect_remote};
pub use settings::{HostMatchMode, MigrationSettings, RestartPolicy};

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::MigrateError;

/// How the old server authenticates us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AuthMode {
    /// ssh keys or an agent; ssh runs with `BatchMode=yes`
    #[default]
    Key,
    /// Password read from the terminal and injected through `sshpass`
    Password,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key => f.write_str("key"),
            Self::Password => f.write_str("password"),
        }
    }
}

/// New identity of this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    /// Short hostname (a single DNS label)
    pub short_name: String,
    /// Domain suffix; empty for none
    pub domain: String,
}

impl HostIdentity {
    /// Validate and build.
    ///
    /// # Errors
    ///
    /// [`MigrateError::InvalidInput`] if the short name is not a valid label or
    /// the domain contains an invalid label.
    pub fn new(short_name: &str, domain: &str) -> Result<Self, MigrateError> {
        let short_name = short_name.trim();
        let domain = domain.trim().trim_end_matches('.');
        validate_label("hostname", short_name)?;
        if !domain.is_empty() {
            for label in domain.split('.') {
                validate_label("domain", label)?;
            }
        }
        Ok(Self {
            short_name: short_name.to_string(),
            domain: domain.to_string(),
        })
    }

    /// `short_name` if the domain is empty, otherwise `short_name.domain`.
    #[must_use]
    pub fn fqdn(&self) -> String {
        if self.domain.is_empty() {
            self.short_name.clone()
        } else {
            format!("{}.{}", self.short_name, self.domain)
        }
    }
}

/// Where the data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub user: String,
    pub auth: AuthMode,
}

impl RemoteTarget {
    /// Validate and build.
    ///
    /// # Errors
    ///
    /// [`MigrateError::InvalidInput`] if host or user is empty or contains whitespace.
    pub fn new(host: &str, user: &str, auth: AuthMode) -> Result<Self, MigrateError> {
        let host = host.trim();
        let user = user.trim();
        validate_remote_field("remote host", host)?;
        validate_remote_field("remote user", user)?;
        if user.contains('@') {
            return Err(MigrateError::InvalidInput {
                field: "remote user".to_string(),
                reason: "must not contain '@'".to_string(),
            });
        }
        Ok(Self {
            host: host.to_string(),
            user: user.to_string(),
            auth,
        })
    }

    /// `user@host` as passed to ssh.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Immutable configuration of one run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// New identity; `None` when the hostname step is skipped
    pub identity: Option<HostIdentity>,
    pub remote: RemoteTarget,
    /// Database export on the old server
    pub export_path: String,
    /// Directories to mirror, in order
    pub sync_paths: Vec<PathBuf>,
    pub settings: Arc<MigrationSettings>,
}

impl MigrationConfig {
    /// Assemble the run configuration.
    ///
    /// # Errors
    ///
    /// [`MigrateError::InvalidInput`] if the export path is empty or a sync
    /// path is not absolute.
    pub fn new(
        identity: Option<HostIdentity>,
        remote: RemoteTarget,
        export_path: &str,
        settings: Arc<MigrationSettings>,
    ) -> Result<Self, MigrateError> {
        let export_path = export_path.trim();
        if export_path.is_empty() {
            return Err(MigrateError::InvalidInput {
                field: "export path".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        let sync_paths = settings.sync_paths.clone();
        if let Some(p) = sync_paths.iter().find(|p| !p.is_absolute()) {
            return Err(MigrateError::InvalidInput {
                field: "sync path".to_string(),
                reason: format!("{} is not absolute", p.display()),
            });
        }
        Ok(Self {
            identity,
            remote,
            export_path: export_path.to_string(),
            sync_paths,
            settings,
        })
    }
}

/// Check one DNS label per RFC 1123: 1-63 characters of ASCII letters, digits
/// and `-`, not starting or ending with `-`.
///
/// # Errors
///
/// [`MigrateError::InvalidInput`] naming `field`.
pub fn validate_label(field: &str, label: &str) -> Result<(), MigrateError> {
    let fail = |reason: &str| {
        Err(MigrateError::InvalidInput {
            field: field.to_string(),
            reason: format!("'{label}' {reason}"),
        })
    };

    if label.is_empty() {
        return fail("is empty");
    }
    if label.len() > 63 {
        return fail("is longer than 63 characters");
    }
    if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return fail("may only contain letters, digits and '-'");
    }
    if label.starts_with('-') || label.ends_with('-') {
        return fail("must not start or end with '-'");
    }
    Ok(())
}

fn validate_remote_field(field: &str, value: &str) -> Result<(), MigrateError> {
    if value.is_empty() {
        return Err(MigrateError::InvalidInput {
            field: field.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if value.chars().any(char::is_whitespace) {
        return Err(MigrateError::InvalidInput {
            field: field.to_string(),
            reason: format!("'{value}' contains whitespace"),
        });
    }
    if value.starts_with('-') {
        return Err(MigrateError::InvalidInput {
            field: field.to_string(),
            reason: format!("'{value}' must not start with '-'"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fqdn_without_domain() {
        let id = HostIdentity::new("zion", "").unwrap();
        assert_eq!(id.fqdn(), "zion");
    }

    #[test]
    fn test_fqdn_with_domain() {
        let id = HostIdentity::new("erp01", "corp.example.com").unwrap();
        assert_eq!(id.fqdn(), "erp01.corp.example.com");
    }

    #[test]
    fn test_trailing_dot_in_domain_is_dropped() {
        let id = HostIdentity::new("erp01", "example.com.").unwrap();
        assert_eq!(id.fqdn(), "erp01.example.com");
    }

    #[test]
    fn test_invalid_labels() {
        for bad in ["", "-erp", "erp-", "erp_01", "erp 01", "a.b", &"x".repeat(64)] {
            let err = HostIdentity::new(bad, "").unwrap_err();
            assert!(matches!(err, MigrateError::InvalidInput { .. }), "{bad:?} accepted");
        }
        assert!(HostIdentity::new("erp", "bad..domain").is_err());
    }

    #[test]
    fn test_remote_target_validation() {
        let target = RemoteTarget::new(" old.example.com ", "root", AuthMode::Key).unwrap();
        assert_eq!(target.destination(), "root@old.example.com");

        assert!(RemoteTarget::new("", "root", AuthMode::Key).is_err());
        assert!(RemoteTarget::new("old host", "root", AuthMode::Key).is_err());
        assert!(RemoteTarget::new("old", "ro ot", AuthMode::Key).is_err());
        assert!(RemoteTarget::new("-oProxyCommand=x", "root", AuthMode::Key).is_err());
        assert!(RemoteTarget::new("old", "a@b", AuthMode::Key).is_err());
    }

    #[test]
    fn test_config_takes_sync_paths_from_settings() {
        let settings = Arc::new(MigrationSettings::default());
        let remote = RemoteTarget::new("old", "root", AuthMode::Password).unwrap();
        let config = MigrationConfig::new(None, remote, "/opt/erp/backups/x.dmp", settings).unwrap();
        assert_eq!(config.sync_paths.len(), 6);
        assert_eq!(config.remote.auth, AuthMode::Password);
    }

    #[test]
    fn test_empty_export_path_rejected() {
        let settings = Arc::new(MigrationSettings::default());
        let remote = RemoteTarget::new("old", "root", AuthMode::Key).unwrap();
        assert!(MigrationConfig::new(None, remote, "  ", settings).is_err());
    }
}
