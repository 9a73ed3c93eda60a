//! Settings file (`/etc/erp-migrate/config.toml`).
//!
//! Site-specific values that rarely change between runs: the unit name, the
//! application tree, the directories to mirror and where logs go. A missing
//! file means "use the defaults"; a malformed file is a fatal error.
//!
//! ```toml
//! service_name = "erp.service"
//! app_root = "/opt/erp"
//! sync_paths = ["/opt/erp/data", "/opt/erp/filestore"]
//! restart_policy = "warn"
//! host_match = "token"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::constants::*;
use crate::core::MigrateError;

/// What a failed final service check means for the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RestartPolicy {
    /// Show the journal and exit non-zero.
    #[default]
    Fatal,
    /// Show the journal, record a warning and exit zero.
    Warn,
}

/// How hosts-file lines are matched against the old hostname and new FQDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMatchMode {
    /// A line matches only if one of its hostname fields equals the name.
    #[default]
    Token,
    /// A line matches if the name occurs anywhere in it (legacy behavior).
    Substring,
}

/// Site settings loaded from TOML. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    /// Systemd unit of the application
    pub service_name: String,
    /// Application tree whose ownership and mode are reset
    pub app_root: PathBuf,
    /// `user:group` for `chown -R`
    pub app_owner: String,
    /// Mode for `chmod -R`
    pub app_mode: String,
    /// Local directory holding the delegate scripts
    pub utils_dir: PathBuf,
    /// Database restore delegate (file name inside `utils_dir`)
    pub restore_script: String,
    /// Schema/data sync delegate (file name inside `utils_dir`)
    pub sync_script: String,
    /// Export delegate named in guidance when the export is missing
    pub export_script_hint: String,
    /// Default location of the database export on the old server
    pub export_path: String,
    /// Directories to mirror, in order
    pub sync_paths: Vec<PathBuf>,
    /// Hosts file to rewrite
    pub hosts_file: PathBuf,
    /// Directory for run logs and reports
    pub log_dir: PathBuf,
    /// Write a JSON run report next to the log
    pub report_json: bool,
    /// Consequence of a failed final service check
    pub restart_policy: RestartPolicy,
    /// Hosts-file matching mode
    pub host_match: HostMatchMode,
    /// Delay between `systemctl start` and the `is-active` check
    pub restart_settle_secs: u64,
    /// Journal lines printed when the service does not come back
    pub journal_lines: u32,
    /// ssh `ConnectTimeout`
    pub ssh_connect_timeout_secs: u64,
    /// Package managers probed, in order, to install the password helper
    pub package_managers: Vec<String>,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            app_root: PathBuf::from(DEFAULT_APP_ROOT),
            app_owner: DEFAULT_APP_OWNER.to_string(),
            app_mode: DEFAULT_APP_MODE.to_string(),
            utils_dir: PathBuf::from(DEFAULT_UTILS_DIR),
            restore_script: DEFAULT_RESTORE_SCRIPT.to_string(),
            sync_script: DEFAULT_SYNC_SCRIPT.to_string(),
            export_script_hint: DEFAULT_EXPORT_SCRIPT.to_string(),
            export_path: DEFAULT_EXPORT_PATH.to_string(),
            sync_paths: DEFAULT_SYNC_PATHS.iter().map(PathBuf::from).collect(),
            hosts_file: PathBuf::from(DEFAULT_HOSTS_FILE),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            report_json: true,
            restart_policy: RestartPolicy::default(),
            host_match: HostMatchMode::default(),
            restart_settle_secs: DEFAULT_RESTART_SETTLE_SECS,
            journal_lines: DEFAULT_JOURNAL_LINES,
            ssh_connect_timeout_secs: DEFAULT_SSH_CONNECT_TIMEOUT_SECS,
            package_managers: ["apt-get", "dnf", "yum", "zypper", "pacman"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl MigrationSettings {
    /// Load from an explicit path, or from the default location if none is given.
    ///
    /// An explicit path must exist. The default path may be absent, in which
    /// case the built-in defaults are used.
    ///
    /// # Errors
    ///
    /// Fails if an explicit file is missing, a file cannot be read or parsed,
    /// or the loaded settings are invalid.
    pub async fn load_with_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path).await,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load_from(default).await
                } else {
                    tracing::debug!("No settings file at {}, using defaults", default.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load and validate settings from `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not valid TOML, or fails validation.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))?;
        settings.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Write the settings as TOML with mode 0600.
    ///
    /// # Errors
    ///
    /// Fails if serialization, directory creation or the write fails.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        let body = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        let content = format!(
            "# erp-migrate settings\n# Generated by 'erp-migrate init-config'. Remove a key to use its default.\n\n{body}"
        );

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).await.with_context(|| {
                format!("Failed to set permissions on {}", path.display())
            })?;
        }

        Ok(())
    }

    /// Check values that would otherwise fail late in the run.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), MigrateError> {
        let invalid = |message: String| Err(MigrateError::Config { message });

        if self.service_name.trim().is_empty() {
            return invalid("service_name must not be empty".to_string());
        }
        if self.sync_paths.is_empty() {
            return invalid("sync_paths must list at least one directory".to_string());
        }
        if let Some(p) = self.sync_paths.iter().find(|p| !p.is_absolute()) {
            return invalid(format!("sync path must be absolute: {}", p.display()));
        }
        if !self.app_root.is_absolute() {
            return invalid(format!("app_root must be absolute: {}", self.app_root.display()));
        }
        if !self.app_owner.contains(':') {
            return invalid(format!("app_owner must be 'user:group', got '{}'", self.app_owner));
        }
        if self.restore_script.contains('/') || self.sync_script.contains('/') {
            return invalid("restore_script and sync_script are file names inside utils_dir".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_have_six_sync_paths() {
        let settings = MigrationSettings::default();
        assert_eq!(settings.sync_paths.len(), 6);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.restart_policy, RestartPolicy::Fatal);
        assert_eq!(settings.host_match, HostMatchMode::Token);
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults_for_the_rest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "service_name = \"odoo.service\"\nrestart_policy = \"warn\"\n")
            .await
            .unwrap();

        let settings = MigrationSettings::load_from(&path).await.unwrap();
        assert_eq!(settings.service_name, "odoo.service");
        assert_eq!(settings.restart_policy, RestartPolicy::Warn);
        assert_eq!(settings.hosts_file, PathBuf::from("/etc/hosts"));
    }

    #[tokio::test]
    async fn test_round_trip_and_permissions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");
        let settings = MigrationSettings::default();
        settings.save_to(&path).await.unwrap();

        let loaded = MigrationSettings::load_from(&path).await.unwrap();
        assert_eq!(loaded, settings);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[tokio::test]
    async fn test_relative_sync_path_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "sync_paths = [\"data\"]\n").await.unwrap();

        let err = MigrationSettings::load_from(&path).await.unwrap_err();
        assert!(err.to_string().contains("absolute") || format!("{err:#}").contains("absolute"));
    }

    #[tokio::test]
    async fn test_explicit_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        assert!(MigrationSettings::load_with_optional(Some(&missing)).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_toml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "service_name = [unterminated\n").await.unwrap();
        assert!(MigrationSettings::load_from(&path).await.is_err());
    }
}
