//! Filesystem fixture standing in for the new server.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::config::{AuthMode, HostIdentity, MigrationConfig, MigrationSettings, RemoteTarget};

/// Hosts file of a freshly installed machine.
pub const DEFAULT_HOSTS: &str = "\
127.0.0.1 localhost
127.0.1.1 oldbox.corp.local oldbox
10.0.0.5 oldboxdb
";

/// A temporary directory laid out like the target machine: hosts file,
/// utility directory with both delegate scripts, application root and six
/// sync directories (not created; the sync step creates them).
pub struct TestHost {
    temp: TempDir,
    pub settings: MigrationSettings,
}

impl TestHost {
    /// Create the layout with [`DEFAULT_HOSTS`] and an existing utility directory.
    ///
    /// # Errors
    ///
    /// Fails if the temporary directory cannot be populated.
    pub fn new() -> Result<Self> {
        let temp = TempDir::new().context("Failed to create temp dir")?;
        let root = temp.path();

        let hosts_file = root.join("etc/hosts");
        fs::create_dir_all(root.join("etc"))?;
        fs::write(&hosts_file, DEFAULT_HOSTS)?;

        let app_root = root.join("opt/erp");
        let utils_dir = app_root.join("utils");
        fs::create_dir_all(&utils_dir)?;
        let defaults = MigrationSettings::default();
        for script in [&defaults.restore_script, &defaults.sync_script] {
            fs::write(utils_dir.join(script), "#!/bin/bash\nexit 0\n")?;
        }

        let sync_paths = ["data", "filestore", "attachments", "reports", "custom", "backups"]
            .iter()
            .map(|name| app_root.join(name))
            .collect();

        let settings = MigrationSettings {
            app_root,
            utils_dir,
            sync_paths,
            hosts_file,
            log_dir: root.join("var/log/erp-migrate"),
            restart_settle_secs: 0,
            ..MigrationSettings::default()
        };

        Ok(Self { temp, settings })
    }

    /// Root of the fixture.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// The fixture's hosts file.
    #[must_use]
    pub fn hosts_file(&self) -> &Path {
        &self.settings.hosts_file
    }

    /// Current hosts-file content.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read.
    pub fn hosts_content(&self) -> Result<String> {
        Ok(fs::read_to_string(self.hosts_file())?)
    }

    /// Remove the utility directory.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be removed.
    pub fn remove_utils_dir(&self) -> Result<()> {
        fs::remove_dir_all(&self.settings.utils_dir)?;
        Ok(())
    }

    /// Sibling backups of the hosts file.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be listed.
    pub fn hosts_backups(&self) -> Result<Vec<PathBuf>> {
        let dir = self.hosts_file().parent().unwrap_or(self.root());
        let mut backups: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.file_name().is_some_and(|n| n.to_string_lossy().starts_with("hosts.bak.")))
            .collect();
        backups.sort();
        Ok(backups)
    }

    /// A run configuration for `zion` (no domain) pulling from `root@old` with key auth.
    ///
    /// # Errors
    ///
    /// Fails only if the fixture settings are invalid.
    pub fn config(&self) -> Result<MigrationConfig> {
        self.config_with(AuthMode::Key)
    }

    /// As [`Self::config`] with the given auth mode.
    ///
    /// # Errors
    ///
    /// Fails only if the fixture settings are invalid.
    pub fn config_with(&self, auth: AuthMode) -> Result<MigrationConfig> {
        let identity = HostIdentity::new("zion", "")?;
        let remote = RemoteTarget::new("old", "root", auth)?;
        Ok(MigrationConfig::new(
            Some(identity),
            remote,
            &self.settings.export_path,
            Arc::new(self.settings.clone()),
        )?)
    }
}
