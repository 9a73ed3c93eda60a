//! Write a default settings file.
//!
//! ```bash
//! # Default location
//! sudo erp-migrate init-config
//!
//! # Somewhere else, replacing an existing file
//! erp-migrate init-config --path ./config.toml --force
//! ```
//!
//! The file is written with mode `0600` and lists every key with its default.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::CliConfig;
use crate::config::MigrationSettings;
use crate::constants::DEFAULT_CONFIG_PATH;
use crate::core::MigrateError;

#[derive(Args)]
pub struct InitConfigCommand {
    /// Where to write the file (default: --config, then /etc/erp-migrate/config.toml)
    #[arg(short, long, value_name = "FILE")]
    path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(short, long)]
    force: bool,
}

impl InitConfigCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let path = self
            .path
            .or_else(|| cli.config_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        if path.exists() && !self.force {
            return Err(MigrateError::Config {
                message: format!("{} already exists. Use --force to overwrite", path.display()),
            }
            .into());
        }

        MigrationSettings::default().save_to(&path).await?;
        println!("{} Wrote default settings to {}", "✓".green(), path.display());
        Ok(())
    }
}
