//! Command-line interface for erp-migrate
//!
//! # Commands
//!
//! - `run` - the whole migration: hostname, checks, mirror, restore, restart
//! - `hostname` - set the hostname and rewrite the hosts file only
//! - `check` - verify ssh access and the database export; changes nothing
//! - `sync` - mirror the application directories again and restart
//! - `init-config` - write a commented default settings file
//!
//! # Global Options
//!
//! - `--verbose` / `-v`: debug output on the console
//! - `--quiet` / `-q`: warnings and errors only
//! - `--config` / `-c`: settings file (default `/etc/erp-migrate/config.toml`)
//! - `--no-progress`: no spinners (also `ERP_MIGRATE_NO_PROGRESS`)
//!
//! `RUST_LOG` overrides the console level derived from the flags.
//!
//! # Examples
//!
//! ```bash
//! # Interactive migration
//! sudo erp-migrate run
//!
//! # Pre-answer everything except the password
//! sudo erp-migrate run --hostname erp01 --domain corp.example.com \
//!     --remote-host old-erp --remote-user root --auth password
//!
//! # Mirror again after the old server changed
//! sudo erp-migrate sync --remote-host old-erp
//! ```

mod check;
pub mod common;
mod hostname;
mod init_config;
mod run;
mod sync;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::console_level;
use crate::utils::progress_enabled;

/// Settings derived from the global flags, handed to every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Console log level
    pub log_level: &'static str,
    /// Whether spinners may be drawn
    pub show_progress: bool,
    /// Settings file given with `--config`
    pub config_path: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: "info",
            show_progress: false,
            config_path: None,
        }
    }
}

/// One-shot migration of an ERP installation onto this machine.
#[derive(Parser)]
#[command(
    name = "erp-migrate",
    about = "Migrate an ERP installation from an old server onto this machine",
    version,
    long_about = "Sets the new hostname, mirrors the application directories from the old \
                  server over ssh/rsync, restores the database through the site scripts \
                  and restarts the service. Every step is logged to a timestamped file."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug output on the console
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only warnings and errors on the console
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Settings file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable progress spinners
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole migration
    Run(run::RunCommand),

    /// Set the hostname and rewrite the hosts file
    Hostname(hostname::HostnameCommand),

    /// Check ssh access and the database export on the old server
    Check(check::CheckCommand),

    /// Mirror the application directories again and restart the service
    Sync(sync::SyncCommand),

    /// Write a default settings file
    InitConfig(init_config::InitConfigCommand),
}

impl Cli {
    /// Execute the selected command.
    ///
    /// # Errors
    ///
    /// Any fatal error of the command; the caller renders it and exits `1`.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Derive the [`CliConfig`] from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        CliConfig {
            log_level: console_level(self.verbose, self.quiet),
            show_progress: progress_enabled(self.no_progress),
            config_path: self.config.clone(),
        }
    }

    /// Execute with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Any fatal error of the command.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute(&config).await,
            Commands::Hostname(cmd) => cmd.execute(&config).await,
            Commands::Check(cmd) => cmd.execute(&config).await,
            Commands::Sync(cmd) => cmd.execute(&config).await,
            Commands::InitConfig(cmd) => cmd.execute(&config).await,
        }
    }
}
