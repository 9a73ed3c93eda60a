//! erp-migrate - one-shot migration of an ERP installation onto a new server
//!
//! Run as root on the freshly installed machine. The tool asks for the new
//! hostname and the old server, then:
//!
//! 1. sets the hostname and rewrites `/etc/hosts` (with a timestamped backup)
//! 2. negotiates ssh access to the old server (key, or password via `sshpass`)
//! 3. verifies the old server is reachable and the database export exists
//! 4. stops the application service
//! 5. mirrors each application directory with `rsync --delete`
//! 6. resets ownership and mode of the application tree
//! 7. runs the site's restore and sync scripts
//! 8. starts the service and checks that it came back
//!
//! Every step is logged to the console and to
//! `/var/log/erp-migrate/migration_<YYYYmmdd_HHMMSS>.log`; a summary of all
//! step outcomes ends the run.
//!
//! # Modules
//!
//! ## Workflow
//! - [`workflow`] - the ordered steps and their fatal/tolerated semantics
//! - [`cli`] - command tree and flag handling
//! - [`config`] - settings file and per-run configuration
//!
//! ## Steps
//! - [`preflight`] - privilege, reachability and export checks
//! - [`hostname`] - hosts-file rewrite and hostname apply
//! - [`remote`] - ssh connection options and the password helper
//! - [`service`] - systemd stop/start/status
//! - [`sync`] - per-directory rsync mirror
//! - [`permissions`] - ownership and mode reset
//! - [`restore`] - delegate scripts
//!
//! ## Support
//! - [`core`] - error types and operator-facing error rendering
//! - [`logging`] - console and log-file sinks
//! - [`process`] - external command execution
//! - [`prompt`] - interactive questions
//! - [`report`] - step outcomes and the run summary
//! - [`utils`] - file helpers, quoting, progress spinners

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod hostname;
pub mod logging;
pub mod permissions;
pub mod preflight;
pub mod process;
pub mod prompt;
pub mod remote;
pub mod report;
pub mod restore;
pub mod service;
pub mod sync;
pub mod utils;
pub mod workflow;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
