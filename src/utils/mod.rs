//! Shared helpers
//!
//! - [`fs`] - directory creation, atomic replacement and timestamped backups
//! - [`progress`] - spinners for long-running steps
//! - [`shell`] - quoting for commands run by the remote shell

pub mod fs;
pub mod progress;
pub mod shell;

pub use fs::{atomic_write, backup_file, ensure_dir};
pub use progress::{progress_enabled, spinner};
pub use shell::quote;

/// Timestamp used in log, report and backup file names (`YYYYmmdd_HHMMSS`, local time).
#[must_use]
pub fn run_stamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}
