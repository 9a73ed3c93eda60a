//! Test utilities for erp-migrate
//!
//! Nothing here touches the real system:
//!
//! - [`RecordingRunner`] records every external command and replays scripted
//!   results, so workflows can be tested without ssh, rsync or systemd
//! - [`ScriptedPrompter`] answers prompts from a fixed list
//! - [`TestHost`] lays out a temporary directory as the target machine
//!
//! # Example
//!
//! ```rust,no_run
//! use erp_migrate::process::CommandOutput;
//! use erp_migrate::test_utils::{RecordingRunner, ScriptedPrompter, TestHost};
//!
//! let host = TestHost::new().unwrap();
//! let runner = RecordingRunner::new()
//!     .respond("systemctl is-active", CommandOutput::failed(3, "inactive"));
//! let prompter = ScriptedPrompter::new().text("").confirm(true);
//! ```

pub mod fixtures;
pub mod prompter;
pub mod runner;

pub use fixtures::{DEFAULT_HOSTS, TestHost};
pub use prompter::{Answer, ScriptedPrompter};
pub use runner::{RecordedCommand, RecordingRunner};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` if given, otherwise `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
