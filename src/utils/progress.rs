//! Progress indicators for long-running steps
//!
//! Mirroring a directory tree can take minutes; a spinner shows the most
//! recent transfer line while rsync runs. Spinners are hidden when:
//! - `--no-progress` was given
//! - the `ERP_MIGRATE_NO_PROGRESS` environment variable is set
//! - stdout is not a terminal (pipes, redirects, `nohup`)
//!
//! A hidden bar accepts every call and draws nothing, so callers never branch.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

use crate::constants::NO_PROGRESS_ENV_VAR;

/// Decide whether spinners may be drawn.
#[must_use]
pub fn progress_enabled(no_progress_flag: bool) -> bool {
    !no_progress_flag
        && std::env::var_os(NO_PROGRESS_ENV_VAR).is_none()
        && std::io::stdout().is_terminal()
}

/// Create a spinner with a prefix (e.g. `[3/6]`) and an initial message.
///
/// Returns a hidden bar when `enabled` is false.
#[must_use]
pub fn spinner(prefix: impl Into<String>, msg: impl Into<String>, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(spinner_style());
    bar.set_prefix(prefix.into());
    bar.set_message(msg.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{prefix:.bold.cyan} {spinner:.cyan} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}
