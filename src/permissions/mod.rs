//! Ownership and mode reset of the application tree.
//!
//! rsync preserves the old server's numeric owners, which rarely match the
//! new machine. `chown -R` and `chmod -R` put the tree back under the
//! application account. Failures are recorded, not fatal.

use std::path::Path;

use crate::constants::SYSTEM_COMMAND_TIMEOUT;
use crate::process::{CommandRunner, SystemCommand};
use crate::report::StepOutcome;

/// Apply `owner` (`user:group`) and `mode` recursively under `root`.
pub async fn fix_permissions<R: CommandRunner>(runner: &R, root: &Path, owner: &str, mode: &str) -> StepOutcome {
    if !root.is_dir() {
        tracing::warn!("{} does not exist, skipping ownership fix", root.display());
        return StepOutcome::Skipped(format!("{} does not exist", root.display()));
    }

    tracing::info!("Setting ownership {} and mode {} on {}", owner, mode, root.display());
    let root = root.to_string_lossy();
    let commands = [
        SystemCommand::new("chown").args(["-R", owner]).arg(root.as_ref()),
        SystemCommand::new("chmod").args(["-R", mode]).arg(root.as_ref()),
    ];

    let mut failures = Vec::new();
    for command in commands {
        let line = command.display_line();
        match runner.run(command.with_timeout(Some(SYSTEM_COMMAND_TIMEOUT))).await {
            Ok(output) if output.success() => {}
            Ok(output) => {
                tracing::warn!("'{}' failed: {}", line, output.stderr.trim());
                failures.push(format!("{line}: {}", output.stderr.trim()));
            }
            Err(e) => {
                tracing::warn!("'{}' could not run: {e:#}", line);
                failures.push(format!("{line}: {e:#}"));
            }
        }
    }

    if failures.is_empty() {
        StepOutcome::Succeeded
    } else {
        StepOutcome::Failed(failures.join("; "))
    }
}
