//! Error handling for erp-migrate
//!
//! The error system follows two rules:
//! 1. **Strongly-typed errors** ([`MigrateError`]) for every fatal condition of a run
//! 2. **User-friendly messages** ([`ErrorContext`]) with actionable suggestions on stderr
//!
//! Tolerated failures (a single sync path, a delegate script exiting non-zero)
//! are *not* errors. They are recorded as [`crate::report::StepOutcome::Failed`]
//! values and the run continues. Anything that reaches `main` as an `Err` ends
//! the process with exit status 1.
//!
//! # Examples
//!
//! ```rust,no_run
//! use erp_migrate::core::{MigrateError, ErrorContext, user_friendly_error};
//!
//! let ctx = user_friendly_error(anyhow::Error::from(MigrateError::NotRoot { uid: 1000 }));
//! ctx.display(); // red "error:" line, yellow details, green suggestion
//!
//! let manual = ErrorContext::new(MigrateError::UtilsDirMissing {
//!     path: "/opt/erp/utils".to_string(),
//! })
//! .with_suggestion("Copy the database utilities to /opt/erp/utils");
//! println!("{manual}");
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Fatal failure modes of a migration run.
///
/// Each variant maps to one of the conditions that stop the run immediately:
/// privilege, connectivity, the export file, the service refusing to stop,
/// missing delegate scripts, and the final service check under the fatal
/// restart policy. The remaining variants cover command execution and input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrateError {
    /// The process is not running with effective UID 0.
    #[error("This operation must be run as root (effective uid {uid})")]
    NotRoot {
        /// Effective UID of the current process
        uid: u32,
    },

    /// The reachability probe over ssh did not succeed.
    #[error("Cannot reach {target} over ssh")]
    RemoteUnreachable {
        /// `user@host` that was probed
        target: String,
        /// stderr of the failed ssh invocation
        reason: String,
    },

    /// The database export does not exist on the old host and the operator declined to continue.
    #[error("Database export not found on remote host: {path}")]
    ExportMissing {
        /// Remote path that was checked
        path: String,
        /// Script that creates the export on the old host
        export_hint: String,
    },

    /// The service was still active after the stop request.
    #[error("Service '{service}' is still active after stop request")]
    ServiceStillActive {
        /// Unit name
        service: String,
    },

    /// The service did not report active after the restart (fatal policy only).
    #[error("Service '{service}' is not active after restart (state: {state})")]
    ServiceNotActive {
        /// Unit name
        service: String,
        /// Last state reported by `systemctl is-active`
        state: String,
    },

    /// The local utilities directory with the delegate scripts is absent.
    #[error("Utilities directory not found: {path}")]
    UtilsDirMissing {
        /// Expected directory
        path: String,
    },

    /// The password helper could not be found or installed.
    #[error("Password helper '{helper}' is not available")]
    HelperUnavailable {
        /// Helper binary name
        helper: String,
        /// What went wrong while locating or installing it
        reason: String,
    },

    /// An external command exited non-zero where success is required.
    #[error("Command failed: {command}")]
    CommandFailed {
        /// Program and arguments as logged (never contains secrets)
        command: String,
        /// Exit code if the process exited normally
        code: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// An external command did not finish in time.
    #[error("Command timed out after {seconds}s: {command}")]
    CommandTimeout {
        /// Program and arguments as logged
        command: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// Operator input failed validation.
    #[error("Invalid {field}: {reason}")]
    InvalidInput {
        /// Which answer or flag was invalid
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// The settings file could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// The operator aborted at a prompt.
    #[error("Migration aborted: {reason}")]
    Aborted {
        /// Prompt or decision that ended the run
        reason: String,
    },

    /// Catch-all carrying a preformatted message.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

/// A [`MigrateError`] plus optional details and a suggestion for the operator.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: MigrateError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context with no suggestion or details.
    #[must_use]
    pub const fn new(error: MigrateError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion, displayed in green.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details, displayed in yellow.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details and suggestion to stderr with terminal colors.
    ///
    /// The plain-text form is also emitted at error level so the run log
    /// carries the same line the operator saw.
    pub fn display(&self) {
        tracing::error!(target: crate::logging::FATAL_TARGET, "{}", self.to_string().replace('\n', " | "));

        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with suggestions for the CLI.
///
/// Recognizes [`MigrateError`] anywhere in the chain, [`std::io::Error`] and
/// [`toml::de::Error`]; everything else is shown with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(migrate_error) = cause.downcast_ref::<MigrateError>() {
            return create_error_context(migrate_error.clone());
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(MigrateError::Other {
                    message: format!("Permission denied: {io_error}"),
                })
                .with_suggestion("Run the migration with sudo")
                .with_details("The hosts file, service manager and application tree require root");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(MigrateError::Other {
                    message: format!("Not found: {io_error}"),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(MigrateError::Config {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of the settings file, or regenerate it with 'erp-migrate init-config --force'");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(MigrateError::Other {
        message,
    })
}

fn create_error_context(error: MigrateError) -> ErrorContext {
    match &error {
        MigrateError::NotRoot { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Re-run with 'sudo erp-migrate ...'")
            .with_details("Editing /etc/hosts, controlling services and resetting ownership require root"),

        MigrateError::RemoteUnreachable { target, reason } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Verify the address, that sshd is running on the old server, and try 'ssh {target} true' manually"
            ))
            .with_details(if reason.trim().is_empty() {
                "ssh exited without output".to_string()
            } else {
                reason.trim().to_string()
            }),

        MigrateError::ExportMissing { export_hint, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!("Run {export_hint} on the old server first, then start the migration again")),

        MigrateError::ServiceStillActive { service } => ErrorContext::new(error.clone())
            .with_suggestion(format!("Stop it manually with 'systemctl stop {service}' and check 'systemctl status {service}'"))
            .with_details("Data is never mirrored into a running application"),

        MigrateError::ServiceNotActive { service, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!("Inspect 'journalctl -u {service}' and start it with 'systemctl start {service}'"))
            .with_details("All migration steps completed; only the final service check failed"),

        MigrateError::UtilsDirMissing { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Install the database utilities on this server or set 'utils_dir' in the settings file")
            .with_details("The restore delegates run locally and are never fetched from the old server"),

        MigrateError::HelperUnavailable { helper, reason } => ErrorContext::new(error.clone())
            .with_suggestion(format!("Install '{helper}' with your package manager, or use key-based authentication"))
            .with_details(reason.clone()),

        MigrateError::CommandFailed { stderr, .. } if !stderr.trim().is_empty() => {
            ErrorContext::new(error.clone()).with_details(stderr.trim().to_string())
        }

        MigrateError::CommandTimeout { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Check network connectivity and whether the command is waiting for input"),

        MigrateError::Config { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Regenerate a default settings file with 'erp-migrate init-config --force'"),

        _ => ErrorContext::new(error),
    }
}
