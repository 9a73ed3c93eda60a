//! Run log
//!
//! Two `tracing` sinks are installed once per process:
//!
//! - the console, with a compact symbol-per-level format (`[+]` info,
//!   `[*]` warning, `[-]` error, `[?]` debug, `[ ]` trace)
//! - a plain-text file `<log_dir>/migration_<stamp>.log`, opened in append
//!   mode and never truncated, which receives every step banner, warning and
//!   line of subprocess output
//!
//! `RUST_LOG` overrides the console level chosen from `--verbose`/`--quiet`.
//! Fatal errors are printed to stderr by [`crate::core::ErrorContext`] and
//! reach the file through the `erp_migrate::fatal` target; the end-of-run
//! summary does the same with `erp_migrate::summary`. The console layer
//! ignores both targets so nothing is shown twice.

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{self, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::report::SUMMARY_TARGET;
use crate::utils::ensure_dir;

/// Target used for fatal errors; file only.
pub const FATAL_TARGET: &str = "erp_migrate::fatal";

/// Target of subprocess output and exit codes.
pub const PROCESS_TARGET: &str = "erp_migrate::process";

/// Console format: a coloured level symbol followed by the message.
pub struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> format::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let (symbol, paint): (&str, fn(ColoredString) -> ColoredString) =
            match *event.metadata().level() {
                Level::TRACE => ("[ ]", |s| s.dimmed()),
                Level::DEBUG => ("[?]", |s| s.blue()),
                Level::INFO => ("[+]", |s| s.green().bold()),
                Level::WARN => ("[*]", |s| s.yellow().bold()),
                Level::ERROR => ("[-]", |s| s.red().bold()),
            };

        write!(writer, "{} ", paint(symbol.into()))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// The log file of this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLog {
    path: PathBuf,
    stamp: String,
}

impl RunLog {
    /// Create (or append to) `<log_dir>/migration_<stamp>.log`.
    ///
    /// # Errors
    ///
    /// Fails if the directory or the file cannot be created.
    pub fn create(log_dir: &Path, stamp: &str) -> Result<(Self, File)> {
        ensure_dir(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
        let path = log_dir.join(format!("migration_{stamp}.log"));

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o640);
        }
        let file = options
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        Ok((
            Self {
                path,
                stamp: stamp.to_string(),
            },
            file,
        ))
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Timestamp shared by the log, the report and hosts-file backups.
    #[must_use]
    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// Path of the JSON report written next to the log.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.path.with_file_name(format!("migration_{}.report.json", self.stamp))
    }
}

/// Console level for the global flags.
#[must_use]
pub const fn console_level(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

fn console_filter(level: &str) -> Result<EnvFilter> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).context("Invalid log level")?,
    };
    Ok(filter
        .add_directive(format!("{FATAL_TARGET}=off").parse()?)
        .add_directive(format!("{SUMMARY_TARGET}=off").parse()?))
}

fn file_filter(level: &str) -> Result<EnvFilter> {
    let file_level = if level == "debug" || level == "trace" { level } else { "info" };
    Ok(EnvFilter::try_new(file_level)
        .context("Invalid log level")?
        .add_directive(format!("{PROCESS_TARGET}=debug").parse()?))
}

/// The console sink and, if given, the file sink, not yet installed.
///
/// The file always records at least `info`, and `debug` when the console
/// does. Captured subprocess output (target `erp_migrate::process`) always
/// reaches the file.
///
/// # Errors
///
/// Fails if the filter is invalid.
pub fn subscriber(level: &str, run_log: Option<File>) -> Result<impl Subscriber + Send + Sync + 'static> {
    let console = tracing_subscriber::fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(std::io::stdout)
        .with_filter(console_filter(level)?);

    let file = match run_log {
        Some(file) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(file_filter(level)?),
        ),
        None => None,
    };

    Ok(tracing_subscriber::registry().with(console).with(file))
}

/// Install [`subscriber`] as the global default.
///
/// # Errors
///
/// Fails if the filter is invalid or a global subscriber is already installed.
pub fn init_logging(level: &str, run_log: Option<File>) -> Result<()> {
    subscriber(level, run_log)?
        .try_init()
        .context("Failed to install the log subscriber")?;
    Ok(())
}
