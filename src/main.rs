//! erp-migrate CLI entry point
//!
//! Parses the command line, runs the command and renders fatal errors with
//! details and a suggestion before exiting with status 1.

use anyhow::Result;
use clap::Parser;
use erp_migrate::cli;
use erp_migrate::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
