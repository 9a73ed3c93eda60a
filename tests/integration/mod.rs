//! Integration test suite for erp-migrate
//!
//! End-to-end tests of the migration workflow and the binary. The workflow
//! tests drive the library through the `test-utils` feature: a recording
//! command runner stands in for ssh, rsync, systemd and the delegates, a
//! scripted prompter answers the questions, and a temporary directory plays
//! the new server. Nothing here touches the real system.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: binary-level behavior (`--help`, `init-config`, error rendering)
//! - **logging**: run-log file and JSON report
//! - **workflow**: complete runs and their reports

mod cli;
mod logging;
mod workflow;
