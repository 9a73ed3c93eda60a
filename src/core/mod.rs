//! Core types for erp-migrate
//!
//! Error handling lives here:
//! - [`MigrateError`] enumerates every fatal condition of a run
//! - [`ErrorContext`] wraps an error with details and a suggestion for the operator
//! - [`user_friendly_error`] converts any [`anyhow::Error`] for display in `main`

pub mod error;

pub use error::{ErrorContext, MigrateError, user_friendly_error};
