//! Operator prompts
//!
//! Every question the migration asks goes through [`Prompter`], in the order
//! the workflow needs the answers. [`TerminalPrompter`] asks on the terminal
//! with `dialoguer`; the password is read with `rpassword` so it is never
//! echoed. Tests use a scripted implementation from `test_utils`.
//!
//! Answers given as command-line flags are never asked for.

use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use std::io::IsTerminal;

use crate::core::MigrateError;
use crate::remote::Secret;

/// Source of operator answers.
pub trait Prompter: Send + Sync {
    /// Ask for a line of text.
    ///
    /// `default` is returned when the operator just presses enter. With
    /// `allow_empty`, an empty answer is returned as `""` instead of re-asking.
    fn input(&self, prompt: &str, default: Option<&str>, allow_empty: bool) -> Result<String>;

    /// Ask a yes/no question.
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;

    /// Pick one of `items`; returns its index.
    fn select(&self, prompt: &str, items: &[&str], default: usize) -> Result<usize>;

    /// Read a password without echo.
    fn password(&self, prompt: &str) -> Result<Secret>;
}

impl<P: Prompter + ?Sized> Prompter for &P {
    fn input(&self, prompt: &str, default: Option<&str>, allow_empty: bool) -> Result<String> {
        (**self).input(prompt, default, allow_empty)
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        (**self).confirm(prompt, default)
    }

    fn select(&self, prompt: &str, items: &[&str], default: usize) -> Result<usize> {
        (**self).select(prompt, items, default)
    }

    fn password(&self, prompt: &str) -> Result<Secret> {
        (**self).password(prompt)
    }
}

/// Prompts on the controlling terminal.
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    /// Create a prompter.
    ///
    /// Nothing is checked here: a run whose answers all come from flags never
    /// needs a terminal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

/// Fail with [`MigrateError::Aborted`] unless stdin is a terminal.
fn require_terminal(prompt: &str) -> Result<()> {
    if std::io::stdin().is_terminal() {
        return Ok(());
    }
    tracing::debug!("Cannot ask '{}' without a terminal", prompt);
    Err(MigrateError::Aborted {
        reason: "stdin is not a terminal, cannot ask for missing answers".to_string(),
    }
    .into())
}

impl std::fmt::Debug for TerminalPrompter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TerminalPrompter")
    }
}

impl Prompter for TerminalPrompter {
    fn input(&self, prompt: &str, default: Option<&str>, allow_empty: bool) -> Result<String> {
        require_terminal(prompt)?;
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(allow_empty);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        let answer = input
            .interact_text()
            .with_context(|| format!("Failed to read answer for '{prompt}'"))?;
        tracing::debug!("Prompt '{}' answered with '{}'", prompt, answer);
        Ok(answer.trim().to_string())
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        require_terminal(prompt)?;
        let answer = Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()
            .with_context(|| format!("Failed to read answer for '{prompt}'"))?;
        tracing::debug!("Prompt '{}' answered with {}", prompt, answer);
        Ok(answer)
    }

    fn select(&self, prompt: &str, items: &[&str], default: usize) -> Result<usize> {
        require_terminal(prompt)?;
        let index = Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()
            .with_context(|| format!("Failed to read answer for '{prompt}'"))?;
        tracing::debug!("Prompt '{}' answered with '{}'", prompt, items[index]);
        Ok(index)
    }

    fn password(&self, prompt: &str) -> Result<Secret> {
        require_terminal(prompt)?;
        let value = rpassword::prompt_password(format!("{prompt}: "))
            .context("Failed to read password")?;
        tracing::debug!("Prompt '{}' answered (hidden)", prompt);
        Ok(Secret::new(value))
    }
}
