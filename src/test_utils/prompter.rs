//! Prompter that replays a fixed list of answers.

use anyhow::{Result, bail};
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::prompt::Prompter;
use crate::remote::Secret;

/// One scripted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    Confirm(bool),
    Select(usize),
    Password(String),
    /// Accept whatever default the prompt offers
    Default,
}

/// Answers prompts in order and fails on an unexpected question.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(self, value: &str) -> Self {
        self.push(Answer::Text(value.to_string()))
    }

    #[must_use]
    pub fn confirm(self, value: bool) -> Self {
        self.push(Answer::Confirm(value))
    }

    #[must_use]
    pub fn select(self, index: usize) -> Self {
        self.push(Answer::Select(index))
    }

    #[must_use]
    pub fn password(self, value: &str) -> Self {
        self.push(Answer::Password(value.to_string()))
    }

    #[must_use]
    pub fn default_answer(self) -> Self {
        self.push(Answer::Default)
    }

    fn push(self, answer: Answer) -> Self {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(answer);
        }
        self
    }

    /// Prompts asked so far, in order.
    #[must_use]
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// Answers not consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.answers.lock().map(|a| a.len()).unwrap_or_default()
    }

    fn next(&self, prompt: &str) -> Result<Answer> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(prompt.to_string());
        }
        let next = self.answers.lock().ok().and_then(|mut a| a.pop_front());
        match next {
            Some(answer) => Ok(answer),
            None => bail!("unexpected prompt: {prompt}"),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&self, prompt: &str, default: Option<&str>, allow_empty: bool) -> Result<String> {
        match self.next(prompt)? {
            Answer::Text(value) if value.is_empty() && !allow_empty => {
                default.map(ToString::to_string).ok_or_else(|| anyhow::anyhow!("empty answer to '{prompt}'"))
            }
            Answer::Text(value) => Ok(value),
            Answer::Default => Ok(default.unwrap_or_default().to_string()),
            other => bail!("expected text for '{prompt}', script has {other:?}"),
        }
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        match self.next(prompt)? {
            Answer::Confirm(value) => Ok(value),
            Answer::Default => Ok(default),
            other => bail!("expected yes/no for '{prompt}', script has {other:?}"),
        }
    }

    fn select(&self, prompt: &str, items: &[&str], default: usize) -> Result<usize> {
        match self.next(prompt)? {
            Answer::Select(index) if index < items.len() => Ok(index),
            Answer::Default => Ok(default),
            other => bail!("expected a choice for '{prompt}', script has {other:?}"),
        }
    }

    fn password(&self, prompt: &str) -> Result<Secret> {
        match self.next(prompt)? {
            Answer::Password(value) => Ok(Secret::new(value)),
            other => bail!("expected a password for '{prompt}', script has {other:?}"),
        }
    }
}
