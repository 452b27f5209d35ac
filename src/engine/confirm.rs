//! Human confirmation before destructive operations.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Mutex;

/// Asks the operator to approve a mutation.
///
/// Delete and Undelete ask once (skippable with `assume_yes`); Destroy always
/// asks twice.
pub trait ConfirmationPrompt: Send + Sync + Debug {
    fn ask(&self, message: &str) -> bool;
}

/// Approves everything. Only for automation that has already confirmed out of band.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl ConfirmationPrompt for AutoConfirm {
    fn ask(&self, _message: &str) -> bool {
        true
    }
}

/// Declines everything; the default for non-interactive engines.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclineAll;

impl ConfirmationPrompt for DeclineAll {
    fn ask(&self, _message: &str) -> bool {
        false
    }
}

/// Replays a fixed list of answers and records the questions asked.
///
/// Once the script runs out every further question is declined.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self { answers: Mutex::new(answers.into_iter().collect()), asked: Mutex::new(Vec::new()) }
    }

    /// Questions asked so far, in order.
    pub fn asked(&self) -> Vec<String> {
        match self.asked.lock() {
            Ok(asked) => asked.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ConfirmationPrompt for ScriptedPrompt {
    fn ask(&self, message: &str) -> bool {
        match self.asked.lock() {
            Ok(mut asked) => asked.push(message.to_string()),
            Err(poisoned) => poisoned.into_inner().push(message.to_string()),
        }
        match self.answers.lock() {
            Ok(mut answers) => answers.pop_front().unwrap_or(false),
            Err(poisoned) => poisoned.into_inner().pop_front().unwrap_or(false),
        }
    }
}
