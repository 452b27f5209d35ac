//! Terminal confirmation prompt

use owo_colors::OwoColorize;
use std::io::{self, BufRead, Write};

use crate::engine::ConfirmationPrompt;

/// Asks on stderr and reads the answer from stdin. Only `y`/`yes` approves.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl ConfirmationPrompt for TerminalPrompt {
    fn ask(&self, message: &str) -> bool {
        let mut stderr = io::stderr();
        if write!(stderr, "{} [y/N]: ", message.yellow()).and_then(|_| stderr.flush()).is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(_) => false,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
