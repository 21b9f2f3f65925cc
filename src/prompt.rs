//! Operator confirmation and selection prompts.

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

use crate::progress::MULTI;

/// Go-ahead gate consulted before each destructive phase.
pub trait Confirm {
    /// Returns `true` to proceed, `false` to cancel the remaining phases.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Closures make deterministic gates in tests.
impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        Ok(self(prompt))
    }
}

/// Proceeds through every gate (`--yes`).
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        log::info!("{} (auto-confirmed)", prompt);
        Ok(true)
    }
}

/// Interactive prompt on stdin.
///
/// Enter or `y` proceeds; `n`, `q` or end of input cancels.
pub struct StdinPrompt;

impl StdinPrompt {
    fn read_line(&self, prompt: &str) -> Result<Option<String>> {
        MULTI.suspend(|| -> Result<Option<String>> {
            print!("{} ", prompt);
            io::stdout().flush().context("Failed to flush stdout")?;
            let mut line = String::new();
            let read = io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read from stdin")?;
            Ok((read > 0).then(|| line.trim().to_string()))
        })
    }

    /// Ask until a valid number in `0..len` is entered. `None` on end of input.
    pub fn choose(&mut self, options: &[String]) -> Result<Option<usize>> {
        loop {
            for (idx, option) in options.iter().enumerate() {
                println!("{:>4}. {}", idx, option);
            }
            let Some(answer) = self.read_line(">>>")? else {
                return Ok(None);
            };
            match parse_choice(&answer, options.len()) {
                Some(choice) => return Ok(Some(choice)),
                None => println!(
                    "Invalid choice. Please choose a number between 0 and {}",
                    options.len().saturating_sub(1)
                ),
            }
        }
    }
}

impl Confirm for StdinPrompt {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let answer = self.read_line(&format!("{} [Y/n] >>", prompt))?;
        Ok(answer.is_some_and(|a| is_affirmative(&a)))
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.to_lowercase().as_str(), "" | "y" | "yes")
}

/// Parse a menu choice, accepting only digits within range.
pub fn parse_choice(input: &str, len: usize) -> Option<usize> {
    let input = input.trim();
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    input.parse::<usize>().ok().filter(|&choice| choice < len)
}
