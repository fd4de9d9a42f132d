//! Interactive questions, answered from the terminal or, in batch mode,
//! from their defaults.

use std::io::{self, BufRead, IsTerminal, Write};

use crate::error::{Error, Result};

pub trait Prompter {
    fn is_batch(&self) -> bool;
    /// Choose one of `options`.
    fn pick_name(&self, message: &str, options: &[&str], default: &str) -> Result<String>;
    /// Free text. A `required` answer may not be blank.
    fn pick_value(&self, message: &str, default: &str, required: bool) -> Result<String>;
    fn confirm(&self, message: &str, default: bool) -> Result<bool>;
}

/// Prompts on stderr and reads answers from stdin.
pub struct TerminalPrompter {
    batch: bool,
    interactive: bool,
}

impl TerminalPrompter {
    pub fn new(batch: bool) -> Self {
        Self {
            batch,
            interactive: !batch && io::stdin().is_terminal() && io::stderr().is_terminal(),
        }
    }

    fn read_line(&self, prompt: &str) -> Result<String> {
        eprint!("{}", prompt);
        io::stderr().flush().ok();
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| Error::internal_io(e.to_string(), Some("read answer".to_string())))?;
        Ok(line.trim().to_string())
    }

    fn unanswerable(&self, message: &str) -> Error {
        Error::prompt_aborted(format!("cannot ask '{}' without an interactive terminal", message))
            .with_hint("Set the value in jx-requirements.yml or run from a terminal")
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Prompter for TerminalPrompter {
    fn is_batch(&self) -> bool {
        self.batch
    }

    fn pick_name(&self, message: &str, options: &[&str], default: &str) -> Result<String> {
        if !self.interactive {
            if !default.is_empty() {
                return Ok(default.to_string());
            }
            return Err(self.unanswerable(message));
        }

        eprintln!("{}", message);
        for (i, option) in options.iter().enumerate() {
            let marker = if *option == default { "*" } else { " " };
            eprintln!("  {}[{}] {}", marker, i + 1, option);
        }
        loop {
            let answer = self.read_line(&format!("Enter choice (1-{}): ", options.len()))?;
            if answer.is_empty() && !default.is_empty() {
                return Ok(default.to_string());
            }
            if let Some(option) = answer
                .parse::<usize>()
                .ok()
                .and_then(|n| options.get(n.saturating_sub(1)))
            {
                return Ok(option.to_string());
            }
            if let Some(option) = options.iter().find(|o| **o == answer) {
                return Ok(option.to_string());
            }
        }
    }

    fn pick_value(&self, message: &str, default: &str, required: bool) -> Result<String> {
        if !self.interactive {
            if required && default.is_empty() {
                return Err(self.unanswerable(message));
            }
            return Ok(default.to_string());
        }

        let prompt = if default.is_empty() {
            format!("{}: ", message)
        } else {
            format!("{} [{}]: ", message, default)
        };
        loop {
            let answer = self.read_line(&prompt)?;
            let answer = if answer.is_empty() { default.to_string() } else { answer };
            if !required || !answer.is_empty() {
                return Ok(answer);
            }
        }
    }

    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        if !self.interactive {
            return Ok(default);
        }
        let suffix = if default { "[Y/n]" } else { "[y/N]" };
        let answer = self.read_line(&format!("{} {}: ", message, suffix))?.to_lowercase();
        if answer.is_empty() {
            return Ok(default);
        }
        Ok(answer.starts_with('y'))
    }
}
