//! Line-based terminal prompts.
//!
//! Plain stdin/stdout: options are printed as a numbered list and the user
//! answers with a number (or `y`/`n` for confirmations). An empty answer on
//! a select, or EOF anywhere, cancels.

use std::io::{BufRead, Write};

use super::{Prompter, SelectOption};
use crate::error::{Result, VaryError};

/// Prompter over the process's stdin/stdout.
#[derive(Debug, Default)]
pub struct TermPrompter;

impl TermPrompter {
    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        let n = std::io::stdin().lock().read_line(&mut line)?;
        if n == 0 {
            return Err(VaryError::Cancelled);
        }
        Ok(line.trim().to_owned())
    }
}

impl Prompter for TermPrompter {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        loop {
            print!("{message} [y/n] ");
            std::io::stdout().flush()?;
            match self.read_line()?.to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => {}
            }
        }
    }

    fn select(&mut self, title: &str, options: &[SelectOption]) -> Result<String> {
        println!("{title}");
        for (idx, option) in options.iter().enumerate() {
            if option.detail.is_empty() {
                println!("  {}) {}", idx + 1, option.label);
            } else {
                println!("  {}) {} ({})", idx + 1, option.label, option.detail);
            }
        }
        loop {
            print!("> ");
            std::io::stdout().flush()?;
            let answer = self.read_line()?;
            if answer.is_empty() {
                return Err(VaryError::Cancelled);
            }
            if let Ok(choice) = answer.parse::<usize>()
                && choice >= 1
                && choice <= options.len()
            {
                return Ok(options[choice - 1].value.clone());
            }
        }
    }

    fn input(
        &mut self,
        title: &str,
        validate: &dyn Fn(&str) -> std::result::Result<(), String>,
    ) -> Result<String> {
        println!("{title}");
        loop {
            print!("> ");
            std::io::stdout().flush()?;
            let answer = self.read_line()?;
            match validate(&answer) {
                Ok(()) => return Ok(answer),
                Err(reason) => println!("{reason}"),
            }
        }
    }
}
