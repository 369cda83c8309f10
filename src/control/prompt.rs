//! User interaction for confirmations and choices

use std::io::{self, BufRead, Write};

/// Only `yes` and `y` confirm; anything else declines
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "yes" | "y")
}

pub trait Prompt {
    /// Print one line of output
    fn say(&mut self, line: &str);

    /// Show `question` and read one answer; `None` when input is closed
    fn ask(&mut self, question: &str) -> Option<String>;

    fn confirm(&mut self, question: &str) -> bool {
        self.ask(&format!("{} (yes/no): ", question))
            .is_some_and(|answer| is_affirmative(&answer))
    }
}

/// Stdin/stdout console
#[derive(Debug, Default)]
pub struct ConsolePrompt;

impl Prompt for ConsolePrompt {
    fn say(&mut self, line: &str) {
        println!("{}", line);
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        print!("{}", question);
        let _ = io::stdout().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}
