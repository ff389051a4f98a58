//! User-facing output and interactive prompts.
//!
//! Command results go to stdout so they can be piped; errors and prompts go
//! to stderr. Commands only talk to the user through [`Terminal`], which lets
//! the tests feed scripted answers.

use std::io::{self, BufRead, Write};

use nix::sys::termios::{self, LocalFlags, SetArg};

pub trait Terminal {
    /// Write a line of command output.
    fn print(&mut self, text: &str);

    /// Write a line to the error stream.
    fn error(&mut self, text: &str);

    /// Ask for a non-empty line of input.
    fn prompt(&mut self, label: &str) -> io::Result<String>;

    /// Ask for a line of input without echoing it.
    fn prompt_hidden(&mut self, label: &str) -> io::Result<String>;

    /// Ask until the answer is one of `choices`.
    fn choose(&mut self, label: &str, choices: &[String]) -> io::Result<String> {
        let label = format!("{label} ({})", choices.join(", "));
        loop {
            let answer = self.prompt(&label)?;
            if choices.contains(&answer) {
                return Ok(answer);
            }
            self.error(&format!(
                "Error: '{answer}' is not one of {}.",
                choices
                    .iter()
                    .map(|c| format!("'{c}'"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    }
}

/// The process's real stdin/stdout/stderr.
pub struct StdTerminal;

impl StdTerminal {
    fn read_answer(label: &str) -> io::Result<String> {
        let mut stderr = io::stderr();
        let stdin = io::stdin();
        loop {
            write!(stderr, "{label}: ")?;
            stderr.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "no input available for prompt",
                ));
            }
            let answer = line.trim_end_matches(['\r', '\n']).to_string();
            if !answer.trim().is_empty() {
                return Ok(answer);
            }
        }
    }
}

impl Terminal for StdTerminal {
    fn print(&mut self, text: &str) {
        println!("{text}");
    }

    fn error(&mut self, text: &str) {
        eprintln!("{text}");
    }

    fn prompt(&mut self, label: &str) -> io::Result<String> {
        Self::read_answer(label)
    }

    fn prompt_hidden(&mut self, label: &str) -> io::Result<String> {
        let stdin = io::stdin();
        // Not a tty (piped input): nothing to hide.
        let saved = termios::tcgetattr(&stdin).ok();
        if let Some(original) = &saved {
            let mut silent = original.clone();
            silent.local_flags.remove(LocalFlags::ECHO);
            silent.local_flags.insert(LocalFlags::ECHONL);
            termios::tcsetattr(&stdin, SetArg::TCSANOW, &silent)?;
        }

        let answer = Self::read_answer(label);

        if let Some(original) = &saved {
            termios::tcsetattr(&stdin, SetArg::TCSANOW, original)?;
        }
        answer
    }
}
