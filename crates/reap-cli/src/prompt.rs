//! Stdin-backed credential prompting

use std::io::{self, BufRead, Write};

use reap_engine::CredentialPrompt;

/// Prompts on stderr and reads one trimmed line from stdin per credential.
pub struct StdinPrompt;

impl StdinPrompt {
    fn read_line(label: &str) -> io::Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{label}")?;
        stderr.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

impl CredentialPrompt for StdinPrompt {
    fn phone(&mut self) -> io::Result<String> {
        Self::read_line("Phone: ")
    }

    fn code(&mut self) -> io::Result<String> {
        Self::read_line("Enter authentication code: ")
    }

    fn password(&mut self) -> io::Result<String> {
        Self::read_line("Enter authentication password: ")
    }
}
