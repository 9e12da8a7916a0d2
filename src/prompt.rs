//! Operator interaction abstraction.
//!
//! Restore needs answers from a human (which session, confirm the manifest,
//! what to do about an existing file).  The decision logic lives in pure
//! functions that take the answer as a parameter; this trait is the thin
//! shell that obtains the answer.  Production code uses
//! [`TerminalPrompter`]; tests script the answers.

use std::io::{self, BufRead as _, IsTerminal as _, Write as _};

/// Source of operator answers and sink for operator-facing text.
#[cfg_attr(test, mockall::automock)]
pub trait Prompter {
    /// Show `prompt` and read one line of input, without the trailing newline.
    ///
    /// Returns `Ok(None)` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be read or written.
    fn read_line(&self, prompt: &str) -> io::Result<Option<String>>;

    /// Show one line of text to the operator.
    fn show(&self, line: &str);
}

/// [`Prompter`] backed by the process stdin and stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn read_line(&self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;
        drop(stdout);

        let mut input = String::new();
        if io::stdin().lock().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim_end_matches(['\r', '\n']).to_string()))
    }

    #[allow(clippy::print_stdout)]
    fn show(&self, line: &str) {
        println!("{line}");
    }
}

/// Whether stdin is attached to a terminal.
#[must_use]
pub fn is_interactive() -> bool {
    io::stdin().is_terminal()
}

/// Interpret a yes/no answer; anything other than `y`/`yes` is "no".
#[must_use]
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// A mock that answers prompts from `answers` in order, then reports end
/// of input.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn scripted(answers: &[&str]) -> MockPrompter {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    let queue: Mutex<VecDeque<String>> =
        Mutex::new(answers.iter().map(ToString::to_string).collect());
    let mut mock = MockPrompter::new();
    mock.expect_read_line()
        .returning(move |_| Ok(queue.lock().unwrap().pop_front()));
    mock.expect_show().returning(|_| ());
    mock
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmative_answers() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("yeah"));
    }

    #[test]
    fn mock_prompter_scripts_answers() {
        let mut mock = MockPrompter::new();
        mock.expect_read_line()
            .withf(|p: &str| p.contains("Proceed"))
            .returning(|_| Ok(Some("y".to_string())));
        let answer = mock.read_line("Proceed? ").ok().flatten();
        assert_eq!(answer.as_deref(), Some("y"));
    }

    #[test]
    fn scripted_prompter_ends_with_eof() {
        let prompter = scripted(&["1"]);
        assert_eq!(prompter.read_line("> ").ok().flatten().as_deref(), Some("1"));
        assert_eq!(prompter.read_line("> ").ok().flatten(), None);
    }
}
