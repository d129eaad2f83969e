//! Interactive prompts.
//!
//! Prompting is the only blocking interactive read in a run. It sits behind
//! the `Prompter` trait so that resolution and confirmation can be driven by
//! scripted answers in tests.

use std::io::{BufRead, BufReader, Stderr, Stdin, Write};
use std::sync::Mutex;

use crate::error::{Result, StackfabError};

/// Source of interactive answers.
pub trait Prompter: Send + Sync {
    /// Asks for a value.
    ///
    /// With a default, an empty answer yields the default. Without one, an
    /// empty answer yields `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be read or written.
    fn prompt(&self, message: &str, default: Option<&str>) -> Result<Option<String>>;

    /// Asks a yes/no question; anything but `y`/`yes` is a no.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be read or written.
    fn confirm(&self, message: &str) -> Result<bool>;
}

/// Prompter reading answers line by line.
#[derive(Debug)]
pub struct LinePrompter<R, W> {
    io: Mutex<(R, W)>,
}

/// Prompter bound to stdin and stderr.
pub type TerminalPrompter = LinePrompter<BufReader<Stdin>, Stderr>;

impl TerminalPrompter {
    /// Creates a prompter on the process terminal.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(std::io::stdin()), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    /// Creates a prompter over a reader and a writer.
    pub const fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }

    fn ask(&self, question: &str) -> Result<String> {
        let mut io = self
            .io
            .lock()
            .map_err(|_| StackfabError::internal("prompt terminal lock poisoned"))?;
        let (reader, writer) = &mut *io;

        write!(writer, "{question}")?;
        writer.flush()?;

        let mut input = String::new();
        reader.read_line(&mut input)?;
        Ok(input.trim().to_string())
    }
}

impl<R, W> Prompter for LinePrompter<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn prompt(&self, message: &str, default: Option<&str>) -> Result<Option<String>> {
        let question = match default {
            Some(default) => format!("{message} [{default}]: "),
            None => format!("{message}: "),
        };

        let answer = self.ask(&question)?;
        if answer.is_empty() {
            return Ok(default.map(String::from));
        }
        Ok(Some(answer))
    }

    fn confirm(&self, message: &str) -> Result<bool> {
        let answer = self.ask(&format!("{message} [y/N]: "))?;
        Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
    }
}

/// Prompter answering from a script, recording every question.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ScriptedPrompter {
    answers: Mutex<std::collections::VecDeque<String>>,
    confirmations: Mutex<std::collections::VecDeque<bool>>,
    asked: Mutex<Vec<(String, Option<String>)>>,
    confirms_asked: Mutex<Vec<String>>,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a typed answer; an empty string accepts the default.
    pub fn answer(self, answer: &str) -> Self {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(answer.to_string());
        }
        self
    }

    pub fn confirm_with(self, yes: bool) -> Self {
        if let Ok(mut confirmations) = self.confirmations.lock() {
            confirmations.push_back(yes);
        }
        self
    }

    /// Every prompt shown, with its presented default.
    pub fn asked(&self) -> Vec<(String, Option<String>)> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn confirms_asked(&self) -> Vec<String> {
        self.confirms_asked.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn prompt(&self, message: &str, default: Option<&str>) -> Result<Option<String>> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push((message.to_string(), default.map(String::from)));
        }
        let answer = self
            .answers
            .lock()
            .ok()
            .and_then(|mut a| a.pop_front())
            .unwrap_or_default();
        if answer.is_empty() {
            return Ok(default.map(String::from));
        }
        Ok(Some(answer))
    }

    fn confirm(&self, message: &str) -> Result<bool> {
        if let Ok(mut asked) = self.confirms_asked.lock() {
            asked.push(message.to_string());
        }
        Ok(self
            .confirmations
            .lock()
            .ok()
            .and_then(|mut c| c.pop_front())
            .unwrap_or(false))
    }
}
