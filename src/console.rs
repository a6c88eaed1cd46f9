//! Interactive capability injected into the session and the command loop.
//!
//! Everything that talks to the user goes through [`Console`]: reading
//! command lines, asking for secrets and discard confirmations, and printing
//! results. [`TerminalConsole`] is the real terminal; [`ScriptedConsole`]
//! replays canned answers and records output, which keeps the session logic
//! testable without a TTY.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use yansi::Paint;

/// Tone of a message, used for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Regular output.
    Plain,
    /// Something that was skipped or did not need doing.
    Notice,
    /// A failed operation.
    Error,
}

/// Synchronous user interaction.
pub trait Console {
    /// Show `prompt` and read one line without its line terminator.
    ///
    /// Returns `Ok(None)` at end of input.
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Show `prompt` and read a secret without echoing it.
    fn ask_secret(&mut self, prompt: &str) -> io::Result<String>;

    /// Print one message.
    fn say(&mut self, tone: Tone, message: &str);

    /// Ask a yes/no question until the answer is `y` or `n`.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] if input ends first.
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        loop {
            let Some(answer) = self.ask(question)? else {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "input ended before an answer was given",
                ));
            };
            match answer.trim().to_lowercase().as_str() {
                "y" => return Ok(true),
                "n" => return Ok(false),
                _ => {}
            }
        }
    }
}

/// Console on stdin/stdout.
///
/// Lines are read with a fresh `stdin().read_line` each time, never through a
/// held lock, because secret prompts read the terminal in between.
#[derive(Debug, Default)]
pub struct TerminalConsole;

impl TerminalConsole {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Console for TerminalConsole {
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(trim_newline(line)))
    }

    fn ask_secret(&mut self, prompt: &str) -> io::Result<String> {
        rpassword::prompt_password(prompt)
    }

    fn say(&mut self, tone: Tone, message: &str) {
        match tone {
            Tone::Plain => println!("{}", message),
            Tone::Notice => println!("{}", message.yellow()),
            Tone::Error => println!("{}", message.red()),
        }
    }
}

fn trim_newline(mut line: String) -> String {
    while line.ends_with(|c: char| c == '\n' || c == '\r') {
        line.pop();
    }
    line
}

/// Console fed from a reader, for piped input.
///
/// Secrets are read as ordinary lines since there is no terminal to hide
/// them from.
pub struct ReaderConsole<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ReaderConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(trim_newline(line)))
    }
}

impl<R: BufRead, W: Write> Console for ReaderConsole<R, W> {
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        self.read_line()
    }

    fn ask_secret(&mut self, prompt: &str) -> io::Result<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        self.read_line()?.ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "input ended before a password was given")
        })
    }

    fn say(&mut self, _tone: Tone, message: &str) {
        if let Err(e) = writeln!(self.output, "{}", message) {
            log::debug!("Failed to write output: {}", e);
        }
    }
}

/// Console with queued answers and captured output.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    answers: VecDeque<String>,
    /// Every prompt shown, in order.
    pub prompts: Vec<String>,
    /// Every message printed, with its tone.
    pub output: Vec<(Tone, String)>,
}

impl ScriptedConsole {
    /// Console that answers prompts from `answers`, in order.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
            output: Vec::new(),
        }
    }

    /// Queue another answer.
    pub fn push(&mut self, answer: impl Into<String>) {
        self.answers.push_back(answer.into());
    }

    /// Answers not consumed yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    /// All printed messages joined by newlines.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.output
            .iter()
            .map(|(_, line)| line.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Messages printed with [`Tone::Error`].
    #[must_use]
    pub fn errors(&self) -> Vec<&str> {
        self.output
            .iter()
            .filter(|(tone, _)| *tone == Tone::Error)
            .map(|(_, line)| line.as_str())
            .collect()
    }
}

impl Console for ScriptedConsole {
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front())
    }

    fn ask_secret(&mut self, prompt: &str) -> io::Result<String> {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted password left")
        })
    }

    fn say(&mut self, tone: Tone, message: &str) {
        self.output.push((tone, message.to_string()));
    }
}
