//! Interactive command loop.
//!
//! Each input line is split shell-style by [`split_line`] and parsed with
//! clap in multicall mode, so the first word names the command and `help`
//! works like it does for any clap program. Commands that accept several
//! paths run once per path; a failure is reported and the next path is
//! still processed.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::Value;
use thiserror::Error;

use crate::console::{Console, Tone};
use crate::error::ExitCode;
use crate::session::{Outcome, Session, SessionError, SessionResult};

/// One command line.
#[derive(Debug, Parser)]
#[command(multicall = true)]
pub struct ReplLine {
    #[command(subcommand)]
    pub command: ReplCommand,
}

/// Commands available inside a session.
#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum ReplCommand {
    /// Load media files into the session
    Load {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Close files, asking before discarding changes
    Unload {
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Close and load files again from disk
    Reload {
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Print the embedded document
    List {
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Show loaded files and their state
    Files,
    /// Set a value in the active file's data (JSON, else a plain string)
    Set {
        /// Key expression such as `tags[0]` or `data.volume`
        key: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Set the active file's display name, or clear it
    Name { label: Option<String> },
    /// Make a loaded file the active one
    Activate { path: PathBuf },
    /// Clear the active file
    Deactivate,
    /// Deactivate the current file and activate another
    Switch { path: PathBuf },
    /// Write pending changes to disk
    Save {
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Protect files with a password
    Lock {
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Remove password protection
    Unlock {
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Empty the data, keeping name and password
    Clear {
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Drop the whole header; saving erases it and closes the file
    Wipe {
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Leave the session
    #[command(visible_alias = "exit")]
    Quit,
}

/// Error type for line splitting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("unterminated {0} quote")]
    Unterminated(&'static str),

    #[error("trailing backslash")]
    TrailingEscape,
}

/// Split a command line into words the way a POSIX shell would.
///
/// Single quotes are literal, double quotes honour `\"` and `\\`, and a
/// backslash outside quotes escapes the next character.
///
/// # Errors
///
/// Returns [`SplitError`] for an unclosed quote or a dangling backslash.
pub fn split_line(line: &str) -> Result<Vec<String>, SplitError> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return Err(SplitError::Unterminated("single")),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\')) => word.push(c),
                            Some(c) => {
                                word.push('\\');
                                word.push(c);
                            }
                            None => return Err(SplitError::Unterminated("double")),
                        },
                        Some(c) => word.push(c),
                        None => return Err(SplitError::Unterminated("double")),
                    }
                }
            }
            '\\' => {
                in_word = true;
                word.push(chars.next().ok_or(SplitError::TrailingEscape)?);
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }
    if in_word {
        words.push(word);
    }
    Ok(words)
}

/// Interpret a `set` value: JSON when it parses, else the text itself.
#[must_use]
pub fn parse_value(raw: &str) -> Value {
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => Value::String(raw.to_string()),
    }
}

/// Whether the loop keeps reading after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The interactive session: owns the [`Session`] and reads commands from a
/// [`Console`].
#[derive(Debug)]
pub struct Repl {
    session: Session,
    label: String,
}

impl Repl {
    pub fn new(session: Session, label: impl Into<String>) -> Self {
        Self {
            session,
            label: label.into(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Prompt text, naming the active file when there is one.
    #[must_use]
    pub fn prompt(&self) -> String {
        match self.session.active() {
            Some(path) => format!("{}({})> ", self.label, path.display()),
            None => format!("{}> ", self.label),
        }
    }

    /// Load startup files; a single successful load is activated.
    pub fn open(&mut self, paths: &[PathBuf], secret: Option<&str>, console: &mut dyn Console) {
        let mut loaded = Vec::new();
        for path in paths {
            match self.session.load_with_secret(path, console, secret) {
                Ok(outcome) => {
                    report(console, &outcome);
                    loaded.push(path);
                }
                Err(e) => report_error(console, &e),
            }
        }
        if let [only] = loaded.as_slice() {
            match self.session.activate(only) {
                Ok(outcome) => report(console, &outcome),
                Err(e) => report_error(console, &e),
            }
        }
    }

    /// Read and execute lines until `quit` or end of input.
    pub fn run(&mut self, console: &mut dyn Console) -> ExitCode {
        loop {
            let flow = match console.ask(&self.prompt()) {
                Ok(Some(line)) => self.execute(&line, console),
                Ok(None) => Flow::Quit,
                Err(e) => {
                    log::error!("Failed to read command: {}", e);
                    return ExitCode::GeneralError;
                }
            };
            if flow == Flow::Continue {
                continue;
            }
            match self.confirm_exit(console) {
                Ok(true) => return ExitCode::Success,
                Ok(false) => {}
                Err(e) if e.is_end_of_input() => return ExitCode::Interrupted,
                Err(e) => {
                    report_error(console, &e);
                    return ExitCode::GeneralError;
                }
            }
        }
    }

    /// Execute one command line.
    pub fn execute(&mut self, line: &str, console: &mut dyn Console) -> Flow {
        let words = match split_line(line) {
            Ok(words) => words,
            Err(e) => {
                console.say(Tone::Error, &format!("Error: {}", e));
                return Flow::Continue;
            }
        };
        if words.is_empty() {
            return Flow::Continue;
        }

        match ReplLine::try_parse_from(&words) {
            Ok(parsed) => self.dispatch(parsed.command, console),
            Err(e) => {
                let tone = match e.kind() {
                    clap::error::ErrorKind::DisplayHelp
                    | clap::error::ErrorKind::DisplayVersion
                    | clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                        Tone::Plain
                    }
                    _ => Tone::Error,
                };
                console.say(tone, e.render().to_string().trim_end());
                Flow::Continue
            }
        }
    }

    fn dispatch(&mut self, command: ReplCommand, console: &mut dyn Console) -> Flow {
        log::trace!("Dispatching {:?}", command);
        match command {
            ReplCommand::Load { paths } => {
                for path in &paths {
                    let result = self.session.load(path, console);
                    show(console, result);
                }
            }
            ReplCommand::Unload { paths } => {
                self.each_required(&paths, console, |s, p, c| s.unload(p, c));
            }
            ReplCommand::Reload { paths } => {
                self.each_required(&paths, console, |s, p, c| s.reload(p, c));
            }
            ReplCommand::List { paths } => self.list(&paths, console),
            ReplCommand::Files => self.files(console),
            ReplCommand::Set { key, value } => {
                let result = self.session.set(&key, parse_value(&value));
                show(console, result);
            }
            ReplCommand::Name { label } => {
                let result = self.session.rename(label);
                show(console, result);
            }
            ReplCommand::Activate { path } => {
                let result = self.session.activate(&path);
                show(console, result);
            }
            ReplCommand::Deactivate => {
                let result = self.session.deactivate();
                show(console, result);
            }
            ReplCommand::Switch { path } => {
                let result = self.session.switch(&path);
                show(console, result);
            }
            ReplCommand::Save { paths } => self.each(&paths, console, |s, p, _| s.save(p)),
            ReplCommand::Lock { paths } => self.each(&paths, console, |s, p, c| s.lock(p, c)),
            ReplCommand::Unlock { paths } => {
                self.each(&paths, console, |s, p, c| s.unlock(p, c));
            }
            ReplCommand::Clear { paths } => self.each(&paths, console, |s, p, _| s.clear(p)),
            ReplCommand::Wipe { paths } => self.each(&paths, console, |s, p, _| s.wipe(p)),
            ReplCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Run `op` for each path, or once for the active file when none given.
    fn each<F>(&mut self, paths: &[PathBuf], console: &mut dyn Console, mut op: F)
    where
        F: FnMut(&mut Session, Option<&Path>, &mut dyn Console) -> SessionResult<Outcome>,
    {
        if paths.is_empty() {
            let result = op(&mut self.session, None, console);
            show(console, result);
            return;
        }
        for path in paths {
            let result = op(&mut self.session, Some(path), console);
            show(console, result);
        }
    }

    /// Like [`Repl::each`], for operations that need a concrete path.
    fn each_required<F>(&mut self, paths: &[PathBuf], console: &mut dyn Console, mut op: F)
    where
        F: FnMut(&mut Session, &Path, &mut dyn Console) -> SessionResult<Outcome>,
    {
        self.each(paths, console, |session, path, console| {
            let path = match path {
                Some(path) => path.to_path_buf(),
                None => session
                    .active()
                    .map(Path::to_path_buf)
                    .ok_or(SessionError::NoActiveFile)?,
            };
            op(session, &path, console)
        });
    }

    fn list(&self, paths: &[PathBuf], console: &mut dyn Console) {
        if paths.is_empty() {
            match self.session.list(None) {
                Ok(text) => console.say(Tone::Plain, &text),
                Err(e) => report_error(console, &e),
            }
            return;
        }
        for path in paths {
            match self.session.list(Some(path)) {
                Ok(text) if paths.len() > 1 => {
                    console.say(Tone::Plain, &format!("'{}':\n{}", path.display(), text));
                }
                Ok(text) => console.say(Tone::Plain, &text),
                Err(e) => report_error(console, &e),
            }
        }
    }

    fn files(&self, console: &mut dyn Console) {
        let mut any = false;
        for file in self.session.files() {
            any = true;
            let active = self.session.active() == Some(file.path());
            let mut flags = Vec::new();
            if file.modified {
                flags.push("modified");
            }
            if file.is_wiped() {
                flags.push("wiped");
            }
            if file.is_locked() {
                flags.push("locked");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            console.say(
                Tone::Plain,
                &format!(
                    "{} {}{}",
                    if active { "*" } else { " " },
                    file.path().display(),
                    flags
                ),
            );
        }
        if !any {
            console.say(Tone::Notice, "No files loaded.");
        }
    }

    /// Ask before leaving with unsaved changes.
    fn confirm_exit(&self, console: &mut dyn Console) -> SessionResult<bool> {
        let pending = self.session.pending_changes();
        if pending.is_empty() || !self.session.settings().confirm_discard {
            return Ok(true);
        }
        let names = pending
            .iter()
            .map(|p| format!("'{}'", p.display()))
            .collect::<Vec<_>>()
            .join(", ");
        console
            .confirm(&format!(
                "Unsaved changes in {}. Quit and discard them (y/n)? ",
                names
            ))
            .map_err(SessionError::Prompt)
    }
}

fn show(console: &mut dyn Console, result: SessionResult<Outcome>) {
    match result {
        Ok(outcome) => report(console, &outcome),
        Err(e) => report_error(console, &e),
    }
}

fn report(console: &mut dyn Console, outcome: &Outcome) {
    let tone = if outcome.is_noop() {
        Tone::Notice
    } else {
        Tone::Plain
    };
    console.say(tone, &outcome.to_string());
}

fn report_error(console: &mut dyn Console, err: &SessionError) {
    log::debug!("Command failed ({}): {:?}", err.kind(), err);
    console.say(Tone::Error, &format!("Error: {}", err));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ScriptedConsole;
    use serde_json::json;

    #[test]
    fn test_split_line_plain() {
        assert_eq!(
            split_line("  load a.mp3   b.mp3 ").unwrap(),
            vec!["load", "a.mp3", "b.mp3"]
        );
        assert!(split_line("   ").unwrap().is_empty());
    }

    #[test]
    fn test_split_line_quotes() {
        assert_eq!(
            split_line(r#"set title 'My Song'"#).unwrap(),
            vec!["set", "title", "My Song"]
        );
        assert_eq!(
            split_line(r#"set tags '["a", "b"]'"#).unwrap(),
            vec!["set", "tags", r#"["a", "b"]"#]
        );
        assert_eq!(
            split_line(r#"load "my \"best\" song.mp3""#).unwrap(),
            vec!["load", r#"my "best" song.mp3"#]
        );
        assert_eq!(split_line(r"load my\ song.mp3").unwrap(), vec!["load", "my song.mp3"]);
        assert_eq!(split_line("set x ''").unwrap(), vec!["set", "x", ""]);
    }

    #[test]
    fn test_split_line_errors() {
        assert_eq!(
            split_line("set x 'oops"),
            Err(SplitError::Unterminated("single"))
        );
        assert_eq!(
            split_line("set x \"oops"),
            Err(SplitError::Unterminated("double"))
        );
        assert_eq!(split_line("set x \\"), Err(SplitError::TrailingEscape));
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("5"), json!(5));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("{\"a\": [1]}"), json!({"a": [1]}));
        assert_eq!(parse_value("hello"), json!("hello"));
        assert_eq!(parse_value("-3.5"), json!(-3.5));
    }

    #[test]
    fn test_parse_commands() {
        let parsed = ReplLine::try_parse_from(["set", "volume", "-5"]).unwrap();
        assert_eq!(
            parsed.command,
            ReplCommand::Set {
                key: "volume".into(),
                value: "-5".into()
            }
        );
        let parsed = ReplLine::try_parse_from(["exit"]).unwrap();
        assert_eq!(parsed.command, ReplCommand::Quit);
        assert!(ReplLine::try_parse_from(["load"]).is_err());
        assert!(ReplLine::try_parse_from(["bogus"]).is_err());
    }

    #[test]
    fn test_prompt_without_active_file() {
        let repl = Repl::new(Session::default(), "morlock");
        assert_eq!(repl.prompt(), "morlock> ");
    }

    #[test]
    fn test_unknown_command_is_reported() {
        let mut repl = Repl::new(Session::default(), "morlock");
        let mut console = ScriptedConsole::default();
        assert_eq!(repl.execute("frobnicate", &mut console), Flow::Continue);
        assert_eq!(console.errors().len(), 1);
    }

    #[test]
    fn test_help_is_plain_output() {
        let mut repl = Repl::new(Session::default(), "morlock");
        let mut console = ScriptedConsole::default();
        repl.execute("help", &mut console);
        assert!(console.errors().is_empty());
        assert!(console.transcript().contains("activate"));
    }

    #[test]
    fn test_default_target_without_active_file() {
        let mut repl = Repl::new(Session::default(), "morlock");
        let mut console = ScriptedConsole::default();
        repl.execute("save", &mut console);
        repl.execute("unload", &mut console);
        repl.execute("deactivate", &mut console);
        assert_eq!(console.errors().len(), 3);
    }

    #[test]
    fn test_quit_without_changes() {
        let mut repl = Repl::new(Session::default(), "morlock");
        let mut console = ScriptedConsole::new(["quit"]);
        assert_eq!(repl.run(&mut console), ExitCode::Success);
    }

    #[test]
    fn test_end_of_input_exits() {
        let mut repl = Repl::new(Session::default(), "morlock");
        let mut console = ScriptedConsole::default();
        assert_eq!(repl.run(&mut console), ExitCode::Success);
        assert_eq!(console.prompts, vec!["morlock> "]);
    }
}
