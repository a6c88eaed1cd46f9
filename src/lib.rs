//! morlock - JSON headers for MP3 files
//!
//! Embeds a structured, optionally password-protected JSON document in front
//! of an MP3 payload without touching the audio, and edits it through an
//! interactive session spanning several open files.

pub mod cli;
pub mod codec;
pub mod config;
pub mod console;
pub mod document;
pub mod error;
pub mod lock;
pub mod logging;
pub mod path;
pub mod repl;
pub mod session;

use std::io::{self, IsTerminal};

use anyhow::Context;

use crate::cli::Cli;
use crate::config::Config;
use crate::console::{ReaderConsole, TerminalConsole};
use crate::error::ExitCode;
use crate::repl::Repl;
use crate::session::Session;

/// Run the application with the given CLI arguments.
///
/// # Errors
///
/// Returns an error if an explicitly given configuration file is invalid or
/// the configured password hashing parameters are rejected.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let config = match &cli.config {
        Some(path) => Config::try_load(Some(path))
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load(None),
    };
    log::debug!("Using config: {:?}", config);

    let hasher = config
        .hasher()
        .context("invalid password hashing parameters")?;
    let session = Session::new(config.session_settings())
        .with_codec(config.codec())
        .with_hasher(Box::new(hasher));
    let mut repl = Repl::new(session, config.prompt.as_str());

    let code = if io::stdin().is_terminal() {
        let mut console = TerminalConsole::new();
        repl.open(&cli.files, cli.password.as_deref(), &mut console);
        repl.run(&mut console)
    } else {
        log::debug!("stdin is not a terminal, reading commands as lines");
        let mut console = ReaderConsole::new(io::stdin().lock(), io::stdout());
        repl.open(&cli.files, cli.password.as_deref(), &mut console);
        repl.run(&mut console)
    };
    Ok(code)
}
