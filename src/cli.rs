//! Command-line interface definitions for morlock.
//!
//! # Example
//!
//! ```bash
//! # Start an empty session
//! morlock
//!
//! # Load a file and make it active straight away
//! morlock song.mp3
//!
//! # Load locked files non-interactively
//! morlock -p hunter2 a.mp3 b.mp3
//! ```

use clap::Parser;
use std::path::PathBuf;

/// Edit a password-protected JSON header embedded in MP3 files.
///
/// Starts an interactive session. Files given as arguments are loaded first;
/// if exactly one loads, it becomes the active file.
#[derive(Debug, Parser)]
#[command(name = "morlock")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Media files to load at startup
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Password for locked startup files (prompted if omitted)
    #[arg(short, long, value_name = "SECRET", env = "MORLOCK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report startup errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}
