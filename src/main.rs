//! morlock - JSON headers for MP3 files
//!
//! Entry point for the morlock CLI application.

use clap::Parser;
use morlock::{
    cli::Cli,
    error::{self, ExitCode, StructuredError},
};

fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    // Interrupted sessions are reported like errors
    let (err, exit_code) = match error::classify(morlock::run_app(cli)) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(failure) => failure,
    };

    report(&err, exit_code, json_errors);
    std::process::exit(exit_code.as_i32());
}

fn report(err: &anyhow::Error, exit_code: ExitCode, json_errors: bool) {
    if json_errors {
        let structured = StructuredError::new(err, exit_code);
        if let Ok(json) = serde_json::to_string_pretty(&structured) {
            eprintln!("{}", json);
            return;
        }
    }
    eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
}
