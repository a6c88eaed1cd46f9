//! Structured error handling and exit codes.

use std::fmt;

use serde::Serialize;

/// Exit codes for the morlock binary.
///
/// - 0: Success (session ended normally)
/// - 1: General error (startup or unexpected failure)
/// - 130: Interrupted (input ended while a question was pending)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the session ended normally.
    Success = 0,
    /// General error: an unexpected error occurred.
    GeneralError = 1,
    /// Interrupted: input ended in the middle of a prompt.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "MK000",
            Self::GeneralError => "MK001",
            Self::Interrupted => "MK130",
        }
    }
}

/// Category of a failed session operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The file does not exist on disk.
    NotFound,
    /// The file extension is not accepted.
    UnsupportedFormat,
    /// The header holds something other than a valid document.
    Corrupted,
    /// A password was wrong or missing.
    Authentication,
    /// A key expression is malformed.
    Validation,
    /// A list index is outside the growth-by-one range.
    Bounds,
    /// The operation does not fit the session's current state.
    State,
    /// Reading, writing or prompting failed.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::UnsupportedFormat => "unsupported format",
            Self::Corrupted => "corrupted",
            Self::Authentication => "authentication",
            Self::Validation => "validation",
            Self::Bounds => "bounds",
            Self::State => "state",
            Self::Io => "i/o",
        };
        f.write_str(name)
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "MK001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether input ended while a prompt was pending
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

/// Split the outcome of a run into a clean exit or an error to report.
///
/// An [`ExitCode::Interrupted`] session counts as an error so it is reported
/// like one.
///
/// # Errors
///
/// Returns the error to report together with its exit code.
pub fn classify(result: anyhow::Result<ExitCode>) -> Result<ExitCode, (anyhow::Error, ExitCode)> {
    match result {
        Ok(ExitCode::Interrupted) => Err((
            anyhow::anyhow!("input ended before unsaved changes were confirmed"),
            ExitCode::Interrupted,
        )),
        Ok(code) => Ok(code),
        Err(err) => Err((err, ExitCode::GeneralError)),
    }
}
