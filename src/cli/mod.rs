//! Command-line collaborators for the index engine: the interactive shell
//! and CSV bulk load/extract. Argument parsing, prompting, and file
//! overwrite policy live here, never in the core.

use thiserror::Error;

use crate::error::IndexError;

/// Data bulk load and extract in the `key,value` CSV line format.
pub mod import_export;

/// Line-oriented interactive session.
pub mod shell;

/// Errors surfaced by the command-line layer.
#[derive(Error, Debug)]
pub enum CliError {
    /// Generic error message.
    #[error("{0}")]
    Message(String),
    /// IO error from file operations.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// CSV parsing or writing error.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Index engine error.
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl From<&str> for CliError {
    fn from(value: &str) -> Self {
        CliError::Message(value.to_string())
    }
}

impl From<String> for CliError {
    fn from(value: String) -> Self {
        CliError::Message(value)
    }
}
