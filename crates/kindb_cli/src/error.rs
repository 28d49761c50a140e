//! CLI error type.

use kindb_core::CoreError;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// No `--path` was given.
    #[error("store path required (use --path)")]
    MissingPath,

    /// The store refused the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Output could not be serialized.
    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing to stdout failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `check` found problems.
    #[error("integrity check found {problems} problem(s)")]
    Integrity {
        /// Number of problems found.
        problems: usize,
    },
}
