//! Error types for the tabload CLI
//!
//! User-facing errors with messages that say what went wrong and what to do
//! about it.

use tabload_core::{ErrorKind, UploadError};
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Input file is missing or unreadable
    #[error("File not found: '{0}'. Verify the file path exists and you have read permissions.")]
    FileNotFound(String),

    /// Input format could not be determined or is not supported
    #[error("Unsupported input format for '{0}'. Use a .csv, .json or .jsonl file, or pass --format.")]
    UnsupportedFormat(String),

    /// Input file could not be turned into a dataset
    #[error("Invalid input in '{file}': {reason}")]
    InvalidInput { file: String, reason: String },

    /// Storage is unreachable
    #[error("Database error: {0}. Check DATABASE_URL (or DB_HOST, DB_PORT, DB_NAME, DB_USER, DB_PASSWORD) and run 'tabload status'.")]
    Database(String),

    /// The destination table does not fit the data
    #[error("{0}. The existing table's columns do not fit the incoming data; upload into a new table or fix the table by hand.")]
    SchemaConflict(String),

    /// The upload failed for another reason
    #[error("{0}")]
    Upload(#[source] UploadError),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),

    /// CSV parsing failed
    #[error("Failed to parse CSV: {0}. Check the file has a header row and consistent columns.")]
    CsvParse(#[from] csv::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}. Check the file syntax.")]
    JsonParse(#[from] serde_json::Error),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions.")]
    Io(#[from] std::io::Error),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn invalid_input(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            file: file.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<UploadError> for CliError {
    fn from(err: UploadError) -> Self {
        match err.kind() {
            ErrorKind::Connection => Self::Database(err.to_string()),
            ErrorKind::SchemaConflict => Self::SchemaConflict(err.to_string()),
            _ => Self::Upload(err),
        }
    }
}
