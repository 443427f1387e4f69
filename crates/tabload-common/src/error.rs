//! Error types for dataset construction

use thiserror::Error;

/// Result type alias for dataset operations
pub type Result<T> = std::result::Result<T, DatasetError>;

/// A dataset that violates the rectangular, uniquely-named column model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    #[error("Column '{column}' has {actual} values, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Row {row} has {actual} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Column names must not be empty")]
    EmptyColumnName,

    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}
