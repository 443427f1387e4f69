//! Error types for uploads

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed source error, so backends other than PostgreSQL can report failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for upload operations
pub type UploadResult<T> = std::result::Result<T, UploadError>;

/// Failure reported by a storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage is unreachable or the connection dropped
    #[error("cannot reach storage: {0}")]
    Connection(#[source] BoxError),

    /// The existing table's structure does not fit the incoming data
    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    /// The batch insert was refused; nothing from the batch was kept
    #[error("batch insert rejected: {0}")]
    WriteRejected(#[source] BoxError),

    /// Any other failed statement
    #[error("storage query failed: {0}")]
    Query(#[source] BoxError),
}

impl StorageError {
    pub fn schema_conflict(message: impl Into<String>) -> Self {
        Self::SchemaConflict(message.into())
    }
}

/// The upload step an error surfaced in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStep {
    Connect,
    EnsureTable,
    ReadExisting,
    WriteRows,
    Commit,
}

impl fmt::Display for UploadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UploadStep::Connect => "connect",
            UploadStep::EnsureTable => "ensure table",
            UploadStep::ReadExisting => "read existing rows",
            UploadStep::WriteRows => "write rows",
            UploadStep::Commit => "commit",
        })
    }
}

/// Coarse classification of an [`UploadError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    SchemaConflict,
    WriteRejected,
    Storage,
    Timeout,
    InvalidInput,
}

/// Failure of one upload call. The call's transaction has been rolled back.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload to '{table}' failed during {step}: {source}")]
    Storage {
        table: String,
        step: UploadStep,
        #[source]
        source: StorageError,
    },

    #[error("Upload to '{table}' timed out after {timeout:?}")]
    Timeout { table: String, timeout: Duration },

    #[error("Invalid upload to '{table}': {reason}")]
    InvalidInput { table: String, reason: String },
}

impl UploadError {
    pub fn storage(table: &str, step: UploadStep, source: StorageError) -> Self {
        Self::Storage {
            table: table.to_string(),
            step,
            source,
        }
    }

    pub fn invalid_input(table: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            table: table.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Storage { source, .. } => match source {
                StorageError::Connection(_) => ErrorKind::Connection,
                StorageError::SchemaConflict(_) => ErrorKind::SchemaConflict,
                StorageError::WriteRejected(_) => ErrorKind::WriteRejected,
                StorageError::Query(_) => ErrorKind::Storage,
            },
            UploadError::Timeout { .. } => ErrorKind::Timeout,
            UploadError::InvalidInput { .. } => ErrorKind::InvalidInput,
        }
    }

    /// Table the failed upload targeted
    pub fn table(&self) -> &str {
        match self {
            UploadError::Storage { table, .. }
            | UploadError::Timeout { table, .. }
            | UploadError::InvalidInput { table, .. } => table,
        }
    }

    /// Step the failure surfaced in, when it came from storage
    pub fn step(&self) -> Option<UploadStep> {
        match self {
            UploadError::Storage { step, .. } => Some(*step),
            _ => None,
        }
    }
}
