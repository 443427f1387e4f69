//! Storage backends
//!
//! The upload components talk to storage through two traits: a [`TableStore`]
//! hands out one [`StoreSession`] per upload call, and the session wraps a
//! single transaction on a single connection. Everything a session does is
//! discarded unless [`StoreSession::commit`] succeeds.

pub mod memory;
pub mod postgres;

use crate::canonical::SqlValue;
use crate::error::StorageResult;
use crate::inference::ColumnType;
use crate::schema::{ColumnSpec, TableSchema};
use async_trait::async_trait;
use tabload_common::Value;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Source of upload sessions
#[async_trait]
pub trait TableStore: Send + Sync {
    type Session: StoreSession;

    /// Acquire a connection and open a transaction on it
    async fn begin(&self) -> StorageResult<Self::Session>;
}

/// One transaction on one connection.
///
/// Dropping a session without committing rolls it back.
#[async_trait]
pub trait StoreSession: Send {
    /// `CREATE TABLE IF NOT EXISTS`; an existing table is left untouched
    async fn create_table_if_absent(&mut self, schema: &TableSchema) -> StorageResult<()>;

    /// Columns of `table` in ordinal order, or `None` when no such table exists
    async fn describe_table(&mut self, table: &str) -> StorageResult<Option<Vec<StoredColumn>>>;

    /// Every persisted row of `table`, projected onto `columns` in that order
    async fn select_columns(
        &mut self,
        table: &str,
        columns: &[StoredColumn],
    ) -> StorageResult<Vec<Vec<Value>>>;

    /// One multi-row insert; all rows are kept or none are
    async fn insert_batch(
        &mut self,
        table: &str,
        columns: &[ColumnSpec],
        rows: &[Vec<SqlValue>],
    ) -> StorageResult<u64>;

    async fn commit(&mut self) -> StorageResult<()>;

    async fn rollback(&mut self) -> StorageResult<()>;
}

/// A column of a persisted table as the catalog reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredColumn {
    pub name: String,
    /// `information_schema.columns.data_type`, e.g. `"double precision"`
    pub data_type: String,
}

impl StoredColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    pub fn kind(&self) -> StoredKind {
        StoredKind::from_data_type(&self.data_type)
    }
}

/// Families of catalog types the reader knows how to decode natively
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredKind {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Boolean,
    Timestamp,
    TimestampTz,
    Date,
    Json,
    Text,
    /// Anything else; read through a `::text` cast
    Other,
}

impl StoredKind {
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type.to_ascii_lowercase().as_str() {
            "smallint" => StoredKind::SmallInt,
            "integer" => StoredKind::Integer,
            "bigint" => StoredKind::BigInt,
            "real" => StoredKind::Real,
            "double precision" => StoredKind::Double,
            "boolean" => StoredKind::Boolean,
            "timestamp without time zone" => StoredKind::Timestamp,
            "timestamp with time zone" => StoredKind::TimestampTz,
            "date" => StoredKind::Date,
            "json" | "jsonb" => StoredKind::Json,
            "text" | "character varying" | "character" | "name" => StoredKind::Text,
            _ => StoredKind::Other,
        }
    }

    /// Whether values inferred as `column_type` can be written to this column
    /// without conversion. Integer columns may widen; nothing else does.
    pub fn accepts(self, column_type: ColumnType) -> bool {
        matches!(
            (column_type, self),
            (ColumnType::Integer32, StoredKind::Integer | StoredKind::BigInt)
                | (ColumnType::Integer64, StoredKind::BigInt)
                | (ColumnType::Float64, StoredKind::Double)
                | (ColumnType::Boolean, StoredKind::Boolean)
                | (ColumnType::Timestamp, StoredKind::Timestamp | StoredKind::TimestampTz)
                | (ColumnType::Json, StoredKind::Json)
                | (ColumnType::Text, StoredKind::Text)
        )
    }
}
