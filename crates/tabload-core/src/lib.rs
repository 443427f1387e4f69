//! tabload Core Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Schema inference and incremental uploads of tabular data into PostgreSQL.
//!
//! # Overview
//!
//! - **Inference**: one [`ColumnType`] per dataset column ([`inference`])
//! - **Canonicalization**: typed, persistable [`SqlValue`]s and hashed [`RowKey`]s ([`canonical`])
//! - **Schema**: table definitions and `CREATE TABLE IF NOT EXISTS` ([`schema`])
//! - **Delta**: incoming rows the table does not hold yet ([`delta`])
//! - **Upload**: the transactional pipeline tying it together ([`upload`])
//! - **Storage**: PostgreSQL and in-memory backends ([`store`])
//!
//! # Example
//!
//! ```
//! use tabload_common::{Dataset, Value};
//! use tabload_core::{MemoryStore, Uploader};
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let dataset = Dataset::from_columns(vec![
//!     ("bank".to_string(), vec![Value::from("ABC"), Value::from("XYZ")]),
//!     ("branches".to_string(), vec![Value::Int(12), Value::Int(3)]),
//! ])
//! .unwrap();
//!
//! let uploader = Uploader::new(MemoryStore::new());
//! let first = uploader.upload(&dataset, "banks").await.unwrap();
//! let second = uploader.upload(&dataset, "banks").await.unwrap();
//!
//! assert_eq!(first.rows_written, 2);
//! assert_eq!(second.rows_written, 0);
//! # });
//! # }
//! ```

pub mod canonical;
pub mod config;
pub mod db;
pub mod delta;
pub mod error;
pub mod existing;
pub mod inference;
pub mod schema;
pub mod store;
pub mod upload;
pub mod writer;

pub use canonical::{canonicalize, RowKey, SqlValue};
pub use config::{Config, DatabaseConfig, UploadConfig};
pub use delta::compute_delta;
pub use error::{ErrorKind, StorageError, UploadError, UploadResult, UploadStep};
pub use existing::read_existing;
pub use inference::{infer_column_type, ColumnType};
pub use schema::{ensure_table, ColumnSpec, TableSchema};
pub use store::{MemoryStore, PgStore, StoreSession, TableStore};
pub use upload::{UploadMode, UploadOptions, UploadSummary, Uploader};
pub use writer::write_rows;
