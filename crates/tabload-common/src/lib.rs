//! tabload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the tabload workspace.
//!
//! # Overview
//!
//! - **Types**: the in-memory [`Value`] cell model and the rectangular [`Dataset`]
//! - **Error Handling**: [`DatasetError`] for malformed datasets
//! - **Logging**: subscriber setup shared by every binary
//!
//! # Example
//!
//! ```
//! use tabload_common::{Dataset, Value};
//!
//! let dataset = Dataset::from_columns(vec![
//!     ("id".to_string(), vec![Value::Int(1), Value::Int(2)]),
//!     ("name".to_string(), vec![Value::from("Alice"), Value::from("Bob")]),
//! ])?;
//! assert_eq!(dataset.num_rows(), 2);
//! # Ok::<(), tabload_common::DatasetError>(())
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{DatasetError, Result};
pub use types::{Column, Dataset, Value};
