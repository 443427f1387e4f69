//! Schema materialization
//!
//! Turns a dataset's inferred column types into a table definition and makes
//! sure the table exists. An existing table is never altered, whatever its
//! current columns look like; mismatches surface later, when rows are written,
//! or up front through [`check_compatibility`] when strict mode asks for it.

use crate::error::{StorageError, StorageResult};
use crate::inference::{infer_column_type, ColumnType};
use crate::store::{StoreSession, StoredColumn};
use serde::Serialize;
use tabload_common::Dataset;
use tracing::{debug, instrument};

/// PostgreSQL truncates identifiers longer than this many bytes
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// A column and its inferred storage type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Destination table definition, columns in dataset order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Infer one column type per dataset column
    pub fn infer(table: &str, dataset: &Dataset) -> Self {
        Self {
            table: table.to_string(),
            columns: dataset
                .columns()
                .iter()
                .map(|c| ColumnSpec::new(c.name(), infer_column_type(c.values())))
                .collect(),
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(|c| c.column_type).collect()
    }

    /// Check the table and column names are usable identifiers
    pub fn validate(&self) -> Result<(), String> {
        validate_identifier(&self.table).map_err(|e| format!("table name {}", e))?;
        if self.columns.is_empty() {
            return Err("dataset has no columns".to_string());
        }
        for column in &self.columns {
            validate_identifier(&column.name)
                .map_err(|e| format!("column name '{}' {}", column.name, e))?;
        }
        Ok(())
    }
}

/// Names must be non-empty, NUL-free and short enough not to be truncated.
pub fn validate_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("must not be empty".to_string());
    }
    if name.contains('\0') {
        return Err("must not contain NUL characters".to_string());
    }
    if name.len() > MAX_IDENTIFIER_BYTES {
        return Err(format!(
            "is {} bytes long, the limit is {}",
            name.len(),
            MAX_IDENTIFIER_BYTES
        ));
    }
    Ok(())
}

/// Quote an identifier so case and reserved words survive
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE IF NOT EXISTS` statement for `schema`
pub fn create_table_sql(schema: &TableSchema) -> String {
    let columns = schema
        .columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE IF NOT EXISTS {} ({})", quote_ident(&schema.table), columns)
}

/// Make sure the destination table exists. Idempotent.
#[instrument(skip_all, fields(table = %schema.table, columns = schema.columns.len()))]
pub async fn ensure_table<S>(session: &mut S, schema: &TableSchema) -> StorageResult<()>
where
    S: StoreSession + ?Sized,
{
    session.create_table_if_absent(schema).await?;
    debug!("Destination table ensured");
    Ok(())
}

/// Compare an existing table's columns against the inferred schema.
///
/// Every inferred column must exist and its stored type must accept the
/// inferred type; the first mismatch is reported as a schema conflict.
pub fn check_compatibility(schema: &TableSchema, existing: &[StoredColumn]) -> StorageResult<()> {
    for spec in &schema.columns {
        let Some(stored) = existing.iter().find(|c| c.name == spec.name) else {
            return Err(StorageError::schema_conflict(format!(
                "table '{}' has no column '{}'",
                schema.table, spec.name
            )));
        };

        if !stored.kind().accepts(spec.column_type) {
            return Err(StorageError::schema_conflict(format!(
                "column '{}' of table '{}' is {} but the incoming data is {} ({})",
                spec.name,
                schema.table,
                stored.data_type,
                spec.column_type,
                spec.column_type.sql_type()
            )));
        }
    }
    Ok(())
}
