//! Existing-state reader
//!
//! Loads what a table already holds, restricted to the incoming dataset's
//! columns and in the same order, so the two can be compared row by row.

use crate::error::{StorageError, StorageResult};
use crate::schema::quote_ident;
use crate::store::{StoreSession, StoredColumn, StoredKind};
use tabload_common::Dataset;
use tracing::{debug, instrument};

/// Persisted rows of `table` projected onto `columns`.
///
/// A missing table reads as an empty dataset. A table lacking one of the
/// requested columns is a schema conflict.
#[instrument(skip(session, columns), fields(columns = columns.len()))]
pub async fn read_existing<S>(session: &mut S, table: &str, columns: &[String]) -> StorageResult<Dataset>
where
    S: StoreSession + ?Sized,
{
    let stored = session.describe_table(table).await?;
    read_described(session, table, stored.as_deref(), columns).await
}

/// [`read_existing`] for a caller that already fetched the table's columns
pub async fn read_described<S>(
    session: &mut S,
    table: &str,
    stored: Option<&[StoredColumn]>,
    columns: &[String],
) -> StorageResult<Dataset>
where
    S: StoreSession + ?Sized,
{
    let Some(stored) = stored else {
        debug!(table, "Table does not exist yet; nothing to compare against");
        return Dataset::empty(columns).map_err(|e| StorageError::Query(Box::new(e)));
    };

    let projection = project(table, stored, columns)?;
    let rows = session.select_columns(table, &projection).await?;
    debug!(table, rows = rows.len(), "Loaded existing rows");

    Dataset::from_rows(columns.to_vec(), rows).map_err(|e| StorageError::Query(Box::new(e)))
}

/// Pick the stored columns matching `columns`, in request order
fn project(table: &str, stored: &[StoredColumn], columns: &[String]) -> StorageResult<Vec<StoredColumn>> {
    columns
        .iter()
        .map(|name| {
            stored.iter().find(|c| &c.name == name).cloned().ok_or_else(|| {
                StorageError::schema_conflict(format!(
                    "existing table '{}' has no column '{}'",
                    table, name
                ))
            })
        })
        .collect()
}

/// `SELECT` for a projection. Types without a native decoder are cast to text.
pub fn select_sql(table: &str, columns: &[StoredColumn]) -> String {
    let list = columns
        .iter()
        .map(|c| match c.kind() {
            StoredKind::Other => format!("{0}::text AS {0}", quote_ident(&c.name)),
            _ => quote_ident(&c.name),
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("SELECT {} FROM {}", list, quote_ident(table))
}
