//! Bulk writer

use crate::canonical::SqlValue;
use crate::error::StorageResult;
use crate::schema::ColumnSpec;
use crate::store::StoreSession;
use tracing::{debug, instrument};

/// Bind parameters PostgreSQL accepts in one statement
pub const POSTGRES_MAX_BIND_PARAMS: usize = 65_535;

/// Rows that fit in one statement for a table of `columns` columns
pub fn rows_per_statement(columns: usize, max_bind_params: usize) -> usize {
    (max_bind_params / columns.max(1)).max(1)
}

/// Persist canonicalized rows with multi-row inserts.
///
/// An empty batch issues no statement and reports zero. Batches too large for
/// one statement are split, but every piece runs inside the caller's
/// transaction: a rejected piece fails the whole batch.
#[instrument(skip_all, fields(table = %table, rows = rows.len()))]
pub async fn write_rows<S>(
    session: &mut S,
    table: &str,
    columns: &[ColumnSpec],
    rows: &[Vec<SqlValue>],
    max_bind_params: usize,
) -> StorageResult<u64>
where
    S: StoreSession + ?Sized,
{
    if rows.is_empty() || columns.is_empty() {
        debug!("No rows to write");
        return Ok(0);
    }

    let per_statement = rows_per_statement(columns.len(), max_bind_params);
    let total_chunks = rows.len().div_ceil(per_statement);
    let mut written = 0;

    for (chunk_idx, chunk) in rows.chunks(per_statement).enumerate() {
        debug!(
            "Inserting chunk {} / {} ({} rows)",
            chunk_idx + 1,
            total_chunks,
            chunk.len()
        );
        written += session.insert_batch(table, columns, chunk).await?;
    }

    Ok(written)
}
