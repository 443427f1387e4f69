//! Delta computation
//!
//! Finds the incoming rows a table does not hold yet. Rows are compared on
//! their full tuple of canonical values through hashed [`RowKey`]s, so the
//! cost is linear in both sides rather than a cross join.

use crate::canonical::RowKey;
use crate::inference::ColumnType;
use std::collections::HashSet;
use tabload_common::Dataset;
use tracing::debug;

/// Rows of `incoming` with no equal row in `existing`.
///
/// Both datasets must share column order; `types` are the incoming column
/// types and are used to canonicalize both sides before comparing. Repeats
/// within `incoming` are kept: each occurrence of a new tuple is returned.
pub fn compute_delta(incoming: &Dataset, existing: &Dataset, types: &[ColumnType]) -> Dataset {
    if existing.is_empty() {
        return incoming.clone();
    }

    let persisted: HashSet<RowKey> = existing
        .rows()
        .map(|row| RowKey::from_row(&row, types))
        .collect();

    let fresh: Vec<usize> = incoming
        .rows()
        .enumerate()
        .filter(|(_, row)| !persisted.contains(&RowKey::from_row(row, types)))
        .map(|(idx, _)| idx)
        .collect();

    debug!(
        incoming = incoming.num_rows(),
        existing = existing.num_rows(),
        distinct_existing = persisted.len(),
        new = fresh.len(),
        "Computed delta"
    );

    incoming.take(&fresh)
}
