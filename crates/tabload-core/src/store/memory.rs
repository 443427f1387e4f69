//! In-process storage backend
//!
//! Mirrors the PostgreSQL backend's contract without a database: typed
//! columns, `CREATE TABLE IF NOT EXISTS` semantics, write-time type checks,
//! and transactions whose effects appear only on commit (reads see committed
//! data plus the session's own writes). It also counts the statements each
//! session issues, which tests use to assert what an upload did.

use super::{StoreSession, StoredColumn, TableStore};
use crate::canonical::SqlValue;
use crate::error::{StorageError, StorageResult};
use crate::inference::ColumnType;
use crate::schema::{ColumnSpec, TableSchema};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tabload_common::Value;

/// Statements issued against a [`MemoryStore`], committed or not
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementCounts {
    pub create_table: usize,
    pub describe: usize,
    pub select: usize,
    pub insert: usize,
    pub commit: usize,
    pub rollback: usize,
}

#[derive(Debug, Clone)]
struct MemTable {
    columns: Vec<ColumnSpec>,
    rows: Vec<Vec<SqlValue>>,
}

impl MemTable {
    fn new(columns: Vec<ColumnSpec>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }
}

/// Rows a session inserted, in the table layout it saw at the time
#[derive(Debug, Clone)]
struct Staged {
    layout: Vec<ColumnSpec>,
    rows: Vec<Vec<SqlValue>>,
}

/// Move rows from one column layout to another by column name.
///
/// Columns absent from `from` become typed nulls; a column missing from `to`
/// or a value that does not fit its new type is a schema conflict.
fn relayout(
    table: &str,
    rows: &[Vec<SqlValue>],
    from: &[ColumnSpec],
    to: &[ColumnSpec],
) -> StorageResult<Vec<Vec<SqlValue>>> {
    if from == to {
        return Ok(rows.to_vec());
    }
    let targets = from
        .iter()
        .map(|column| {
            to.iter().position(|t| t.name == column.name).ok_or_else(|| {
                StorageError::schema_conflict(format!(
                    "column \"{}\" of relation \"{}\" does not exist",
                    column.name, table
                ))
            })
        })
        .collect::<StorageResult<Vec<_>>>()?;

    rows.iter()
        .map(|row| {
            let mut moved: Vec<SqlValue> = to.iter().map(|t| SqlValue::null(t.column_type)).collect();
            for (value, &position) in row.iter().zip(&targets) {
                let Some(target) = to.get(position) else { continue };
                if value.is_null() {
                    continue;
                }
                if !fits(target.column_type, value) {
                    return Err(type_conflict(target, value));
                }
                moved[position] = value.clone();
            }
            Ok(moved)
        })
        .collect()
}

fn type_conflict(target: &ColumnSpec, value: &SqlValue) -> StorageError {
    StorageError::schema_conflict(format!(
        "column \"{}\" is of type {} but expression is of type {}",
        target.name,
        target.column_type.sql_type(),
        value.column_type().sql_type()
    ))
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, MemTable>,
    counts: StatementCounts,
    reject_writes: bool,
    unreachable: bool,
}

/// Shared handle to an in-process set of tables. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent insert fail as a rejected batch
    pub fn reject_writes(&self, reject: bool) {
        self.lock().reject_writes = reject;
    }

    /// Make every subsequent `begin` fail as a connection error
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    pub fn statement_counts(&self) -> StatementCounts {
        self.lock().counts
    }

    /// Create a committed table with the given rows, bypassing any session
    pub fn seed_table(&self, schema: &TableSchema, rows: Vec<Vec<SqlValue>>) {
        let mut table = MemTable::new(schema.columns.clone());
        table.rows = rows;
        self.lock().tables.insert(schema.table.clone(), table);
    }

    /// Committed column definitions of `table`
    pub fn table_columns(&self, table: &str) -> Option<Vec<ColumnSpec>> {
        self.lock().tables.get(table).map(|t| t.columns.clone())
    }

    /// Committed rows of `table`, decoded the way a read would decode them
    pub fn rows(&self, table: &str) -> Option<Vec<Vec<Value>>> {
        self.lock().tables.get(table).map(|t| {
            t.rows
                .iter()
                .map(|row| row.iter().map(SqlValue::to_value).collect())
                .collect()
        })
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map(|t| t.rows.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    type Session = MemorySession;

    async fn begin(&self) -> StorageResult<MemorySession> {
        if self.lock().unreachable {
            return Err(StorageError::Connection("memory store marked unreachable".into()));
        }
        Ok(MemorySession {
            store: self.clone(),
            created: HashMap::new(),
            appended: HashMap::new(),
            open: true,
        })
    }
}

/// A transaction against a [`MemoryStore`]
#[derive(Debug)]
pub struct MemorySession {
    store: MemoryStore,
    created: HashMap<String, MemTable>,
    appended: HashMap<String, Vec<Staged>>,
    open: bool,
}

impl MemorySession {
    fn ensure_open(&self) -> StorageResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(StorageError::Query("transaction already finished".into()))
        }
    }

    /// Columns of `table` as this session sees them
    fn visible_columns(&self, inner: &Inner, table: &str) -> Option<Vec<ColumnSpec>> {
        inner
            .tables
            .get(table)
            .or_else(|| self.created.get(table))
            .map(|t| t.columns.clone())
    }

    fn visible_rows(&self, inner: &Inner, table: &str) -> StorageResult<Vec<Vec<SqlValue>>> {
        let Some(visible) = inner.tables.get(table).or_else(|| self.created.get(table)) else {
            return Ok(Vec::new());
        };
        let mut rows = visible.rows.clone();
        for staged in self.appended.get(table).into_iter().flatten() {
            rows.extend(relayout(table, &staged.rows, &staged.layout, &visible.columns)?);
        }
        Ok(rows)
    }
}

fn fits(column_type: ColumnType, value: &SqlValue) -> bool {
    if value.is_null() {
        return true;
    }
    match value {
        SqlValue::Int4(_) => matches!(column_type, ColumnType::Integer32 | ColumnType::Integer64),
        other => other.column_type() == column_type,
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn create_table_if_absent(&mut self, schema: &TableSchema) -> StorageResult<()> {
        self.ensure_open()?;
        let mut inner = self.store.lock();
        inner.counts.create_table += 1;
        if !inner.tables.contains_key(&schema.table) && !self.created.contains_key(&schema.table) {
            self.created
                .insert(schema.table.clone(), MemTable::new(schema.columns.clone()));
        }
        Ok(())
    }

    async fn describe_table(&mut self, table: &str) -> StorageResult<Option<Vec<StoredColumn>>> {
        self.ensure_open()?;
        let mut inner = self.store.lock();
        inner.counts.describe += 1;
        Ok(self.visible_columns(&inner, table).map(|columns| {
            columns
                .iter()
                .map(|c| StoredColumn::new(&c.name, c.column_type.information_schema_name()))
                .collect()
        }))
    }

    async fn select_columns(
        &mut self,
        table: &str,
        columns: &[StoredColumn],
    ) -> StorageResult<Vec<Vec<Value>>> {
        self.ensure_open()?;
        let mut inner = self.store.lock();
        inner.counts.select += 1;

        let layout = self
            .visible_columns(&inner, table)
            .ok_or_else(|| StorageError::Query(format!("relation \"{}\" does not exist", table).into()))?;
        let positions = columns
            .iter()
            .map(|c| {
                layout.iter().position(|l| l.name == c.name).ok_or_else(|| {
                    StorageError::schema_conflict(format!("column \"{}\" does not exist", c.name))
                })
            })
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(self
            .visible_rows(&inner, table)?
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|&p| row.get(p).map(SqlValue::to_value).unwrap_or(Value::Null))
                    .collect()
            })
            .collect())
    }

    async fn insert_batch(
        &mut self,
        table: &str,
        columns: &[ColumnSpec],
        rows: &[Vec<SqlValue>],
    ) -> StorageResult<u64> {
        self.ensure_open()?;
        let mut inner = self.store.lock();
        inner.counts.insert += 1;

        if inner.reject_writes {
            return Err(StorageError::WriteRejected("insert rejected by memory store".into()));
        }

        let layout = self
            .visible_columns(&inner, table)
            .ok_or_else(|| StorageError::Query(format!("relation \"{}\" does not exist", table).into()))?;

        let mut targets = Vec::with_capacity(columns.len());
        for column in columns {
            let position = layout.iter().position(|l| l.name == column.name).ok_or_else(|| {
                StorageError::schema_conflict(format!(
                    "column \"{}\" of relation \"{}\" does not exist",
                    column.name, table
                ))
            })?;
            targets.push(position);
        }

        let mut staged = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != columns.len() {
                return Err(StorageError::WriteRejected(
                    format!("row has {} values for {} columns", row.len(), columns.len()).into(),
                ));
            }
            let mut stored: Vec<SqlValue> = layout.iter().map(|l| SqlValue::null(l.column_type)).collect();
            for (value, &position) in row.iter().zip(&targets) {
                let Some(target) = layout.get(position) else { continue };
                if !fits(target.column_type, value) {
                    return Err(type_conflict(target, value));
                }
                stored[position] = value.clone();
            }
            staged.push(stored);
        }

        drop(inner);
        let count = staged.len() as u64;
        self.appended.entry(table.to_string()).or_default().push(Staged {
            layout,
            rows: staged,
        });
        Ok(count)
    }

    async fn commit(&mut self) -> StorageResult<()> {
        self.ensure_open()?;
        self.open = false;

        let mut inner = self.store.lock();
        inner.counts.commit += 1;

        // A table another session committed first wins over this session's
        // definition; staged rows move onto its layout or the commit fails.
        let merged = self
            .appended
            .iter()
            .filter_map(|(name, batches)| {
                let target = inner.tables.get(name).or_else(|| self.created.get(name))?;
                let moved = batches.iter().try_fold(Vec::new(), |mut rows, staged| {
                    rows.extend(relayout(name, &staged.rows, &staged.layout, &target.columns)?);
                    Ok::<_, StorageError>(rows)
                });
                Some(moved.map(|rows| (name.clone(), rows)))
            })
            .collect::<StorageResult<Vec<_>>>();
        self.appended.clear();
        let merged = match merged {
            Ok(merged) => merged,
            Err(err) => {
                self.created.clear();
                return Err(err);
            },
        };

        for (name, table) in self.created.drain() {
            inner.tables.entry(name).or_insert(table);
        }
        for (name, rows) in merged {
            if let Some(table) = inner.tables.get_mut(&name) {
                table.rows.extend(rows);
            }
        }
        Ok(())
    }

    async fn rollback(&mut self) -> StorageResult<()> {
        self.ensure_open()?;
        self.open = false;
        self.created.clear();
        self.appended.clear();
        self.store.lock().counts.rollback += 1;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema {
            table: "t".to_string(),
            columns: vec![
                ColumnSpec::new("name", ColumnType::Text),
                ColumnSpec::new("n", ColumnType::Integer64),
            ],
        }
    }

    fn row(name: &str, n: i64) -> Vec<SqlValue> {
        vec![SqlValue::Text(Some(name.to_string())), SqlValue::Int8(Some(n))]
    }

    #[tokio::test]
    async fn test_writes_are_invisible_until_commit() {
        let store = MemoryStore::new();
        let mut session = store.begin().await.unwrap();
        session.create_table_if_absent(&schema()).await.unwrap();
        session
            .insert_batch("t", &schema().columns, &[row("a", 1)])
            .await
            .unwrap();

        assert!(store.rows("t").is_none());
        let seen = session.select_columns("t", &[StoredColumn::new("n", "bigint")]).await.unwrap();
        assert_eq!(seen, vec![vec![Value::Int(1)]]);

        session.commit().await.unwrap();
        assert_eq!(store.rows("t").unwrap(), vec![vec![Value::from("a"), Value::Int(1)]]);
    }

    #[tokio::test]
    async fn test_rollback_discards_table_and_rows() {
        let store = MemoryStore::new();
        let mut session = store.begin().await.unwrap();
        session.create_table_if_absent(&schema()).await.unwrap();
        session
            .insert_batch("t", &schema().columns, &[row("a", 1)])
            .await
            .unwrap();
        session.rollback().await.unwrap();

        assert!(store.table_columns("t").is_none());
        assert_eq!(store.statement_counts().rollback, 1);
        assert!(session.commit().await.is_err());
    }

    #[tokio::test]
    async fn test_existing_table_is_not_altered() {
        let store = MemoryStore::new();
        store.seed_table(&schema(), vec![]);

        let mut other = schema();
        other.columns[1].column_type = ColumnType::Json;
        let mut session = store.begin().await.unwrap();
        session.create_table_if_absent(&other).await.unwrap();
        session.commit().await.unwrap();

        assert_eq!(store.table_columns("t").unwrap(), schema().columns);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_a_schema_conflict() {
        let store = MemoryStore::new();
        store.seed_table(&schema(), vec![]);

        let mut session = store.begin().await.unwrap();
        let columns = vec![ColumnSpec::new("name", ColumnType::Json)];
        let err = session
            .insert_batch("t", &columns, &[vec![SqlValue::Json(Some(serde_json::json!({"a": 1})))]])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::SchemaConflict(_)));
    }

    #[tokio::test]
    async fn test_narrow_integers_fit_wide_columns() {
        let store = MemoryStore::new();
        store.seed_table(&schema(), vec![]);

        let mut session = store.begin().await.unwrap();
        let columns = vec![ColumnSpec::new("n", ColumnType::Integer32)];
        let written = session
            .insert_batch("t", &columns, &[vec![SqlValue::Int4(Some(3))]])
            .await
            .unwrap();
        session.commit().await.unwrap();

        assert_eq!(written, 1);
        assert_eq!(store.rows("t").unwrap(), vec![vec![Value::Null, Value::Int(3)]]);
    }

    #[tokio::test]
    async fn test_commit_moves_rows_onto_a_table_committed_first() {
        let store = MemoryStore::new();
        let narrow = TableSchema {
            table: "t".to_string(),
            columns: vec![ColumnSpec::new("name", ColumnType::Text)],
        };

        let mut late = store.begin().await.unwrap();
        late.create_table_if_absent(&narrow).await.unwrap();
        late.insert_batch("t", &narrow.columns, &[vec![SqlValue::Text(Some("a".to_string()))]])
            .await
            .unwrap();

        let mut early = store.begin().await.unwrap();
        early.create_table_if_absent(&schema()).await.unwrap();
        early.commit().await.unwrap();
        late.commit().await.unwrap();

        assert_eq!(store.table_columns("t").unwrap(), schema().columns);
        assert_eq!(store.rows("t").unwrap(), vec![vec![Value::from("a"), Value::Null]]);

        let mut reader = store.begin().await.unwrap();
        let seen = reader
            .select_columns("t", &[StoredColumn::new("n", "bigint")])
            .await
            .unwrap();
        assert_eq!(seen, vec![vec![Value::Null]]);
    }

    #[tokio::test]
    async fn test_commit_fails_when_rows_no_longer_fit() {
        let store = MemoryStore::new();
        let mut late = store.begin().await.unwrap();
        late.create_table_if_absent(&schema()).await.unwrap();
        late.insert_batch("t", &schema().columns, &[row("a", 1)]).await.unwrap();

        let mut other = schema();
        other.columns[1].column_type = ColumnType::Boolean;
        let mut early = store.begin().await.unwrap();
        early.create_table_if_absent(&other).await.unwrap();
        early.commit().await.unwrap();

        let err = late.commit().await.unwrap_err();
        assert!(matches!(err, StorageError::SchemaConflict(_)));
        assert_eq!(store.row_count("t"), 0);
        assert_eq!(store.table_columns("t").unwrap(), other.columns);
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_begin() {
        let store = MemoryStore::new();
        store.set_unreachable(true);
        assert!(matches!(store.begin().await, Err(StorageError::Connection(_))));
    }
}
