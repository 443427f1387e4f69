//! PostgreSQL storage backend

use super::{StoreSession, StoredColumn, StoredKind, TableStore};
use crate::canonical::SqlValue;
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::existing::select_sql;
use crate::schema::{create_table_sql, quote_ident, ColumnSpec, TableSchema};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use tabload_common::Value;
use tracing::debug;

const DESCRIBE_TABLE_SQL: &str = "SELECT column_name, data_type \
     FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = $1 \
     ORDER BY ordinal_position";

/// Tables in a PostgreSQL database, reached through a connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> StorageResult<Self> {
        Ok(Self::new(crate::db::create_pool(config).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TableStore for PgStore {
    type Session = PgSession;

    async fn begin(&self) -> StorageResult<PgSession> {
        let tx = self.pool.begin().await.map_err(|e| classify(e, false))?;
        Ok(PgSession { tx: Some(tx) })
    }
}

/// One transaction on one pooled connection.
///
/// The connection goes back to the pool when the session is committed,
/// rolled back, or dropped; dropping an open session rolls it back.
#[derive(Debug)]
pub struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    fn tx(&mut self) -> StorageResult<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| StorageError::Query("transaction already finished".into()))
    }
}

#[async_trait]
impl StoreSession for PgSession {
    async fn create_table_if_absent(&mut self, schema: &TableSchema) -> StorageResult<()> {
        let sql = create_table_sql(schema);
        debug!(sql = %sql, "Creating table if absent");
        let tx = self.tx()?;
        sqlx::query(&sql)
            .execute(&mut **tx)
            .await
            .map_err(|e| classify(e, false))?;
        Ok(())
    }

    async fn describe_table(&mut self, table: &str) -> StorageResult<Option<Vec<StoredColumn>>> {
        let tx = self.tx()?;
        let rows: Vec<(String, String)> = sqlx::query_as(DESCRIBE_TABLE_SQL)
            .bind(table)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| classify(e, false))?;

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            rows.into_iter()
                .map(|(name, data_type)| StoredColumn::new(name, data_type))
                .collect(),
        ))
    }

    async fn select_columns(
        &mut self,
        table: &str,
        columns: &[StoredColumn],
    ) -> StorageResult<Vec<Vec<Value>>> {
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        let sql = select_sql(table, columns);
        let tx = self.tx()?;
        let rows = sqlx::query(&sql)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| classify(e, false))?;

        rows.iter()
            .map(|row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(idx, column)| decode(row, idx, column.kind()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| classify(e, false))
    }

    async fn insert_batch(
        &mut self,
        table: &str,
        columns: &[ColumnSpec],
        rows: &[Vec<SqlValue>],
    ) -> StorageResult<u64> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let column_list = columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            quote_ident(table),
            column_list
        ));

        query_builder.push_values(rows, |mut b, row| {
            for value in row {
                match value {
                    SqlValue::Int4(v) => b.push_bind(*v),
                    SqlValue::Int8(v) => b.push_bind(*v),
                    SqlValue::Float8(v) => b.push_bind(*v),
                    SqlValue::Bool(v) => b.push_bind(*v),
                    SqlValue::Timestamp(v) => b.push_bind(*v),
                    SqlValue::Json(v) => b.push_bind(v.clone()),
                    SqlValue::Text(v) => b.push_bind(v.clone()),
                };
            }
        });

        let tx = self.tx()?;
        let result = query_builder
            .build()
            .execute(&mut **tx)
            .await
            .map_err(|e| classify(e, true))?;

        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> StorageResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StorageError::Query("transaction already finished".into()))?;
        tx.commit().await.map_err(|e| classify(e, false))
    }

    async fn rollback(&mut self) -> StorageResult<()> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(|e| classify(e, false)),
            None => Ok(()),
        }
    }
}

/// Read one column of a result row into the in-memory model
fn decode(row: &PgRow, idx: usize, kind: StoredKind) -> Result<Value, sqlx::Error> {
    let value = match kind {
        StoredKind::SmallInt => Value::from(row.try_get::<Option<i16>, _>(idx)?.map(i64::from)),
        StoredKind::Integer => Value::from(row.try_get::<Option<i32>, _>(idx)?),
        StoredKind::BigInt => Value::from(row.try_get::<Option<i64>, _>(idx)?),
        StoredKind::Real => Value::from(row.try_get::<Option<f32>, _>(idx)?.map(f64::from)),
        StoredKind::Double => Value::from(row.try_get::<Option<f64>, _>(idx)?),
        StoredKind::Boolean => Value::from(row.try_get::<Option<bool>, _>(idx)?),
        StoredKind::Timestamp => Value::from(row.try_get::<Option<NaiveDateTime>, _>(idx)?),
        StoredKind::TimestampTz => {
            Value::from(row.try_get::<Option<DateTime<Utc>>, _>(idx)?.map(|ts| ts.naive_utc()))
        },
        StoredKind::Date => Value::from(
            row.try_get::<Option<NaiveDate>, _>(idx)?
                .map(|d| d.and_time(NaiveTime::MIN)),
        ),
        StoredKind::Json => row
            .try_get::<Option<serde_json::Value>, _>(idx)?
            .map(Value::from_json)
            .unwrap_or(Value::Null),
        StoredKind::Text | StoredKind::Other => Value::from(row.try_get::<Option<String>, _>(idx)?),
    };
    Ok(value)
}

/// Map a driver error onto the storage taxonomy.
///
/// `write` marks errors raised by an insert, where anything the server
/// refuses that is not a connection or column-type problem rejects the batch.
pub(crate) fn classify(err: sqlx::Error, write: bool) -> StorageError {
    let connection_lost = matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    );
    if connection_lost {
        return StorageError::Connection(Box::new(err));
    }

    let (code, message) = match &err {
        sqlx::Error::Database(db) => (db.code().map(|c| c.into_owned()), db.message().to_string()),
        _ => (None, String::new()),
    };

    match code.as_deref() {
        // 08xxx: connection exception, 57P01: admin shutdown
        Some(code) if code.starts_with("08") || code == "57P01" => StorageError::Connection(Box::new(err)),
        // datatype mismatch, undefined column, cannot coerce
        Some("42804" | "42703" | "42846") => StorageError::SchemaConflict(message),
        _ if write => StorageError::WriteRejected(Box::new(err)),
        _ => StorageError::Query(Box::new(err)),
    }
}
