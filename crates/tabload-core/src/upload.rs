//! Upload orchestration
//!
//! One upload call runs, in order and inside a single storage transaction:
//!
//! 1. ensure the destination table exists (and, in strict mode, that its
//!    columns fit the inferred types),
//! 2. in incremental mode, read the persisted rows and keep only the incoming
//!    rows the table does not hold yet,
//! 3. canonicalize and insert what is left,
//! 4. commit.
//!
//! Any failure rolls the transaction back and is returned with the table name
//! and the step it surfaced in. An empty delta skips the write entirely.

use crate::canonical::canonicalize_rows;
use crate::delta::compute_delta;
use crate::error::{StorageError, UploadError, UploadResult, UploadStep};
use crate::existing::read_described;
use crate::schema::{check_compatibility, ensure_table, TableSchema};
use crate::store::{StoreSession, TableStore};
use crate::writer::{write_rows, POSTGRES_MAX_BIND_PARAMS};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tabload_common::Dataset;
use tracing::{debug, info, instrument, warn};

/// How an upload treats rows the table may already hold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Write only rows not already persisted
    #[default]
    Incremental,
    /// Write every incoming row without reading the table
    Full,
}

impl UploadMode {
    /// Mode for the boolean `incremental` flag callers pass
    pub fn from_incremental(incremental: bool) -> Self {
        if incremental {
            UploadMode::Incremental
        } else {
            UploadMode::Full
        }
    }
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadMode::Incremental => write!(f, "incremental"),
            UploadMode::Full => write!(f, "full"),
        }
    }
}

impl FromStr for UploadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incremental" => Ok(UploadMode::Incremental),
            "full" => Ok(UploadMode::Full),
            _ => Err(format!("Invalid upload mode: '{}'. Use 'incremental' or 'full'", s)),
        }
    }
}

/// Knobs for an [`Uploader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub mode: UploadMode,
    /// Bound on a whole upload call; `None` waits as long as storage does
    pub timeout: Option<Duration>,
    /// Check the existing table's column types before writing
    pub strict_schema: bool,
    pub max_bind_params: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            mode: UploadMode::Incremental,
            timeout: None,
            strict_schema: false,
            max_bind_params: POSTGRES_MAX_BIND_PARAMS,
        }
    }
}

impl UploadOptions {
    pub fn with_mode(mut self, mode: UploadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_strict_schema(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }

    pub fn with_max_bind_params(mut self, max: usize) -> Self {
        self.max_bind_params = max;
        self
    }
}

/// Result record of one upload call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub table_name: String,
    pub total_incoming_rows: usize,
    pub rows_written: u64,
}

/// Uploads datasets into tables of one store
#[derive(Debug, Clone)]
pub struct Uploader<S> {
    store: S,
    options: UploadOptions,
}

impl<S: TableStore> Uploader<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, UploadOptions::default())
    }

    pub fn with_options(store: S, options: UploadOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Upload `dataset` into `table` with the configured mode
    pub async fn upload(&self, dataset: &Dataset, table: &str) -> UploadResult<UploadSummary> {
        self.upload_as(dataset, table, self.options.mode).await
    }

    /// Upload `dataset` into `table` with an explicit mode
    #[instrument(skip(self, dataset), fields(rows = dataset.num_rows(), columns = dataset.num_columns()))]
    pub async fn upload_as(
        &self,
        dataset: &Dataset,
        table: &str,
        mode: UploadMode,
    ) -> UploadResult<UploadSummary> {
        let schema = TableSchema::infer(table, dataset);
        schema
            .validate()
            .map_err(|reason| UploadError::invalid_input(table, reason))?;

        let started = Instant::now();
        let rows_written = match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(dataset, &schema, mode))
                .await
                .map_err(|_| {
                    warn!(timeout = ?limit, "Upload timed out; transaction rolled back");
                    UploadError::Timeout {
                        table: table.to_string(),
                        timeout: limit,
                    }
                })??,
            None => self.run(dataset, &schema, mode).await?,
        };

        info!(
            rows_written,
            incoming = dataset.num_rows(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upload complete"
        );

        Ok(UploadSummary {
            table_name: table.to_string(),
            total_incoming_rows: dataset.num_rows(),
            rows_written,
        })
    }

    /// One transaction: the steps, then commit, or rollback on any failure
    async fn run(&self, dataset: &Dataset, schema: &TableSchema, mode: UploadMode) -> UploadResult<u64> {
        let table = schema.table.as_str();
        let mut session = self
            .store
            .begin()
            .await
            .map_err(at(table, UploadStep::Connect))?;

        match self.steps(&mut session, dataset, schema, mode).await {
            Ok(written) => {
                session.commit().await.map_err(at(table, UploadStep::Commit))?;
                Ok(written)
            },
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed; the connection discards the transaction");
                }
                Err(err)
            },
        }
    }

    async fn steps(
        &self,
        session: &mut S::Session,
        dataset: &Dataset,
        schema: &TableSchema,
        mode: UploadMode,
    ) -> UploadResult<u64> {
        let table = schema.table.as_str();

        ensure_table(session, schema)
            .await
            .map_err(at(table, UploadStep::EnsureTable))?;

        let mut described = None;
        if self.options.strict_schema {
            let stored = session
                .describe_table(table)
                .await
                .map_err(at(table, UploadStep::EnsureTable))?
                .unwrap_or_default();
            check_compatibility(schema, &stored).map_err(at(table, UploadStep::EnsureTable))?;
            described = Some(stored);
        }

        let types = schema.column_types();
        let pending: Cow<'_, Dataset> = match mode {
            UploadMode::Full => Cow::Borrowed(dataset),
            UploadMode::Incremental => {
                let stored = match described {
                    Some(stored) => Some(stored),
                    None => session
                        .describe_table(table)
                        .await
                        .map_err(at(table, UploadStep::ReadExisting))?,
                };
                let existing = read_described(session, table, stored.as_deref(), &schema.column_names())
                    .await
                    .map_err(at(table, UploadStep::ReadExisting))?;

                let delta = compute_delta(dataset, &existing, &types);
                if delta.is_empty() {
                    info!(existing = existing.num_rows(), "No new rows; skipping write");
                    return Ok(0);
                }
                Cow::Owned(delta)
            },
        };

        if pending.is_empty() {
            debug!("Nothing to write");
            return Ok(0);
        }

        let rows = canonicalize_rows(&pending, &types);
        write_rows(session, table, &schema.columns, &rows, self.options.max_bind_params)
            .await
            .map_err(at(table, UploadStep::WriteRows))
    }
}

fn at(table: &str, step: UploadStep) -> impl FnOnce(StorageError) -> UploadError + '_ {
    move |source| UploadError::storage(table, step, source)
}
