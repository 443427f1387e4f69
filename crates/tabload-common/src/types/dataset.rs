//! Rectangular, column-oriented datasets

use super::Value;
use crate::error::{DatasetError, Result};
use std::collections::HashSet;

/// A named column of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An ordered sequence of uniquely named columns of equal length.
///
/// Row `i` is the `i`-th value of every column, in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    /// Build a dataset, checking names and rectangularity
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.name.is_empty() {
                return Err(DatasetError::EmptyColumnName);
            }
            if !seen.insert(column.name.as_str()) {
                return Err(DatasetError::DuplicateColumn(column.name.clone()));
            }
        }

        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(DatasetError::RaggedColumn {
                    column: bad.name.clone(),
                    expected,
                    actual: bad.len(),
                });
            }
        }

        Ok(Self { columns })
    }

    /// Build a dataset from `(name, values)` pairs
    pub fn from_columns(columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        Self::new(
            columns
                .into_iter()
                .map(|(name, values)| Column::new(name, values))
                .collect(),
        )
    }

    /// Build a dataset from row tuples laid out in `names` order
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let width = names.len();
        let mut columns: Vec<Vec<Value>> = (0..width).map(|_| Vec::with_capacity(rows.len())).collect();

        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(DatasetError::RaggedRow {
                    row: idx,
                    expected: width,
                    actual: row.len(),
                });
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }

        Self::from_columns(names.into_iter().zip(columns).collect())
    }

    /// A dataset with the given columns and no rows
    pub fn empty(names: &[String]) -> Result<Self> {
        Self::from_columns(names.iter().map(|n| (n.clone(), Vec::new())).collect())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows; a dataset without columns has none
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    /// True when the dataset holds no rows
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Cells of row `idx` in column order
    pub fn row(&self, idx: usize) -> Option<Vec<&Value>> {
        if idx >= self.num_rows() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[idx]).collect())
    }

    /// Iterate rows in order
    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        (0..self.num_rows()).map(move |idx| self.columns.iter().map(|c| &c.values[idx]).collect())
    }

    /// Keep the rows at `indices`, in the given order. Out-of-range indices are skipped.
    pub fn take(&self, indices: &[usize]) -> Self {
        let rows = self.num_rows();
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: indices
                    .iter()
                    .filter(|&&i| i < rows)
                    .map(|&i| c.values[i].clone())
                    .collect(),
            })
            .collect();
        Self { columns }
    }

    /// Project onto `names`, in that order
    pub fn select(&self, names: &[String]) -> Result<Self> {
        let columns = names
            .iter()
            .map(|name| {
                self.column(name)
                    .cloned()
                    .ok_or_else(|| DatasetError::UnknownColumn(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(columns)
    }

    /// Append the rows of `other` below this dataset.
    ///
    /// The result carries the union of both column sets: this dataset's columns
    /// first, then columns only `other` has. Cells a side does not have become `Null`.
    pub fn concat(&self, other: &Dataset) -> Self {
        let (top, bottom) = (self.num_rows(), other.num_rows());
        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| {
                let mut values = c.values.clone();
                match other.column(&c.name) {
                    Some(o) => values.extend(o.values.iter().cloned()),
                    None => values.resize(top + bottom, Value::Null),
                }
                Column {
                    name: c.name.clone(),
                    values,
                }
            })
            .collect();

        for c in other.columns.iter().filter(|c| self.column(&c.name).is_none()) {
            let mut values = vec![Value::Null; top];
            values.extend(c.values.iter().cloned());
            columns.push(Column {
                name: c.name.clone(),
                values,
            });
        }

        Self { columns }
    }
}
