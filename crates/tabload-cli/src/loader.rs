//! Input file loaders
//!
//! Turn CSV, JSON and JSON-lines files into [`Dataset`]s. CSV cells are
//! untyped text, so each cell is parsed into the most specific [`Value`] it
//! reads as; JSON values keep the type they were written with.

use crate::error::{CliError, Result};
use clap::ValueEnum;
use serde_json::{Map, Value as JsonValue};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tabload_common::{Dataset, Value};
use tracing::debug;

/// Cell texts read as missing values
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Comma-separated values with a header row
    Csv,
    /// A JSON array of objects
    Json,
    /// One JSON object per line
    Jsonl,
}

impl InputFormat {
    /// Guess the format from a file extension
    pub fn detect(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(InputFormat::Csv),
            Some("json") => Ok(InputFormat::Json),
            Some("jsonl" | "ndjson") => Ok(InputFormat::Jsonl),
            _ => Err(CliError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Load several files and stack them into one dataset.
///
/// Columns are the union of every file's columns in order of first
/// appearance; cells a file does not have are null.
pub fn load_files<P: AsRef<Path>>(paths: &[P], format: Option<InputFormat>) -> Result<Dataset> {
    let mut combined: Option<Dataset> = None;
    for path in paths {
        let dataset = load_file(path.as_ref(), format)?;
        combined = Some(match combined {
            Some(acc) => acc.concat(&dataset),
            None => dataset,
        });
    }
    Ok(combined.unwrap_or_default())
}

/// Load one file, detecting the format from its extension unless given
pub fn load_file(path: &Path, format: Option<InputFormat>) -> Result<Dataset> {
    let format = match format {
        Some(format) => format,
        None => InputFormat::detect(path)?,
    };
    let file = File::open(path).map_err(|_| CliError::FileNotFound(path.display().to_string()))?;
    let name = path.display().to_string();

    let dataset = match format {
        InputFormat::Csv => load_csv(file),
        InputFormat::Json => load_json(file),
        InputFormat::Jsonl => load_json_lines(BufReader::new(file)),
    }
    .map_err(|e| match e {
        CliError::InvalidInput { reason, .. } => CliError::invalid_input(&name, reason),
        other => other,
    })?;

    debug!(
        file = %name,
        ?format,
        rows = dataset.num_rows(),
        columns = dataset.num_columns(),
        "Loaded input file"
    );
    Ok(dataset)
}

/// CSV with a header row; every cell goes through [`parse_cell`]
pub fn load_csv<R: Read>(reader: R) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let names: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(parse_cell).collect());
    }

    Dataset::from_rows(names, rows).map_err(|e| CliError::invalid_input("<csv>", e.to_string()))
}

/// A JSON array of objects
pub fn load_json<R: Read>(reader: R) -> Result<Dataset> {
    let document: JsonValue = serde_json::from_reader(reader)?;
    let JsonValue::Array(items) = document else {
        return Err(CliError::invalid_input("<json>", "expected an array of objects"));
    };

    let records = items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            JsonValue::Object(map) => Ok(map),
            _ => Err(CliError::invalid_input(
                "<json>",
                format!("element {} is not an object", idx),
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    records_to_dataset(records)
}

/// One JSON object per line; blank lines are skipped
pub fn load_json_lines<R: BufRead>(reader: R) -> Result<Dataset> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line)? {
            JsonValue::Object(map) => records.push(map),
            _ => {
                return Err(CliError::invalid_input(
                    "<jsonl>",
                    format!("line {} is not an object", idx + 1),
                ))
            },
        }
    }
    records_to_dataset(records)
}

fn records_to_dataset(records: Vec<Map<String, JsonValue>>) -> Result<Dataset> {
    let mut names: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let rows: Vec<Vec<Value>> = records
        .into_iter()
        .map(|mut record| {
            names
                .iter()
                .map(|name| record.remove(name).map(Value::from_json).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Dataset::from_rows(names, rows).map_err(|e| CliError::invalid_input("<json>", e.to_string()))
}

/// Parse one CSV cell into the most specific value it reads as.
///
/// Missing-value tokens become null; then booleans, integers (without
/// leading zeros, so codes like `"007"` stay text), floats, timestamps or
/// dates, and JSON objects or arrays are tried in that order. Anything else
/// is text.
pub fn parse_cell(raw: &str) -> Value {
    if NA_TOKENS.contains(&raw) {
        return Value::Null;
    }

    match raw {
        "true" | "True" | "TRUE" => return Value::Bool(true),
        "false" | "False" | "FALSE" => return Value::Bool(false),
        _ => {},
    }

    if is_integer_literal(raw) {
        return match raw.parse::<i64>() {
            Ok(i) => Value::Int(i),
            Err(_) => Value::from(raw),
        };
    }

    if raw.bytes().any(|b| b.is_ascii_digit()) && !has_leading_zero(raw) {
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return Value::Float(f);
            }
        }
    }

    if let Some(ts) = Value::parse_timestamp(raw) {
        return Value::Timestamp(ts);
    }

    if raw.starts_with('{') || raw.starts_with('[') {
        if let Ok(json) = serde_json::from_str::<JsonValue>(raw) {
            return Value::from_json(json);
        }
    }

    Value::from(raw)
}

fn is_integer_literal(raw: &str) -> bool {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) && !has_leading_zero(raw)
}

/// `"0"` and `"0.5"` are numbers; `"007"` and `"00.5"` are identifiers
fn has_leading_zero(raw: &str) -> bool {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw).as_bytes();
    digits.len() > 1 && digits[0] == b'0' && digits[1].is_ascii_digit()
}
