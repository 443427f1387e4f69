//! `tabload infer` command implementation
//!
//! Shows the table a dataset would produce without touching the database.

use crate::error::Result;
use crate::loader::load_files;
use crate::InferArgs;
use colored::Colorize;
use serde::Serialize;
use tabload_common::Dataset;
use tabload_core::{infer_column_type, ColumnType};

/// One column of an inference report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferredColumn {
    pub name: String,
    pub column_type: ColumnType,
    pub sql_type: &'static str,
    pub nulls: usize,
}

/// Inferred columns of a whole dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceReport {
    pub rows: usize,
    pub columns: Vec<InferredColumn>,
}

impl InferenceReport {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        Self {
            rows: dataset.num_rows(),
            columns: dataset
                .columns()
                .iter()
                .map(|column| {
                    let column_type = infer_column_type(column.values());
                    InferredColumn {
                        name: column.name().to_string(),
                        column_type,
                        sql_type: column_type.sql_type(),
                        nulls: column.values().iter().filter(|v| v.is_null()).count(),
                    }
                })
                .collect(),
        }
    }
}

/// Load the files and print the inferred schema
pub async fn run(args: &InferArgs) -> Result<()> {
    let dataset = load_files(&args.files, args.format)?;
    let report = InferenceReport::from_dataset(&dataset);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &InferenceReport) {
    use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Column", "Inferred", "SQL type", "Nulls"]);

    for column in &report.columns {
        table.add_row(vec![
            column.name.clone(),
            column.column_type.to_string(),
            column.sql_type.to_string(),
            column.nulls.to_string(),
        ]);
    }

    println!();
    println!("{}", table);
    println!();
    println!(
        "{} {} columns, {} rows",
        "Inferred:".cyan().bold(),
        report.columns.len(),
        report.rows
    );
}
