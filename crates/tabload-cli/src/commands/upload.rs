//! `tabload upload` command implementation

use crate::error::{CliError, Result};
use crate::loader::load_files;
use crate::UploadArgs;
use colored::Colorize;
use std::time::Duration;
use tabload_core::{Config, PgStore, UploadMode, UploadOptions, UploadSummary, Uploader};
use tracing::info;

/// Load the files and upload them
pub async fn run(args: &UploadArgs) -> Result<()> {
    let config = Config::load().map_err(|e| CliError::config(e.to_string()))?;
    let dataset = load_files(&args.files, args.format)?;
    info!(
        files = args.files.len(),
        rows = dataset.num_rows(),
        columns = dataset.num_columns(),
        "Loaded input"
    );

    let options = options_for(args, config.upload.to_options());
    let store = PgStore::connect(&config.database)
        .await
        .map_err(|e| CliError::Database(e.to_string()))?;

    let summary = Uploader::with_options(store, options)
        .upload(&dataset, &args.table)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Command-line flags layered over the configured defaults
pub fn options_for(args: &UploadArgs, mut options: UploadOptions) -> UploadOptions {
    if args.full {
        options.mode = UploadMode::Full;
    }
    if args.strict_schema {
        options.strict_schema = true;
    }
    if let Some(secs) = args.timeout_secs {
        options.timeout = Some(Duration::from_secs(secs));
    }
    options
}

fn print_summary(summary: &UploadSummary) {
    println!("{} {}", "Uploaded to".cyan().bold(), summary.table_name.green());
    println!("  Incoming rows: {}", summary.total_incoming_rows);
    println!("  Rows written:  {}", summary.rows_written);

    if summary.rows_written == 0 && summary.total_incoming_rows > 0 {
        println!("{}", "  Table already held every incoming row.".dimmed());
    }
}
