//! Build automation tasks for tabload
//!
//! - Generating the CLI reference from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for tabload", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    // Generate markdown from clap definitions
    let markdown = clap_markdown::help_markdown::<tabload_cli::Cli>();

    let content = format!(
        r#"# tabload CLI Reference

This documentation is auto-generated from the CLI source code. Last updated: {}.

## Overview

tabload infers a PostgreSQL schema from CSV or JSON files, creates the table
if it does not exist, and appends only the rows the table does not hold yet.

## Quick Start

```bash
# Preview the inferred column types
tabload infer ifsc_codes.csv

# Upload; re-running the same command writes nothing new
tabload upload ifsc_codes.csv --table ifsc_codes

# Append every row without comparing against the table
tabload upload extra.csv --table ifsc_codes --full

# Check the database connection
tabload status
```

## Commands

{}

## Environment Variables

- `DATABASE_URL` - PostgreSQL connection string; takes precedence over the discrete variables
- `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD` - Discrete connection parameters
- `DATABASE_MAX_CONNECTIONS`, `DATABASE_MIN_CONNECTIONS`, `DATABASE_CONNECT_TIMEOUT`, `DATABASE_IDLE_TIMEOUT` - Pool settings
- `TABLOAD_MODE` - `incremental` (default) or `full`
- `TABLOAD_TIMEOUT_SECS` - Bound on one upload call
- `TABLOAD_STRICT_SCHEMA` - `true` to check existing column types before writing
- `TABLOAD_MAX_BIND_PARAMS` - Bind parameters per insert statement (at most 65535)
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILTER` - Logging

A `.env` file in the working directory is read as well.

---

*This documentation is automatically generated from the CLI source code. To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    // Create output directory if it doesn't exist
    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
