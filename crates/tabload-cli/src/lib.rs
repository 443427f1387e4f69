//! tabload CLI Library
//!
//! Command-line front end for loading tabular files into PostgreSQL.
//!
//! # Overview
//!
//! - **Upload**: load CSV / JSON files and upload them incrementally (`tabload upload`)
//! - **Inference**: preview the column types a table would get (`tabload infer`)
//! - **Status**: check the database connection (`tabload status`)

pub mod commands;
pub mod error;
pub mod loader;

// Re-export commonly used types
pub use error::{CliError, Result};
pub use loader::InputFormat;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// tabload - infer a schema and upload tabular files into PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "tabload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the command reference as markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload files into a table, creating it if needed
    Upload(UploadArgs),

    /// Show the column types inferred for files
    Infer(InferArgs),

    /// Check the database connection
    Status,
}

/// Arguments of `tabload upload`
#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Input files; several files are stacked into one upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Destination table
    #[arg(short, long)]
    pub table: String,

    /// Write every row without checking what the table already holds
    #[arg(long)]
    pub full: bool,

    /// Check the existing table's column types before writing
    #[arg(long)]
    pub strict_schema: bool,

    /// Give up after this many seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,

    /// Input format (detected from the file extension by default)
    #[arg(short, long, value_enum)]
    pub format: Option<InputFormat>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments of `tabload infer`
#[derive(Args, Debug, Clone)]
pub struct InferArgs {
    /// Input files; several files are stacked as for an upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Input format (detected from the file extension by default)
    #[arg(short, long, value_enum)]
    pub format: Option<InputFormat>,

    /// Print the inferred schema as JSON
    #[arg(long)]
    pub json: bool,
}
