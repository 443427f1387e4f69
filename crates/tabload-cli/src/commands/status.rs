//! `tabload status` command implementation
//!
//! Shows where uploads would go and whether the database answers.

use crate::error::{CliError, Result};
use colored::Colorize;
use tabload_core::{db, Config};

/// Connect and run a health check
pub async fn run() -> Result<()> {
    let config = Config::load().map_err(|e| CliError::config(e.to_string()))?;

    println!("{}", "Configuration:".cyan().bold());
    println!("  Database:      {}", config.database.target());
    println!("  Upload mode:   {}", config.upload.mode);
    println!("  Strict schema: {}", config.upload.strict_schema);
    match config.upload.timeout_secs {
        Some(secs) => println!("  Timeout:       {}s", secs),
        None => println!("  Timeout:       none"),
    }
    println!();

    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| CliError::Database(e.to_string()))?;
    db::health_check(&pool)
        .await
        .map_err(|e| CliError::Database(e.to_string()))?;

    println!("{} {}", "Database:".cyan().bold(), "reachable".green());
    Ok(())
}
