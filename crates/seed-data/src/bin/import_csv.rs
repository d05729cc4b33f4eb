//! Imports historical measurements from a `user,city,timestamp,variable,value` CSV file.
//!
//! Run with:
//! ```
//! cargo run -p seed-data --bin import-csv -- input.csv
//! ```

use std::path::PathBuf;

use clap::Parser;
use monitoring::database;
use seed_data::config::Settings;
use seed_data::csv_import::import_csv_file;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Import measurements from CSV")]
struct Args {
    /// CSV file to import (defaults to SEED_CSV_FILE or input.csv)
    path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let settings = Settings::from_env()?;
    let path = args.path.unwrap_or_else(|| settings.csv_file.clone());

    tracing::info!("Connecting to {}", settings.masked_database_url());
    let db = database::connect(&settings.database_url, settings.db_pool_max).await?;

    let report = import_csv_file(&db, &path).await?;

    tracing::info!("Import completed!");
    tracing::info!("  Rows: {}", report.rows);
    tracing::info!("  Imported: {}", report.imported);
    tracing::info!("  Failed: {}", report.failed);

    Ok(())
}
