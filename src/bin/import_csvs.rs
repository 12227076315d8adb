//! Bulk import every `*.csv` in a folder.
//!
//! Usage: `import_csvs [FOLDER]` (defaults to `CSV_FOLDER`, then `./stocks`).
//! The ticker for each file is its upper-cased file stem.

use std::path::PathBuf;

use anyhow::Context;

use pricebook_backend::config::AppConfig;
use pricebook_backend::db;
use pricebook_backend::logging::{init_logging, LoggingConfig};
use pricebook_backend::services::batch_import_service;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging(LoggingConfig::from_env())?;

    let config = AppConfig::from_env();
    config.validate().map_err(anyhow::Error::msg)?;

    let folder = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.csv_folder.clone());

    let pool = db::connect(&config.database_url, config.db_max_connections)
        .await
        .with_context(|| format!("failed to open store at {}", config.database_url))?;

    let report = batch_import_service::import_directory(&pool, &folder, config.batch_size)
        .await
        .with_context(|| format!("failed to scan {}", folder.display()))?;

    for failure in &report.failed {
        tracing::warn!("{}: {}", failure.file, failure.error);
    }
    tracing::info!(
        "Import complete: {}/{} files, {} new rows",
        report.succeeded, report.files_found, report.rows_inserted
    );

    pool.close().await;
    Ok(())
}
