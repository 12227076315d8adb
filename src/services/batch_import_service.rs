use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::price_service;

#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub files_found: usize,
    pub succeeded: usize,
    pub rows_inserted: u64,
    pub failed: Vec<FileFailure>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchItem {
    pub ticker: String,
    pub csv: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemStatus {
    pub ticker: String,
    pub status: String,
}

/// `*.csv` files directly under `dir`, sorted by name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path.extension().and_then(|e| e.to_str()) == Some("csv");
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `stocks/aapl.csv` → `AAPL`.
pub fn ticker_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
}

/// Resolve a requested import folder against `root`.
///
/// `None` means `root` itself. Relative paths are joined onto `root`; whatever
/// the request names must canonicalize to a directory inside `root`.
pub fn resolve_import_dir(root: &Path, requested: Option<&str>) -> Result<PathBuf, AppError> {
    let root = root.canonicalize().map_err(|e| {
        AppError::Validation(format!("CSV folder {} is not available: {}", root.display(), e))
    })?;

    let Some(requested) = requested.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(root);
    };

    let dir = root.join(requested).canonicalize().map_err(|_| {
        AppError::Validation(format!("{} is not a directory", requested))
    })?;

    if !dir.starts_with(&root) {
        warn!("Rejected import outside the CSV folder: {}", requested);
        return Err(AppError::Validation(format!(
            "{} is outside the CSV folder",
            requested
        )));
    }
    if !dir.is_dir() {
        return Err(AppError::Validation(format!("{} is not a directory", requested)));
    }
    Ok(dir)
}

/// Import every CSV in `dir`, `batch_size` files at a time.
///
/// A file that fails is logged and listed in the report; the run carries on.
/// Only an unreadable directory fails the whole call.
pub async fn import_directory(
    pool: &SqlitePool,
    dir: &Path,
    batch_size: usize,
) -> Result<BatchReport, AppError> {
    if batch_size == 0 {
        return Err(AppError::Validation("batch_size must be at least 1".to_string()));
    }

    let run_id = Uuid::new_v4();
    let files = list_csv_files(dir)?;
    info!("[{}] Found {} CSV files to import in {}", run_id, files.len(), dir.display());

    let mut report = BatchReport {
        run_id,
        files_found: files.len(),
        succeeded: 0,
        rows_inserted: 0,
        failed: Vec::new(),
    };

    let total_chunks = files.len().div_ceil(batch_size);
    for (chunk_idx, chunk) in files.chunks(batch_size).enumerate() {
        info!("[{}] Processing batch {}/{} ({} files)", run_id, chunk_idx + 1, total_chunks, chunk.len());

        for path in chunk {
            let name = path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());

            match import_file(pool, path).await {
                Ok(inserted) => {
                    report.succeeded += 1;
                    report.rows_inserted += inserted;
                }
                Err(e) => {
                    warn!("[{}] Failed to import {}: {}", run_id, name, e);
                    report.failed.push(FileFailure { file: name, error: e.to_string() });
                }
            }
        }

        info!("[{}] Batch {}/{} stored", run_id, chunk_idx + 1, total_chunks);
    }

    info!(
        "[{}] Import finished: {} ok, {} failed, {} new rows",
        run_id, report.succeeded, report.failed.len(), report.rows_inserted
    );
    Ok(report)
}

async fn import_file(pool: &SqlitePool, path: &Path) -> Result<u64, AppError> {
    let ticker = ticker_from_path(path)
        .ok_or_else(|| AppError::Validation(format!("cannot derive ticker from {}", path.display())))?;
    let file = File::open(path)?;
    let summary = price_service::import_csv(pool, &ticker, file).await?;
    Ok(summary.rows_inserted)
}

/// Import several in-memory CSVs, one status per item, in request order.
pub async fn import_many(pool: &SqlitePool, items: &[BatchItem]) -> Vec<BatchItemStatus> {
    let mut statuses = Vec::with_capacity(items.len());

    for item in items {
        let ticker = item.ticker.trim().to_uppercase();
        let status = match price_service::import_csv(pool, &ticker, item.csv.as_bytes()).await {
            Ok(_) => "ok".to_string(),
            Err(e) => {
                warn!("Failed to import uploaded CSV for {}: {}", ticker, e);
                format!("error: {}", e)
            }
        };
        statuses.push(BatchItemStatus { ticker, status });
    }

    statuses
}
