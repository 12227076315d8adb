use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::errors::AppError;
use crate::services::batch_import_service::{self, BatchItem, BatchItemStatus, BatchReport};
use crate::services::price_service::{self, ImportSummary};
use crate::state::AppState;

/// Static segments win over `/:ticker`, so the lower-case tickers `batch` and
/// `directory` reach the batch endpoints. Tickers are upper-cased on import,
/// so `/BATCH` and `/DIRECTORY` import those symbols.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/batch", post(import_batch))
        .route("/directory", post(import_directory))
        .route("/:ticker", post(import_csv))
}

#[derive(Debug, Deserialize)]
pub struct BatchUploadRequest {
    pub items: Vec<BatchItem>,
}

#[derive(Debug, Serialize)]
pub struct BatchUploadResponse {
    pub message: String,
    pub details: Vec<BatchItemStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DirectoryImportRequest {
    /// Sub-folder of the configured CSV folder.
    pub path: Option<String>,
    pub batch_size: Option<usize>,
}

/// Body is the raw CSV text.
pub async fn import_csv(
    Path(ticker): Path<String>,
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<ImportSummary>), AppError> {
    info!("POST /api/imports/{} - Importing {} bytes of CSV", ticker, body.len());

    let summary = price_service::import_csv(&state.pool, &ticker, body.as_bytes()).await
        .map_err(|e| {
            error!("Failed to import CSV for {}: {}", ticker, e);
            e
        })?;

    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn import_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchUploadRequest>,
) -> Result<Json<BatchUploadResponse>, AppError> {
    info!("POST /api/imports/batch - {} files", request.items.len());

    let details = batch_import_service::import_many(&state.pool, &request.items).await;
    Ok(Json(BatchUploadResponse {
        message: format!("{} CSVs processed.", details.len()),
        details,
    }))
}

pub async fn import_directory(
    State(state): State<AppState>,
    Json(request): Json<DirectoryImportRequest>,
) -> Result<Json<BatchReport>, AppError> {
    let dir = batch_import_service::resolve_import_dir(&state.csv_folder, request.path.as_deref())?;
    let batch_size = request.batch_size.unwrap_or(state.batch_size);
    info!("POST /api/imports/directory - {} (batch size {})", dir.display(), batch_size);

    let report = batch_import_service::import_directory(&state.pool, &dir, batch_size).await?;
    Ok(Json(report))
}
