use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use http::header;
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::DateRange;
use crate::services::price_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_consolidated))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConsolidatedParams {
    pub ticker: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub format: ExportFormat,
}

pub async fn get_consolidated(
    Query(params): Query<ConsolidatedParams>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    info!("GET /api/consolidated - {:?}", params);

    let ticker = params.ticker.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let range = DateRange::new(params.start_date, params.end_date);
    let table = price_service::consolidated_table(&state.pool, ticker, &range).await?;

    match params.format {
        ExportFormat::Json => Ok(Json(table).into_response()),
        ExportFormat::Csv => {
            let body = price_service::render_consolidated_csv(&table.data)?;
            let filename = format!(
                "attachment; filename={}_consolidated.csv",
                ticker.map(str::to_uppercase).unwrap_or_else(|| "all".to_string())
            );
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, filename),
                ],
                body,
            )
                .into_response())
        }
    }
}
