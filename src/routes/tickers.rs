use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tracing::{error, info};

use crate::errors::AppError;
use crate::services::price_service::{self, WatchlistResponse};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tickers))
}

pub async fn list_tickers(
    State(state): State<AppState>,
) -> Result<Json<WatchlistResponse>, AppError> {
    info!("GET /api/tickers - Listing imported tickers");
    let watchlist = price_service::watchlist(&state.pool).await
        .map_err(|e| {
            error!("Failed to list tickers: {}", e);
            e
        })?;
    Ok(Json(watchlist))
}
