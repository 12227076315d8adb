use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{error, info};

use crate::errors::AppError;
use crate::models::{Bounds, DateRange, PriceFilter};
use crate::services::price_service::{
    self, HighestVolumeResponse, LowestClosingResponse, PriceRowsResponse, SummaryResponse,
};
use crate::state::AppState;

pub const DEFAULT_LIMIT: i64 = 5;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:ticker", get(get_prices))
        .route("/:ticker/highest_volume", get(get_highest_volume))
        .route("/:ticker/lowest_closing_price", get(get_lowest_closing_price))
        .route("/:ticker/summary", get(get_summary))
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl RangeParams {
    fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    pub limit: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_volume: Option<f64>,
    pub max_volume: Option<f64>,
}

impl FilterParams {
    fn filter(&self) -> PriceFilter {
        PriceFilter {
            range: DateRange::new(self.start_date, self.end_date),
            price: Bounds::new(self.min_price, self.max_price),
            volume: Bounds::new(self.min_volume, self.max_volume),
        }
    }
}

pub async fn get_prices(
    Path(ticker): Path<String>,
    Query(params): Query<FilterParams>,
    State(state): State<AppState>,
) -> Result<Json<PriceRowsResponse>, AppError> {
    info!("GET /api/prices/{} - {:?}", ticker, params);
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let rows = price_service::filtered_rows(&state.pool, &ticker, limit, &params.filter()).await
        .map_err(|e| {
            error!("Failed to get rows for {}: {}", ticker, e);
            e
        })?;
    Ok(Json(rows))
}

pub async fn get_highest_volume(
    Path(ticker): Path<String>,
    Query(params): Query<RangeParams>,
    State(state): State<AppState>,
) -> Result<Json<HighestVolumeResponse>, AppError> {
    info!("GET /api/prices/{}/highest_volume - {:?}", ticker, params);
    let row = price_service::highest_volume(&state.pool, &ticker, &params.range()).await?;
    Ok(Json(row))
}

pub async fn get_lowest_closing_price(
    Path(ticker): Path<String>,
    Query(params): Query<RangeParams>,
    State(state): State<AppState>,
) -> Result<Json<LowestClosingResponse>, AppError> {
    info!("GET /api/prices/{}/lowest_closing_price - {:?}", ticker, params);
    let row = price_service::lowest_closing(&state.pool, &ticker, &params.range()).await?;
    Ok(Json(row))
}

pub async fn get_summary(
    Path(ticker): Path<String>,
    Query(params): Query<FilterParams>,
    State(state): State<AppState>,
) -> Result<Json<SummaryResponse>, AppError> {
    info!("GET /api/prices/{}/summary - {:?}", ticker, params);
    let summary = price_service::consolidated_summary(&state.pool, &ticker, &params.filter()).await?;
    Ok(Json(summary))
}
