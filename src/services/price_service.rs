use std::io::Read;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::db::price_queries;
use crate::errors::AppError;
use crate::models::{
    ConsolidatedRow, DateRange, Direction, ExtremumField, PriceFilter, PriceRecord,
};
use crate::services::csv_import_service;

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub ticker: String,
    pub rows_parsed: usize,
    pub rows_inserted: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchlistResponse {
    pub tickers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceRowsResponse {
    pub ticker: String,
    pub data: Vec<PriceRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HighestVolumeResponse {
    pub ticker: String,
    pub date: NaiveDate,
    pub highest_volume: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LowestClosingResponse {
    pub ticker: String,
    pub date: NaiveDate,
    pub lowest_closing_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    pub ticker: String,
    pub avg_price: Option<f64>,
    pub max_close: Option<f64>,
    pub min_close: Option<f64>,
    pub avg_volume: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidatedResponse {
    pub data: Vec<ConsolidatedRow>,
}

/// Normalize one CSV and store it under `ticker`.
pub async fn import_csv<R: Read>(
    pool: &SqlitePool,
    ticker: &str,
    reader: R,
) -> Result<ImportSummary, AppError> {
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(AppError::Validation("ticker must not be empty".to_string()));
    }

    let records = csv_import_service::normalize_csv(reader)?;
    let rows_inserted = price_queries::insert_batch(pool, &ticker, &records).await
        .map_err(|e| {
            error!("Failed to store {} rows for {}: {}", records.len(), ticker, e);
            AppError::Db(e)
        })?;

    info!("Imported {}: {} rows parsed, {} new", ticker, records.len(), rows_inserted);
    Ok(ImportSummary {
        ticker,
        rows_parsed: records.len(),
        rows_inserted,
    })
}

pub async fn watchlist(pool: &SqlitePool) -> Result<WatchlistResponse, AppError> {
    let tickers = price_queries::list_tickers(pool).await?;
    Ok(WatchlistResponse { tickers })
}

pub async fn filtered_rows(
    pool: &SqlitePool,
    ticker: &str,
    limit: i64,
    filter: &PriceFilter,
) -> Result<PriceRowsResponse, AppError> {
    if limit < 1 {
        return Err(AppError::Validation(format!("limit must be at least 1, got {}", limit)));
    }

    let data = price_queries::fetch_filtered(pool, ticker, limit, filter).await
        .map_err(|e| {
            error!("Failed to fetch rows for {}: {}", ticker, e);
            AppError::Db(e)
        })?;

    Ok(PriceRowsResponse {
        ticker: ticker.to_uppercase(),
        data,
    })
}

pub async fn highest_volume(
    pool: &SqlitePool,
    ticker: &str,
    range: &DateRange,
) -> Result<HighestVolumeResponse, AppError> {
    let ticker = ticker.to_uppercase();
    let row = price_queries::fetch_extremum(pool, &ticker, range, ExtremumField::Volume, Direction::Max)
        .await?;

    match row {
        Some(PriceRecord { date, volume: Some(volume), .. }) => Ok(HighestVolumeResponse {
            ticker,
            date,
            highest_volume: volume,
        }),
        _ => Err(no_data_for(&ticker)),
    }
}

pub async fn lowest_closing(
    pool: &SqlitePool,
    ticker: &str,
    range: &DateRange,
) -> Result<LowestClosingResponse, AppError> {
    let ticker = ticker.to_uppercase();
    let row = price_queries::fetch_extremum(pool, &ticker, range, ExtremumField::Close, Direction::Min)
        .await?;

    match row {
        Some(PriceRecord { date, close: Some(close), .. }) => Ok(LowestClosingResponse {
            ticker,
            date,
            lowest_closing_price: close,
        }),
        _ => Err(no_data_for(&ticker)),
    }
}

pub async fn consolidated_summary(
    pool: &SqlitePool,
    ticker: &str,
    filter: &PriceFilter,
) -> Result<SummaryResponse, AppError> {
    let ticker = ticker.to_uppercase();
    let metrics = price_queries::fetch_aggregate(pool, &ticker, filter).await?;

    match metrics {
        Some(m) => Ok(SummaryResponse {
            ticker,
            avg_price: m.avg_price,
            max_close: m.max_close,
            min_close: m.min_close,
            avg_volume: m.avg_volume,
        }),
        None => Err(AppError::NotFound(format!(
            "No data found for {} (filters: start={:?}, end={:?}, min_price={:?}, max_price={:?}, min_volume={:?}, max_volume={:?})",
            ticker,
            filter.range.start,
            filter.range.end,
            filter.price.min,
            filter.price.max,
            filter.volume.min,
            filter.volume.max,
        ))),
    }
}

pub async fn consolidated_table(
    pool: &SqlitePool,
    ticker: Option<&str>,
    range: &DateRange,
) -> Result<ConsolidatedResponse, AppError> {
    let data = price_queries::fetch_consolidated(pool, ticker, range).await?;
    if data.is_empty() {
        return Err(AppError::NotFound("No data found.".to_string()));
    }
    Ok(ConsolidatedResponse { data })
}

/// Render consolidated rows as CSV with a header line.
pub fn render_consolidated_csv(rows: &[ConsolidatedRow]) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)
            .map_err(|e| AppError::External(format!("Failed to write CSV: {}", e)))?;
    }
    let bytes = writer.into_inner()
        .map_err(|e| AppError::External(format!("Failed to flush CSV: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::External(format!("CSV output is not UTF-8: {}", e)))
}

fn no_data_for(ticker: &str) -> AppError {
    AppError::NotFound(format!("No data found for {}.", ticker))
}
