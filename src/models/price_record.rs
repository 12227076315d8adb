use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored daily bar for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PriceRecord {
    pub id: i64,
    pub ticker: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
    pub avg_price: Option<f64>,
    pub variation_pct: Option<f64>,
}

/// A validated CSV row, not yet attached to a ticker.
///
/// `date`, `open` and `close` are always present; the normalizer drops rows
/// without them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
    pub avg_price: f64,
    pub variation_pct: Option<f64>,
}

impl NormalizedRecord {
    pub fn new(
        date: NaiveDate,
        open: f64,
        high: Option<f64>,
        low: Option<f64>,
        close: f64,
        adj_close: Option<f64>,
        volume: Option<f64>,
    ) -> Self {
        let variation_pct = if open == 0.0 {
            None
        } else {
            Some((close - open) / open * 100.0)
        };

        Self {
            date,
            open,
            high,
            low,
            close,
            adj_close,
            volume,
            avg_price: (open + close) / 2.0,
            variation_pct,
        }
    }
}

/// Inclusive date window; `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }
}

/// Inclusive numeric bounds. `Some(0.0)` is a real bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Bounds {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceFilter {
    pub range: DateRange,
    /// Applied to `close`.
    pub price: Bounds,
    pub volume: Bounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremumField {
    Volume,
    Close,
}

impl ExtremumField {
    pub fn column(self) -> &'static str {
        match self {
            ExtremumField::Volume => "volume",
            ExtremumField::Close => "close",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Max,
    Min,
}

impl Direction {
    pub fn sql_order(self) -> &'static str {
        match self {
            Direction::Max => "DESC",
            Direction::Min => "ASC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub avg_price: Option<f64>,
    pub max_close: Option<f64>,
    pub min_close: Option<f64>,
    pub avg_volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ConsolidatedRow {
    pub ticker: String,
    pub date: NaiveDate,
    pub avg_price: Option<f64>,
    pub variation_pct: Option<f64>,
}
