//! CSV normalization for daily price files.
//!
//! Input is any CSV whose header carries the seven columns in [`COLUMN_MAP`]
//! (exact labels, any order, extra columns ignored). Each cell is coerced on
//! its own: a bad number or date becomes null instead of failing the row.
//! Rows are only dropped when `date`, `open` or `close` end up null.

use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::errors::NormalizeError;
use crate::models::NormalizedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Date,
    Open,
    High,
    Low,
    Close,
    AdjClose,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Date,
    Number,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub source: &'static str,
    pub canonical: &'static str,
    pub field: Field,
    pub kind: ColumnKind,
}

/// Source label → canonical field. Order here is the order missing columns are reported in.
pub const COLUMN_MAP: [ColumnSpec; 7] = [
    ColumnSpec { source: "Date", canonical: "date", field: Field::Date, kind: ColumnKind::Date },
    ColumnSpec { source: "Open", canonical: "open", field: Field::Open, kind: ColumnKind::Number },
    ColumnSpec { source: "High", canonical: "high", field: Field::High, kind: ColumnKind::Number },
    ColumnSpec { source: "Low", canonical: "low", field: Field::Low, kind: ColumnKind::Number },
    ColumnSpec { source: "Close", canonical: "close", field: Field::Close, kind: ColumnKind::Number },
    ColumnSpec { source: "Adj Close", canonical: "adj_close", field: Field::AdjClose, kind: ColumnKind::Number },
    ColumnSpec { source: "Volume", canonical: "volume", field: Field::Volume, kind: ColumnKind::Number },
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// A row after renaming and coercion, before the mandatory-field check.
#[derive(Debug, Default)]
struct CoercedRow {
    date: Option<NaiveDate>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    adj_close: Option<f64>,
    volume: Option<f64>,
}

impl CoercedRow {
    fn assign(&mut self, spec: &ColumnSpec, raw: &str) {
        match spec.kind {
            ColumnKind::Date => self.date = coerce_date(raw),
            ColumnKind::Number => {
                let value = coerce_number(raw);
                match spec.field {
                    Field::Open => self.open = value,
                    Field::High => self.high = value,
                    Field::Low => self.low = value,
                    Field::Close => self.close = value,
                    Field::AdjClose => self.adj_close = value,
                    Field::Volume => self.volume = value,
                    Field::Date => {}
                }
            }
        }
    }

    fn into_record(self) -> Option<NormalizedRecord> {
        let (date, open, close) = (self.date?, self.open?, self.close?);
        Some(NormalizedRecord::new(
            date,
            open,
            self.high,
            self.low,
            close,
            self.adj_close,
            self.volume,
        ))
    }
}

/// Parse, validate and derive fields for one CSV input.
pub fn normalize_csv<R: Read>(reader: R) -> Result<Vec<NormalizedRecord>, NormalizeError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(NormalizeError::Parse("input has no header row".to_string()));
    }

    let rows = reader.records().collect::<Result<Vec<StringRecord>, csv::Error>>()?;
    // Short rows are padded with nulls; rows wider than the header are malformed.
    if let Some(wide) = rows.iter().find(|row| row.len() > headers.len()) {
        let line = wide.position().map_or(0, |p| p.line());
        return Err(NormalizeError::Parse(format!(
            "line {} has {} fields, but the header has {}",
            line,
            wide.len(),
            headers.len()
        )));
    }
    if rows.is_empty() {
        return Err(NormalizeError::EmptyInput);
    }

    let columns = resolve_columns(&headers)?;

    let total = rows.len();
    let records: Vec<NormalizedRecord> = rows
        .iter()
        .filter_map(|row| {
            let mut coerced = CoercedRow::default();
            for (spec, idx) in &columns {
                coerced.assign(spec, row.get(*idx).unwrap_or(""));
            }
            coerced.into_record()
        })
        .collect();

    if records.is_empty() {
        return Err(NormalizeError::NoValidRows);
    }

    debug!("Normalized {} of {} CSV rows", records.len(), total);
    Ok(records)
}

/// Pair every mapped column with its position in the header.
fn resolve_columns(headers: &StringRecord) -> Result<Vec<(ColumnSpec, usize)>, NormalizeError> {
    let mut resolved = Vec::with_capacity(COLUMN_MAP.len());
    let mut missing = Vec::new();

    for spec in COLUMN_MAP {
        match headers.iter().position(|h| h == spec.source) {
            Some(idx) => resolved.push((spec, idx)),
            None => missing.push(spec.source.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(NormalizeError::MissingColumns(missing));
    }
    Ok(resolved)
}

pub fn coerce_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Non-finite values count as missing.
pub fn coerce_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
