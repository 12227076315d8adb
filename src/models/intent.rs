use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Query types the natural-language layer can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    HighestVolume,
    LowestClosingPrice,
    ConsolidatedMetrics,
    Unknown,
}

impl Intent {
    /// Lenient parse of a label produced by a resolver. Anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "highest_volume" => Intent::HighestVolume,
            "lowest_closing_price" => Intent::LowestClosingPrice,
            "consolidated_metrics" => Intent::ConsolidatedMetrics,
            _ => Intent::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQuery {
    pub intent: Intent,
    pub ticker: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Resolver output as received, kept for debugging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolvedQuery {
    pub fn unknown(raw: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            intent: Intent::Unknown,
            ticker: None,
            start_date: None,
            end_date: None,
            raw: Some(raw.into()),
            error: Some(error.into()),
        }
    }
}
