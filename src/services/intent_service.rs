//! Free text → [`ResolvedQuery`].
//!
//! Two resolvers share the [`IntentResolver`] seam: [`LlmIntentResolver`]
//! asks a chat model for a JSON answer, [`RuleBasedResolver`] matches
//! keywords offline. Neither ever fails; problems come back as
//! `Intent::Unknown` with `error` set.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::{Intent, ResolvedQuery};
use crate::services::llm_service::LlmProvider;

#[async_trait]
pub trait IntentResolver: Send + Sync {
    async fn resolve(&self, text: &str) -> ResolvedQuery;
}

/// January 1st through December 31st of `year`.
pub fn expand_year(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

/// First and last calendar day of `month` in `year`.
pub fn expand_month(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// Turn the model's raw date strings into a range, snapping month answers to
/// the real last day of the month.
///
/// Snapping applies when `start` is the 1st and `end` lands later in the same
/// month, or when `end` is an impossible day of that month (e.g. `2020-02-30`).
/// Multi-month and year ranges pass through unchanged.
pub fn adjust_month_range(
    start: Option<&str>,
    end: Option<&str>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let start = start.and_then(parse_iso_date);
    let end_raw = end.map(str::trim).filter(|s| !s.is_empty());
    let end_parsed = end_raw.and_then(parse_iso_date);

    let Some(start_date) = start else {
        return (None, end_parsed);
    };
    let Some(end_raw) = end_raw else {
        return (start, None);
    };

    let month_end = expand_month(start_date.year(), start_date.month()).map(|(_, last)| last);

    match end_parsed {
        Some(end_date)
            if start_date.day() == 1
                && end_date != start_date
                && end_date.year() == start_date.year()
                && end_date.month() == start_date.month() =>
        {
            (start, month_end)
        }
        Some(end_date) => (start, Some(end_date)),
        None if end_raw.starts_with(&start_date.format("%Y-%m-").to_string()) => (start, month_end),
        None => (start, None),
    }
}

fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn normalize_ticker(raw: Option<String>) -> Option<String> {
    raw.map(|t| t.trim().trim_start_matches('$').to_uppercase())
        .filter(|t| !t.is_empty())
}

pub fn build_prompt(text: &str) -> String {
    format!(
        r#"You are a natural-language parser for stock price questions.

Answer ONLY with valid JSON, no extra text.
The JSON must contain exactly the fields: intent, ticker, start_date, end_date.

Allowed values for "intent":
- "highest_volume"
- "lowest_closing_price"
- "consolidated_metrics"

Use null for any field the question does not mention. Dates use YYYY-MM-DD.

Special rules:
- If the question mentions only a year (e.g. "in 2019"), set
    start_date = "YYYY-01-01"
    end_date   = "YYYY-12-31"
- If the question mentions a month and a year (e.g. "in March 2020" or "em março de 2020"), set
    start_date = "YYYY-MM-01"
    end_date   = the last day of that month

Valid example:
{{
  "intent": "highest_volume",
  "ticker": "AAPL",
  "start_date": "2019-01-01",
  "end_date": "2019-12-31"
}}

Question: "{text}"
"#
    )
}

#[derive(Debug, Deserialize)]
struct IntentPayload {
    intent: Option<String>,
    ticker: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

/// Decode a model answer. Tolerates markdown fences and chatter around the JSON object.
pub fn parse_llm_response(content: &str) -> Result<ResolvedQuery, String> {
    let trimmed = content.trim();
    let json = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(open), Some(close)) if open < close => &trimmed[open..=close],
        _ => return Err("response contains no JSON object".to_string()),
    };

    let payload: IntentPayload =
        serde_json::from_str(json).map_err(|e| format!("invalid JSON from model: {}", e))?;

    let (start_date, end_date) =
        adjust_month_range(payload.start_date.as_deref(), payload.end_date.as_deref());

    Ok(ResolvedQuery {
        intent: payload.intent.as_deref().map(Intent::from_label).unwrap_or(Intent::Unknown),
        ticker: normalize_ticker(payload.ticker),
        start_date,
        end_date,
        raw: Some(content.to_string()),
        error: None,
    })
}

pub struct LlmIntentResolver {
    provider: Arc<dyn LlmProvider>,
}

impl LlmIntentResolver {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl IntentResolver for LlmIntentResolver {
    async fn resolve(&self, text: &str) -> ResolvedQuery {
        let content = match self.provider.generate_completion(build_prompt(text)).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Intent resolution failed, falling back to unknown: {}", e);
                return ResolvedQuery::unknown(text, e.to_string());
            }
        };

        match parse_llm_response(&content) {
            Ok(query) => {
                info!("Resolved question to {:?} (ticker: {:?})", query.intent, query.ticker);
                query
            }
            Err(e) => {
                warn!("Could not parse model answer: {}", e);
                ResolvedQuery::unknown(content, e)
            }
        }
    }
}

const MONTHS: [(&str, u32); 30] = [
    ("janeiro", 1), ("january", 1), ("jan", 1),
    ("fevereiro", 2), ("february", 2), ("feb", 2),
    ("março", 3), ("marco", 3), ("march", 3),
    ("abril", 4), ("april", 4), ("apr", 4),
    ("maio", 5), ("may", 5),
    ("junho", 6), ("june", 6),
    ("julho", 7), ("july", 7),
    ("agosto", 8), ("august", 8),
    ("setembro", 9), ("september", 9),
    ("outubro", 10), ("october", 10),
    ("novembro", 11), ("november", 11),
    ("dezembro", 12), ("december", 12),
    ("dez", 12), ("dec", 12),
];

const TICKER_STOP_WORDS: [&str; 22] = [
    "A", "E", "I", "O", "OS", "AS", "DA", "DE", "DO", "EM", "NA", "NO",
    "THE", "OF", "IN", "ON", "AND", "FOR", "WHAT", "USD", "BRL", "ETF",
];

const HIGHEST_WORDS: [&str; 8] = ["highest", "maior", "mais alto", "máximo", "maximo", "biggest", "largest", "peak"];
const LOWEST_WORDS: [&str; 6] = ["lowest", "menor", "mais baixo", "mínimo", "minimo", "smallest"];
const CLOSE_WORDS: [&str; 2] = ["clos", "fech"];
const CONSOLIDATED_WORDS: [&str; 9] = [
    "consolidat", "consolidad", "summary", "resumo", "average", "média", "media", "metrics", "métricas",
];

fn contains_any(haystack: &str, words: &[&str]) -> bool {
    words.iter().any(|w| haystack.contains(w))
}

fn month_year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let names = MONTHS.iter().map(|(name, _)| *name).collect::<Vec<_>>().join("|");
        Regex::new(&format!(r"(?i)\b({names})\b\s*(?:de\s+|of\s+|,\s*)?((?:19|20)\d{{2}})\b"))
            .expect("month regex is valid")
    })
}

fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("year regex is valid"))
}

fn iso_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("date regex is valid"))
}

fn ticker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // AAPL, PETR4, VALE3, BRK.B, BRK-B
    RE.get_or_init(|| {
        Regex::new(r"\$?\b([A-Z]{1,5}\d{0,2}(?:[.-][A-Z]{1,2})?)\b").expect("ticker regex is valid")
    })
}

/// Deterministic keyword resolver (English and Portuguese). Used when no model
/// is configured.
#[derive(Debug, Default, Clone)]
pub struct RuleBasedResolver;

impl RuleBasedResolver {
    pub fn new() -> Self {
        Self
    }

    fn detect_intent(lower: &str) -> Intent {
        if lower.contains("volume") && contains_any(lower, &HIGHEST_WORDS) {
            Intent::HighestVolume
        } else if contains_any(lower, &CLOSE_WORDS) && contains_any(lower, &LOWEST_WORDS) {
            Intent::LowestClosingPrice
        } else if contains_any(lower, &CONSOLIDATED_WORDS) {
            Intent::ConsolidatedMetrics
        } else {
            Intent::Unknown
        }
    }

    fn detect_ticker(text: &str) -> Option<String> {
        ticker_regex()
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .find(|t| !TICKER_STOP_WORDS.contains(t))
            .map(str::to_string)
    }

    fn detect_range(text: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
        let mut explicit: Vec<NaiveDate> = iso_date_regex()
            .find_iter(text)
            .filter_map(|m| parse_iso_date(m.as_str()))
            .collect();
        match explicit.len() {
            0 => {}
            1 => return (Some(explicit[0]), Some(explicit[0])),
            _ => {
                explicit.truncate(2);
                explicit.sort();
                return (Some(explicit[0]), Some(explicit[1]));
            }
        }

        if let Some(caps) = month_year_regex().captures(text) {
            let name = caps[1].to_lowercase();
            let month = MONTHS.iter().find(|(n, _)| *n == name).map(|(_, m)| *m);
            let year = caps[2].parse::<i32>().ok();
            if let Some((first, last)) = month.zip(year).and_then(|(m, y)| expand_month(y, m)) {
                return (Some(first), Some(last));
            }
        }

        if let Some(year) = year_regex()
            .captures(text)
            .and_then(|c| c[1].parse::<i32>().ok())
        {
            if let Some((first, last)) = expand_year(year) {
                return (Some(first), Some(last));
            }
        }

        (None, None)
    }
}

#[async_trait]
impl IntentResolver for RuleBasedResolver {
    async fn resolve(&self, text: &str) -> ResolvedQuery {
        let lower = text.to_lowercase();
        let intent = Self::detect_intent(&lower);
        let (start_date, end_date) = Self::detect_range(text);

        ResolvedQuery {
            intent,
            ticker: Self::detect_ticker(text),
            start_date,
            end_date,
            raw: Some(text.to_string()),
            error: (intent == Intent::Unknown)
                .then(|| "no supported intent recognised".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LlmError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct StubProvider(Result<&'static str, ()>);

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn generate_completion(&self, _prompt: String) -> Result<String, LlmError> {
            match self.0 {
                Ok(answer) => Ok(answer.to_string()),
                Err(()) => Err(LlmError::Timeout),
            }
        }
    }

    fn llm(answer: Result<&'static str, ()>) -> LlmIntentResolver {
        LlmIntentResolver::new(Arc::new(StubProvider(answer)))
    }

    #[test]
    fn test_expand_month_handles_leap_years() {
        assert_eq!(expand_month(2020, 2), Some((date(2020, 2, 1), date(2020, 2, 29))));
        assert_eq!(expand_month(2021, 2), Some((date(2021, 2, 1), date(2021, 2, 28))));
        assert_eq!(expand_month(2020, 12), Some((date(2020, 12, 1), date(2020, 12, 31))));
        assert_eq!(expand_month(2020, 13), None);
    }

    #[test]
    fn test_expand_year() {
        assert_eq!(expand_year(2019), Some((date(2019, 1, 1), date(2019, 12, 31))));
    }

    #[test]
    fn test_adjust_month_range() {
        assert_eq!(
            adjust_month_range(Some("2020-03-01"), Some("2020-03-30")),
            (Some(date(2020, 3, 1)), Some(date(2020, 3, 31)))
        );
        assert_eq!(
            adjust_month_range(Some("2020-02-01"), Some("2020-02-30")),
            (Some(date(2020, 2, 1)), Some(date(2020, 2, 29)))
        );
        assert_eq!(
            adjust_month_range(Some("2019-01-01"), Some("2019-12-31")),
            (Some(date(2019, 1, 1)), Some(date(2019, 12, 31)))
        );
        assert_eq!(
            adjust_month_range(Some("2020-03-10"), Some("2020-03-20")),
            (Some(date(2020, 3, 10)), Some(date(2020, 3, 20)))
        );
        assert_eq!(adjust_month_range(None, Some("2020-05-05")), (None, Some(date(2020, 5, 5))));
        assert_eq!(adjust_month_range(Some("garbage"), None), (None, None));
    }

    #[test]
    fn test_parse_llm_response_with_fences() {
        let content = "```json\n{\"intent\": \"lowest_closing_price\", \"ticker\": \"msft\", \"start_date\": null, \"end_date\": null}\n```";
        let query = parse_llm_response(content).unwrap();

        assert_eq!(query.intent, Intent::LowestClosingPrice);
        assert_eq!(query.ticker.as_deref(), Some("MSFT"));
        assert_eq!(query.start_date, None);
        assert!(query.error.is_none());
    }

    #[test]
    fn test_parse_llm_response_rejects_prose() {
        assert!(parse_llm_response("I cannot help with that.").is_err());
        assert!(parse_llm_response("{not json}").is_err());
    }

    #[tokio::test]
    async fn test_llm_resolver_snaps_month_end() {
        let resolver = llm(Ok(
            r#"{"intent": "highest_volume", "ticker": "AAPL", "start_date": "2020-03-01", "end_date": "2020-03-30"}"#,
        ));
        let query = resolver.resolve("volume mais alto da AAPL em março de 2020").await;

        assert_eq!(query.intent, Intent::HighestVolume);
        assert_eq!(query.ticker.as_deref(), Some("AAPL"));
        assert_eq!(query.start_date, Some(date(2020, 3, 1)));
        assert_eq!(query.end_date, Some(date(2020, 3, 31)));
    }

    #[tokio::test]
    async fn test_llm_resolver_provider_failure_is_unknown() {
        let query = llm(Err(())).resolve("anything").await;
        assert_eq!(query.intent, Intent::Unknown);
        assert!(query.error.is_some());
    }

    #[tokio::test]
    async fn test_llm_resolver_garbage_answer_is_unknown() {
        let query = llm(Ok("sure! the answer is AAPL")).resolve("anything").await;
        assert_eq!(query.intent, Intent::Unknown);
        assert_eq!(query.raw.as_deref(), Some("sure! the answer is AAPL"));
        assert!(query.error.is_some());
    }

    #[tokio::test]
    async fn test_llm_resolver_unlisted_intent_is_unknown() {
        let query = llm(Ok(r#"{"intent": "buy", "ticker": null, "start_date": null, "end_date": null}"#))
            .resolve("should I buy?")
            .await;
        assert_eq!(query.intent, Intent::Unknown);
        assert!(query.ticker.is_none());
    }

    #[tokio::test]
    async fn test_rule_based_portuguese_month() {
        let query = RuleBasedResolver::new()
            .resolve("volume mais alto da AAPL em março de 2020")
            .await;

        assert_eq!(query.intent, Intent::HighestVolume);
        assert_eq!(query.ticker.as_deref(), Some("AAPL"));
        assert_eq!(query.start_date, Some(date(2020, 3, 1)));
        assert_eq!(query.end_date, Some(date(2020, 3, 31)));
    }

    #[tokio::test]
    async fn test_rule_based_english_year() {
        let query = RuleBasedResolver::new()
            .resolve("What was the lowest closing price of MSFT in 2019?")
            .await;

        assert_eq!(query.intent, Intent::LowestClosingPrice);
        assert_eq!(query.ticker.as_deref(), Some("MSFT"));
        assert_eq!(query.start_date, Some(date(2019, 1, 1)));
        assert_eq!(query.end_date, Some(date(2019, 12, 31)));
    }

    #[tokio::test]
    async fn test_rule_based_leap_february() {
        let query = RuleBasedResolver::new()
            .resolve("consolidated metrics for PETR in February 2024")
            .await;

        assert_eq!(query.intent, Intent::ConsolidatedMetrics);
        assert_eq!(query.start_date, Some(date(2024, 2, 1)));
        assert_eq!(query.end_date, Some(date(2024, 2, 29)));
    }

    #[tokio::test]
    async fn test_rule_based_explicit_dates() {
        let query = RuleBasedResolver::new()
            .resolve("average for TSLA between 2021-06-30 and 2021-01-01")
            .await;

        assert_eq!(query.start_date, Some(date(2021, 1, 1)));
        assert_eq!(query.end_date, Some(date(2021, 6, 30)));
    }

    #[tokio::test]
    async fn test_rule_based_tickers_with_digits_and_class_suffix() {
        let resolver = RuleBasedResolver::new();

        let query = resolver.resolve("volume mais alto da PETR4 em março de 2020").await;
        assert_eq!(query.ticker.as_deref(), Some("PETR4"));
        assert_eq!(query.start_date, Some(date(2020, 3, 1)));

        let query = resolver.resolve("menor fechamento de VALE3 em 2021").await;
        assert_eq!(query.ticker.as_deref(), Some("VALE3"));

        let query = resolver.resolve("summary for BRK.B in 2022").await;
        assert_eq!(query.ticker.as_deref(), Some("BRK.B"));

        let query = resolver.resolve("summary for $BRK-B in 2022").await;
        assert_eq!(query.ticker.as_deref(), Some("BRK-B"));
    }

    #[tokio::test]
    async fn test_rule_based_single_date_is_one_day() {
        let query = RuleBasedResolver::new()
            .resolve("qual o volume mais alto da AAPL no dia 2020-03-15?")
            .await;

        assert_eq!(query.ticker.as_deref(), Some("AAPL"));
        assert_eq!(query.start_date, Some(date(2020, 3, 15)));
        assert_eq!(query.end_date, Some(date(2020, 3, 15)));
    }

    #[tokio::test]
    async fn test_rule_based_unknown() {
        let query = RuleBasedResolver::new().resolve("tell me a joke").await;
        assert_eq!(query.intent, Intent::Unknown);
        assert!(query.ticker.is_none());
        assert!(query.error.is_some());
    }
}
