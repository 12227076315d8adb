use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::AppError;
use crate::models::{DateRange, Intent, PriceFilter, ResolvedQuery};
use crate::services::intent_service::IntentResolver;
use crate::services::price_service::{
    self, ConsolidatedResponse, HighestVolumeResponse, LowestClosingResponse, SummaryResponse,
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Answer {
    HighestVolume(HighestVolumeResponse),
    LowestClosingPrice(LowestClosingResponse),
    Summary(SummaryResponse),
    Table(ConsolidatedResponse),
    Unsupported { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub query: ResolvedQuery,
    pub answer: Answer,
}

/// Resolve `question` and run the matching query.
///
/// Storage errors propagate; "no data" outcomes and unusable questions come
/// back as an `Unsupported` answer so the caller always sees what was understood.
pub async fn answer_question(
    pool: &SqlitePool,
    resolver: &dyn IntentResolver,
    question: &str,
) -> Result<AskResponse, AppError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("question must not be empty".to_string()));
    }

    let query = resolver.resolve(question).await;
    info!("Answering {:?} for ticker {:?}", query.intent, query.ticker);

    let range = DateRange::new(query.start_date, query.end_date);
    let ticker = query.ticker.as_deref();

    let outcome = match (query.intent, ticker) {
        (Intent::HighestVolume, Some(t)) => price_service::highest_volume(pool, t, &range)
            .await
            .map(Answer::HighestVolume),
        (Intent::LowestClosingPrice, Some(t)) => price_service::lowest_closing(pool, t, &range)
            .await
            .map(Answer::LowestClosingPrice),
        (Intent::ConsolidatedMetrics, Some(t)) => {
            let filter = PriceFilter { range, ..Default::default() };
            price_service::consolidated_summary(pool, t, &filter)
                .await
                .map(Answer::Summary)
        }
        (Intent::ConsolidatedMetrics, None) => price_service::consolidated_table(pool, None, &range)
            .await
            .map(Answer::Table),
        (Intent::Unknown, _) => Ok(Answer::Unsupported {
            message: query.error.clone()
                .unwrap_or_else(|| "question not understood".to_string()),
        }),
        (_, None) => Ok(Answer::Unsupported {
            message: "a ticker is required for this question".to_string(),
        }),
    };

    let answer = match outcome {
        Ok(answer) => answer,
        Err(AppError::NotFound(message)) => Answer::Unsupported { message },
        Err(e) => return Err(e),
    };

    Ok(AskResponse { query, answer })
}
