pub mod app;
pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::services::intent_service::{IntentResolver, LlmIntentResolver, RuleBasedResolver};
use crate::services::llm_service::LlmService;

/// Pick the model-backed resolver when an LLM is configured, the keyword one otherwise.
pub fn build_resolver(config: &AppConfig) -> Arc<dyn IntentResolver> {
    match LlmService::new(&config.llm).provider() {
        Some(provider) => {
            info!("Using LLM intent resolver ({})", config.llm.model);
            Arc::new(LlmIntentResolver::new(provider))
        }
        None => {
            info!("Using rule-based intent resolver");
            Arc::new(RuleBasedResolver::new())
        }
    }
}
