use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::env_parse;
use crate::errors::LlmError;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Configuration for LLM service
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 200,
            temperature: 0.0,
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("GROQ_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty());

        Self {
            // A configured key turns the feature on unless explicitly disabled.
            enabled: env_parse("LLM_ENABLED", api_key.is_some()),
            api_key,
            base_url: std::env::var("LLM_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("LLM_MODEL").unwrap_or(defaults.model),
            max_tokens: env_parse("LLM_MAX_TOKENS", defaults.max_tokens),
            temperature: env_parse("LLM_TEMPERATURE", defaults.temperature),
            timeout_secs: env_parse("LLM_TIMEOUT_SECS", defaults.timeout_secs),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!("LLM_TEMPERATURE must be within 0..=2, got {}", self.temperature));
        }
        if self.max_tokens == 0 {
            return Err("LLM_MAX_TOKENS must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Text in, text out. The only seam to the external model.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_completion(&self, prompt: String) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Serialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Any backend speaking the OpenAI chat-completions format (Groq, OpenAI, local gateways).
pub struct OpenAiCompatibleProvider {
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::NetworkError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }

    async fn call_with_retry(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let max_retries = 3;
        let mut retry_count = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.call(&request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    retry_count += 1;
                    if retry_count >= max_retries {
                        error!("LLM call failed after {} attempts: {}", max_retries, e);
                        return Err(e);
                    }

                    warn!("LLM call failed (attempt {}/{}): {}. Retrying in {:?}...",
                          retry_count, max_retries, e, delay);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    async fn call(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let response = self.client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError(format!("HTTP {}: {}", status, error_text)));
        }

        response.json::<ChatResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn generate_completion(&self, prompt: String) -> Result<String, LlmError> {
        info!("Generating LLM completion (model: {}, max_tokens: {})", self.model, self.max_tokens);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self.call_with_retry(request).await?;

        if let Some(usage) = &response.usage {
            info!("LLM completion generated. Tokens: {} prompt + {} completion = {} total",
                  usage.prompt_tokens, usage.completion_tokens, usage.total_tokens);
        }

        response.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))
    }
}

/// Holds the configured provider, if any.
pub struct LlmService {
    provider: Option<Arc<dyn LlmProvider>>,
}

impl LlmService {
    pub fn new(config: &LlmConfig) -> Self {
        if !config.enabled {
            info!("LLM features are disabled in configuration");
            return Self { provider: None };
        }

        let Some(api_key) = config.api_key.clone() else {
            warn!("LLM enabled but no API key configured. LLM features disabled.");
            return Self { provider: None };
        };

        match OpenAiCompatibleProvider::new(api_key, config) {
            Ok(provider) => {
                info!("Initializing LLM service ({} at {})", config.model, config.base_url);
                Self { provider: Some(Arc::new(provider)) }
            }
            Err(e) => {
                warn!("Failed to initialize LLM provider: {}. LLM features disabled.", e);
                Self { provider: None }
            }
        }
    }

    pub fn with_provider(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider: Some(provider) }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider(&self) -> Option<Arc<dyn LlmProvider>> {
        self.provider.clone()
    }

    pub async fn generate_completion(&self, prompt: String) -> Result<String, LlmError> {
        let provider = self.provider.as_ref().ok_or(LlmError::Disabled)?;
        provider.generate_completion(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn generate_completion(&self, prompt: String) -> Result<String, LlmError> {
            Ok(prompt)
        }
    }

    #[test]
    fn test_llm_config_default() {
        let config = LlmConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.temperature, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_temperature_rejected() {
        let config = LlmConfig { temperature: 3.5, ..LlmConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_llm_service_disabled_by_default() {
        let service = LlmService::new(&LlmConfig::default());
        assert!(!service.is_enabled());
    }

    #[test]
    fn test_enabled_without_key_stays_disabled() {
        let config = LlmConfig { enabled: true, ..LlmConfig::default() };
        assert!(!LlmService::new(&config).is_enabled());
    }

    #[tokio::test]
    async fn test_llm_service_returns_disabled_error() {
        let service = LlmService::new(&LlmConfig::default());
        let result = service.generate_completion("test".to_string()).await;
        assert!(matches!(result, Err(LlmError::Disabled)));
    }

    #[tokio::test]
    async fn test_service_delegates_to_provider() {
        let service = LlmService::with_provider(Arc::new(EchoProvider));
        assert!(service.is_enabled());
        assert_eq!(service.generate_completion("ping".to_string()).await.unwrap(), "ping");
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let config = LlmConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..LlmConfig::default()
        };
        let provider = OpenAiCompatibleProvider::new("key".to_string(), &config).unwrap();
        assert_eq!(provider.endpoint, "http://localhost:8080/v1/chat/completions");
    }
}
