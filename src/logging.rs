use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::env_parse;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub loki_enabled: bool,
    pub loki_url: Option<String>,
    pub service_name: String,
    pub environment: String,
    pub log_level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            loki_enabled: env_parse("LOKI_ENABLED", false),
            loki_url: std::env::var("LOKI_URL").ok(),
            service_name: std::env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "pricebook".to_string()),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            log_level: std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,sqlx=warn".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.loki_enabled && self.loki_url.is_none() {
            return Err("LOKI_ENABLED is true but LOKI_URL is not set".to_string());
        }
        Ok(())
    }
}

/// Install the global subscriber. Call once, before anything logs.
///
/// Console output is always on; the Loki layer joins the same stack when the
/// `loki` feature is built and `LOKI_ENABLED` is set.
pub fn init_logging(config: LoggingConfig) -> anyhow::Result<()> {
    config.validate().map_err(anyhow::Error::msg)?;

    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer());

    #[cfg(feature = "loki")]
    let subscriber = subscriber.with(loki_layer(&config)?);

    subscriber.try_init()?;

    tracing::info!(
        "Logging initialized for {} ({}), level {}, loki {}",
        config.service_name,
        config.environment,
        config.log_level,
        config.loki_url.as_deref().filter(|_| config.loki_enabled).unwrap_or("off")
    );
    Ok(())
}

/// `None` unless Loki shipping is switched on.
#[cfg(feature = "loki")]
fn loki_layer(config: &LoggingConfig) -> anyhow::Result<Option<tracing_loki::Layer>> {
    let Some(loki_url) = config.loki_url.as_deref().filter(|_| config.loki_enabled) else {
        return Ok(None);
    };

    let (layer, task) = tracing_loki::builder()
        .label("service", &config.service_name)?
        .label("environment", &config.environment)?
        .build_url(url::Url::parse(loki_url)?)?;

    // Background task that pushes batched events to Loki.
    tokio::spawn(task);
    Ok(Some(layer))
}
