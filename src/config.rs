use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::services::llm_service::LlmConfig;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/pricebook.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_CSV_FOLDER: &str = "./stocks";
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: String,
    pub csv_folder: PathBuf,
    pub batch_size: usize,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 5),
            bind_addr: std::env::var("BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            csv_folder: std::env::var("CSV_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CSV_FOLDER)),
            batch_size: env_parse("BATCH_SIZE", DEFAULT_BATCH_SIZE),
            llm: LlmConfig::from_env(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("BATCH_SIZE must be at least 1".to_string());
        }
        if self.db_max_connections == 0 {
            return Err("DB_MAX_CONNECTIONS must be at least 1".to_string());
        }
        SocketAddr::from_str(&self.bind_addr)
            .map_err(|e| format!("BIND_ADDR '{}' is not a socket address: {}", self.bind_addr, e))?;
        self.llm.validate()
    }
}

/// Read `key` from the environment, falling back to `default` when it is
/// unset or unparseable.
pub(crate) fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring invalid value for {}: '{}'", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}
