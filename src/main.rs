use anyhow::Context;
use tokio::net::TcpListener;

use pricebook_backend::config::AppConfig;
use pricebook_backend::logging::{init_logging, LoggingConfig};
use pricebook_backend::state::AppState;
use pricebook_backend::{app, build_resolver, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())?;

    let config = AppConfig::from_env();
    config.validate().map_err(anyhow::Error::msg)?;

    let pool = db::connect(&config.database_url, config.db_max_connections)
        .await
        .with_context(|| format!("failed to open store at {}", config.database_url))?;

    let state = AppState {
        pool,
        resolver: build_resolver(&config),
        csv_folder: config.csv_folder.clone(),
        batch_size: config.batch_size,
    };
    let app = app::create_app(state);

    let listener = TcpListener::bind(&config.bind_addr).await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("Pricebook backend running at http://{}/", config.bind_addr);
    if !config.csv_folder.is_dir() {
        tracing::warn!("CSV folder {} does not exist; directory imports will fail", config.csv_folder.display());
    }

    axum::serve(listener, app).await?;
    Ok(())
}
