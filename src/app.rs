use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{ask, consolidated, health, imports, prices, tickers};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/imports", imports::router())
        .nest("/api/tickers", tickers::router())
        .nest("/api/prices", prices::router())
        .nest("/api/consolidated", consolidated::router())
        .nest("/api/ask", ask::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
