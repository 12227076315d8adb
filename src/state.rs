use std::path::PathBuf;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::services::intent_service::IntentResolver;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub resolver: Arc<dyn IntentResolver>,
    pub csv_folder: PathBuf,
    pub batch_size: usize,
}
