use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::Database;

/// Shared handler state: configuration plus the store handle.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<dyn Database>,
}

impl AppState {
    pub fn new(config: AppConfig, db: Arc<dyn Database>) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            db,
        })
    }
}
