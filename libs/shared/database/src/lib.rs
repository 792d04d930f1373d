pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

use std::sync::Arc;

use tracing::{info, warn};

use shared_config::AppConfig;

pub use error::DatabaseError;
pub use memory::MemoryDatabase;
pub use postgres::PostgresDatabase;
pub use store::{Database, Transaction};

/// Opens the store selected by the configuration: Postgres when
/// `DATABASE_URL` is set, otherwise a process-local in-memory store.
pub async fn connect(config: &AppConfig) -> Result<Arc<dyn Database>, DatabaseError> {
    if config.uses_persistent_store() {
        let database = PostgresDatabase::connect(&config.database_url).await?;
        database.migrate().await?;
        info!("Connected to Postgres store");
        Ok(Arc::new(database))
    } else {
        warn!("Using in-memory store; data is lost on restart");
        Ok(Arc::new(MemoryDatabase::new()))
    }
}
