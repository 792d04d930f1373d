use std::sync::Arc;

use tracing::debug;

use shared_database::{Database, DatabaseError};
use shared_models::user::DoctorSummary;
use shared_utils::state::AppState;

pub struct DoctorService {
    db: Arc<dyn Database>,
}

impl DoctorService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: Arc::clone(&state.db),
        }
    }

    /// Every registered doctor, ordered by name.
    pub async fn list_doctors(&self) -> Result<Vec<DoctorSummary>, DatabaseError> {
        let mut tx = self.db.begin().await?;
        let doctors = tx.list_doctors().await?;
        debug!("Found {} doctors", doctors.len());
        Ok(doctors)
    }
}
