use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::DatabaseError;
use shared_models::error::AppError;

// ==============================================================================
// SLOT REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSlotRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSlotRequest {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub is_booked: Option<bool>,
}

pub fn validate_time_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), SlotError> {
    if end <= start {
        return Err(SlotError::InvalidTimeRange);
    }
    Ok(())
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum SlotError {
    #[error("Slot not found")]
    NotFound,

    #[error("end must be after start")]
    InvalidTimeRange,

    #[error("Slot occupancy is managed through appointments")]
    OccupancyManaged,

    #[error("Slot is booked by an active appointment")]
    HasActiveAppointment,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<SlotError> for AppError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::NotFound => AppError::NotFound(err.to_string()),
            SlotError::InvalidTimeRange => AppError::ValidationError(err.to_string()),
            SlotError::OccupancyManaged | SlotError::HasActiveAppointment => {
                AppError::Conflict(err.to_string())
            }
            SlotError::Database(db) => db.into(),
        }
    }
}
