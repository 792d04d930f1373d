use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::DatabaseError;
use shared_models::appointment::AppointmentStatus;
use shared_models::error::AppError;

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookAppointmentRequest {
    pub doctor_id: i64,
    pub slot_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RescheduleAppointmentRequest {
    pub new_slot_id: i64,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Slot not found")]
    SlotNotFound,

    #[error("New slot not found")]
    NewSlotNotFound,

    #[error("Slot already booked")]
    SlotAlreadyBooked,

    #[error("New slot already booked")]
    NewSlotAlreadyBooked,

    #[error("status must be CONFIRMED or CANCELLED, got {0}")]
    UnsupportedStatus(AppointmentStatus),

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::SlotNotFound
            | AppointmentError::NewSlotNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::SlotAlreadyBooked
            | AppointmentError::NewSlotAlreadyBooked
            | AppointmentError::InvalidStatusTransition(_) => AppError::Conflict(err.to_string()),
            AppointmentError::UnsupportedStatus(_) => AppError::ValidationError(err.to_string()),
            AppointmentError::Database(db) => db.into(),
        }
    }
}
