use tracing::{debug, warn};

use shared_models::appointment::AppointmentStatus;

use crate::models::AppointmentError;

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a doctor-initiated status change is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !matches!(new_status, AppointmentStatus::Confirmed | AppointmentStatus::Cancelled) {
            return Err(AppointmentError::UnsupportedStatus(new_status));
        }

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition(current_status));
        }

        Ok(())
    }

    /// Statuses a doctor may move an appointment to. Re-confirming is a no-op.
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending | AppointmentStatus::Confirmed => {
                vec![AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
            }
            // Terminal
            AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Only active appointments may be moved to another slot
    pub fn validate_reschedule(&self, current_status: AppointmentStatus) -> Result<(), AppointmentError> {
        if current_status.is_active() {
            Ok(())
        } else {
            Err(AppointmentError::InvalidStatusTransition(current_status))
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
