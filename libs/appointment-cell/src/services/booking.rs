use std::sync::Arc;

use tracing::{debug, info, warn};

use shared_database::{Database, DatabaseError};
use shared_models::appointment::{Appointment, AppointmentDetails, AppointmentStatus, NewAppointment};
use shared_utils::state::AppState;

use crate::models::AppointmentError;
use crate::services::lifecycle::AppointmentLifecycleService;

/// Keeps slot occupancy and appointments consistent: a slot backs at most
/// one active appointment. Every read-check-write runs in one transaction.
pub struct AppointmentBookingService {
    db: Arc<dyn Database>,
    lifecycle_service: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: Arc::clone(&state.db),
            lifecycle_service: AppointmentLifecycleService::new(),
        }
    }

    pub async fn book_appointment(
        &self,
        patient_id: i64,
        doctor_id: i64,
        slot_id: i64,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking slot {} with doctor {} for patient {}", slot_id, doctor_id, patient_id);

        let appointment = self
            .try_book(patient_id, doctor_id, slot_id)
            .await
            .map_err(|e| on_contention(e, AppointmentError::SlotAlreadyBooked))?;

        info!("Appointment {} booked on slot {}", appointment.id, slot_id);
        Ok(appointment)
    }

    async fn try_book(
        &self,
        patient_id: i64,
        doctor_id: i64,
        slot_id: i64,
    ) -> Result<Appointment, AppointmentError> {
        let mut tx = self.db.begin().await?;

        let slot = tx
            .find_slot(slot_id)
            .await?
            .filter(|slot| slot.is_owned_by(doctor_id))
            .ok_or(AppointmentError::SlotNotFound)?;
        if slot.is_booked {
            return Err(AppointmentError::SlotAlreadyBooked);
        }

        // Lost a race since the read above
        if !tx.claim_slot(slot_id).await? {
            warn!("Slot {} was claimed concurrently", slot_id);
            return Err(AppointmentError::SlotAlreadyBooked);
        }

        let appointment = tx
            .insert_appointment(NewAppointment {
                patient_id,
                doctor_id,
                slot_id,
                status: AppointmentStatus::Pending,
            })
            .await?;
        tx.commit().await?;

        Ok(appointment)
    }

    /// Doctor confirms or cancels. Cancelling frees the slot in the same
    /// transaction as the status write.
    pub async fn update_status(
        &self,
        doctor_id: i64,
        appointment_id: i64,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Doctor {} setting appointment {} to {}", doctor_id, appointment_id, new_status);

        let mut tx = self.db.begin().await?;
        let appointment = tx
            .find_appointment(appointment_id)
            .await?
            .filter(|appointment| appointment.doctor_id == doctor_id)
            .ok_or(AppointmentError::NotFound)?;

        self.lifecycle_service
            .validate_status_transition(appointment.status, new_status)?;
        if appointment.status == new_status {
            return Ok(appointment);
        }

        let updated = tx
            .update_appointment(appointment_id, appointment.slot_id, new_status)
            .await?;
        if new_status == AppointmentStatus::Cancelled {
            tx.release_slot(appointment.slot_id).await?;
        }
        tx.commit().await?;

        info!("Appointment {} is now {}", appointment_id, new_status);
        Ok(updated)
    }

    /// Moves an active appointment onto another free slot of the same
    /// doctor and puts it back to PENDING.
    pub async fn reschedule_appointment(
        &self,
        doctor_id: i64,
        appointment_id: i64,
        new_slot_id: i64,
    ) -> Result<AppointmentDetails, AppointmentError> {
        info!("Rescheduling appointment {} to slot {}", appointment_id, new_slot_id);

        let details = self
            .try_reschedule(doctor_id, appointment_id, new_slot_id)
            .await
            .map_err(|e| on_contention(e, AppointmentError::NewSlotAlreadyBooked))?;

        info!("Appointment {} moved to slot {}", appointment_id, new_slot_id);
        Ok(details)
    }

    async fn try_reschedule(
        &self,
        doctor_id: i64,
        appointment_id: i64,
        new_slot_id: i64,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let mut tx = self.db.begin().await?;

        let appointment = tx
            .find_appointment(appointment_id)
            .await?
            .filter(|appointment| appointment.doctor_id == doctor_id)
            .ok_or(AppointmentError::NotFound)?;
        self.lifecycle_service.validate_reschedule(appointment.status)?;

        let new_slot = tx
            .find_slot(new_slot_id)
            .await?
            .filter(|slot| slot.is_owned_by(doctor_id))
            .ok_or(AppointmentError::NewSlotNotFound)?;
        // Also covers moving onto the appointment's own slot
        if new_slot.is_booked || !tx.claim_slot(new_slot_id).await? {
            return Err(AppointmentError::NewSlotAlreadyBooked);
        }

        tx.release_slot(appointment.slot_id).await?;
        let updated = tx
            .update_appointment(appointment_id, new_slot_id, AppointmentStatus::Pending)
            .await?;

        let slot = tx
            .find_slot(new_slot_id)
            .await?
            .ok_or(AppointmentError::NewSlotNotFound)?;
        let patient = tx
            .find_user_by_id(updated.patient_id)
            .await?
            .map(|user| user.profile());
        tx.commit().await?;

        Ok(AppointmentDetails {
            appointment: updated,
            slot,
            doctor: None,
            patient,
        })
    }

    pub async fn get_patient_appointments(
        &self,
        patient_id: i64,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let mut tx = self.db.begin().await?;
        let appointments = tx.list_appointments_for_patient(patient_id).await?;
        debug!("Patient {} has {} appointments", patient_id, appointments.len());
        Ok(appointments)
    }

    pub async fn get_doctor_appointments(
        &self,
        doctor_id: i64,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let mut tx = self.db.begin().await?;
        let appointments = tx.list_appointments_for_doctor(doctor_id).await?;
        debug!("Doctor {} has {} appointments", doctor_id, appointments.len());
        Ok(appointments)
    }
}

// A concurrent writer got there first
fn on_contention(err: AppointmentError, conflict: AppointmentError) -> AppointmentError {
    match err {
        AppointmentError::Database(
            DatabaseError::UniqueViolation(_) | DatabaseError::SerializationFailure(_),
        ) => {
            warn!("Transaction lost to a concurrent writer: {}", err);
            conflict
        }
        other => other,
    }
}
