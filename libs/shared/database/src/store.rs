use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shared_models::appointment::{Appointment, AppointmentDetails, AppointmentStatus, NewAppointment};
use shared_models::slot::{NewSlot, Slot};
use shared_models::user::{DoctorSummary, NewUser, User};

use crate::error::DatabaseError;

/// Handle to the shared store. Every read and write goes through a
/// [`Transaction`] so multi-record updates are all-or-nothing.
#[async_trait]
pub trait Database: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>, DatabaseError>;
}

/// A unit of work against the store. Writes become visible to other
/// transactions only after [`Transaction::commit`]; dropping the value
/// discards them.
#[async_trait]
pub trait Transaction: Send {
    // Users
    async fn insert_user(&mut self, user: NewUser) -> Result<User, DatabaseError>;
    async fn find_user_by_id(&mut self, user_id: i64) -> Result<Option<User>, DatabaseError>;
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, DatabaseError>;
    async fn list_doctors(&mut self) -> Result<Vec<DoctorSummary>, DatabaseError>;

    // Slots
    async fn insert_slot(&mut self, slot: NewSlot) -> Result<Slot, DatabaseError>;
    async fn find_slot(&mut self, slot_id: i64) -> Result<Option<Slot>, DatabaseError>;
    async fn list_slots_for_doctor(&mut self, doctor_id: i64) -> Result<Vec<Slot>, DatabaseError>;
    async fn list_open_slots_for_doctor(
        &mut self,
        doctor_id: i64,
        from: DateTime<Utc>,
    ) -> Result<Vec<Slot>, DatabaseError>;
    async fn update_slot_times(
        &mut self,
        slot_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Slot, DatabaseError>;
    /// Sets the occupancy flag only if it is currently clear. Returns
    /// whether this call took the slot.
    async fn claim_slot(&mut self, slot_id: i64) -> Result<bool, DatabaseError>;
    async fn release_slot(&mut self, slot_id: i64) -> Result<(), DatabaseError>;
    /// Removes the slot together with any appointments that reference it.
    async fn delete_slot(&mut self, slot_id: i64) -> Result<(), DatabaseError>;

    // Appointments
    async fn insert_appointment(
        &mut self,
        appointment: NewAppointment,
    ) -> Result<Appointment, DatabaseError>;
    async fn find_appointment(
        &mut self,
        appointment_id: i64,
    ) -> Result<Option<Appointment>, DatabaseError>;
    async fn update_appointment(
        &mut self,
        appointment_id: i64,
        slot_id: i64,
        status: AppointmentStatus,
    ) -> Result<Appointment, DatabaseError>;
    async fn count_active_appointments_for_slot(&mut self, slot_id: i64) -> Result<i64, DatabaseError>;
    async fn list_appointments_for_patient(
        &mut self,
        patient_id: i64,
    ) -> Result<Vec<AppointmentDetails>, DatabaseError>;
    async fn list_appointments_for_doctor(
        &mut self,
        doctor_id: i64,
    ) -> Result<Vec<AppointmentDetails>, DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;
}
