use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use shared_models::appointment::{Appointment, AppointmentDetails, AppointmentStatus, NewAppointment};
use shared_models::auth::Role;
use shared_models::slot::{NewSlot, Slot};
use shared_models::user::{DoctorSummary, NewUser, User, UserProfile};

use crate::error::DatabaseError;
use crate::store::{Database, Transaction};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    slots: BTreeMap<i64, Slot>,
    appointments: BTreeMap<i64, Appointment>,
    last_user_id: i64,
    last_slot_id: i64,
    last_appointment_id: i64,
}

/// Row images taken before a transaction first touches each row. `None`
/// means the row did not exist.
#[derive(Debug, Default)]
struct UndoLog {
    users: BTreeMap<i64, Option<User>>,
    slots: BTreeMap<i64, Option<Slot>>,
    appointments: BTreeMap<i64, Option<Appointment>>,
    counters: Option<(i64, i64, i64)>,
}

impl UndoLog {
    fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.slots.is_empty()
            && self.appointments.is_empty()
            && self.counters.is_none()
    }

    fn rollback(self, tables: &mut Tables) {
        restore(&mut tables.users, self.users);
        restore(&mut tables.slots, self.slots);
        restore(&mut tables.appointments, self.appointments);
        if let Some((users, slots, appointments)) = self.counters {
            tables.last_user_id = users;
            tables.last_slot_id = slots;
            tables.last_appointment_id = appointments;
        }
    }
}

// Keeps only the first image of a row
fn remember<T: Clone>(log: &mut BTreeMap<i64, Option<T>>, table: &BTreeMap<i64, T>, id: i64) {
    log.entry(id).or_insert_with(|| table.get(&id).cloned());
}

fn restore<T>(table: &mut BTreeMap<i64, T>, log: BTreeMap<i64, Option<T>>) {
    for (id, before) in log {
        match before {
            Some(row) => {
                table.insert(id, row);
            }
            None => {
                table.remove(&id);
            }
        }
    }
}

/// Process-local store. Transactions are serialized by a single async
/// mutex and write in place; an undo log restores touched rows when a
/// transaction is dropped without committing.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn begin(&self) -> Result<Box<dyn Transaction>, DatabaseError> {
        let tables = Arc::clone(&self.tables).lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            tables,
            undo: UndoLog::default(),
        }))
    }
}

pub struct MemoryTransaction {
    tables: OwnedMutexGuard<Tables>,
    undo: UndoLog,
}

impl MemoryTransaction {
    fn save_counters(&mut self) {
        if self.undo.counters.is_none() {
            self.undo.counters = Some((
                self.tables.last_user_id,
                self.tables.last_slot_id,
                self.tables.last_appointment_id,
            ));
        }
    }

    fn slot_mut(&mut self, slot_id: i64) -> Result<&mut Slot, DatabaseError> {
        if !self.tables.slots.contains_key(&slot_id) {
            return Err(DatabaseError::RowNotFound(format!("time slot {}", slot_id)));
        }
        remember(&mut self.undo.slots, &self.tables.slots, slot_id);
        self.tables
            .slots
            .get_mut(&slot_id)
            .ok_or_else(|| DatabaseError::RowNotFound(format!("time slot {}", slot_id)))
    }

    fn profile(&self, user_id: i64) -> Option<UserProfile> {
        self.tables.users.get(&user_id).map(User::profile)
    }

    fn details<F>(&self, filter: F, with_doctor: bool) -> Result<Vec<AppointmentDetails>, DatabaseError>
    where
        F: Fn(&Appointment) -> bool,
    {
        let mut matching: Vec<&Appointment> =
            self.tables.appointments.values().filter(|a| filter(a)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        matching
            .into_iter()
            .map(|appointment| {
                let slot = self.tables.slots.get(&appointment.slot_id).cloned().ok_or_else(|| {
                    DatabaseError::RowNotFound(format!("time slot {}", appointment.slot_id))
                })?;
                let (doctor, patient) = if with_doctor {
                    (self.profile(appointment.doctor_id), None)
                } else {
                    (None, self.profile(appointment.patient_id))
                };
                Ok(AppointmentDetails {
                    appointment: appointment.clone(),
                    slot,
                    doctor,
                    patient,
                })
            })
            .collect()
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        let undo = std::mem::take(&mut self.undo);
        if !undo.is_empty() {
            debug!("Rolling back uncommitted in-memory transaction");
            undo.rollback(&mut self.tables);
        }
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn insert_user(&mut self, user: NewUser) -> Result<User, DatabaseError> {
        if self.tables.users.values().any(|existing| existing.email == user.email) {
            return Err(DatabaseError::UniqueViolation(format!(
                "email {} already exists",
                user.email
            )));
        }

        self.save_counters();
        self.tables.last_user_id += 1;
        let now = Utc::now();
        let record = User {
            id: self.tables.last_user_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        remember(&mut self.undo.users, &self.tables.users, record.id);
        self.tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_id(&mut self, user_id: i64) -> Result<Option<User>, DatabaseError> {
        Ok(self.tables.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self.tables.users.values().find(|user| user.email == email).cloned())
    }

    async fn list_doctors(&mut self) -> Result<Vec<DoctorSummary>, DatabaseError> {
        let mut doctors: Vec<DoctorSummary> = self
            .tables
            .users
            .values()
            .filter(|user| user.role == Role::Doctor)
            .map(|user| DoctorSummary {
                id: user.id,
                name: user.name.clone(),
            })
            .collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(doctors)
    }

    async fn insert_slot(&mut self, slot: NewSlot) -> Result<Slot, DatabaseError> {
        self.save_counters();
        self.tables.last_slot_id += 1;
        let now = Utc::now();
        let record = Slot {
            id: self.tables.last_slot_id,
            doctor_id: slot.doctor_id,
            start: slot.start,
            end: slot.end,
            is_booked: false,
            created_at: now,
            updated_at: now,
        };
        remember(&mut self.undo.slots, &self.tables.slots, record.id);
        self.tables.slots.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_slot(&mut self, slot_id: i64) -> Result<Option<Slot>, DatabaseError> {
        Ok(self.tables.slots.get(&slot_id).cloned())
    }

    async fn list_slots_for_doctor(&mut self, doctor_id: i64) -> Result<Vec<Slot>, DatabaseError> {
        let mut slots: Vec<Slot> = self
            .tables
            .slots
            .values()
            .filter(|slot| slot.doctor_id == doctor_id)
            .cloned()
            .collect();
        slots.sort_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
        Ok(slots)
    }

    async fn list_open_slots_for_doctor(
        &mut self,
        doctor_id: i64,
        from: DateTime<Utc>,
    ) -> Result<Vec<Slot>, DatabaseError> {
        let mut slots: Vec<Slot> = self
            .tables
            .slots
            .values()
            .filter(|slot| slot.doctor_id == doctor_id && !slot.is_booked && slot.start >= from)
            .cloned()
            .collect();
        slots.sort_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
        Ok(slots)
    }

    async fn update_slot_times(
        &mut self,
        slot_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Slot, DatabaseError> {
        let slot = self.slot_mut(slot_id)?;
        slot.start = start;
        slot.end = end;
        slot.updated_at = Utc::now();
        Ok(slot.clone())
    }

    async fn claim_slot(&mut self, slot_id: i64) -> Result<bool, DatabaseError> {
        let slot = self.slot_mut(slot_id)?;
        if slot.is_booked {
            return Ok(false);
        }
        slot.is_booked = true;
        slot.updated_at = Utc::now();
        Ok(true)
    }

    async fn release_slot(&mut self, slot_id: i64) -> Result<(), DatabaseError> {
        let slot = self.slot_mut(slot_id)?;
        slot.is_booked = false;
        slot.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_slot(&mut self, slot_id: i64) -> Result<(), DatabaseError> {
        if !self.tables.slots.contains_key(&slot_id) {
            return Err(DatabaseError::RowNotFound(format!("time slot {}", slot_id)));
        }

        let cascaded: Vec<i64> = self
            .tables
            .appointments
            .values()
            .filter(|appointment| appointment.slot_id == slot_id)
            .map(|appointment| appointment.id)
            .collect();
        for appointment_id in cascaded {
            remember(&mut self.undo.appointments, &self.tables.appointments, appointment_id);
            self.tables.appointments.remove(&appointment_id);
        }

        remember(&mut self.undo.slots, &self.tables.slots, slot_id);
        self.tables.slots.remove(&slot_id);
        Ok(())
    }

    async fn insert_appointment(
        &mut self,
        appointment: NewAppointment,
    ) -> Result<Appointment, DatabaseError> {
        if appointment.status.is_active()
            && self.tables.appointments.values().any(|existing| {
                existing.slot_id == appointment.slot_id && existing.status.is_active()
            })
        {
            return Err(DatabaseError::UniqueViolation(format!(
                "time slot {} already backs an active appointment",
                appointment.slot_id
            )));
        }

        self.save_counters();
        self.tables.last_appointment_id += 1;
        let now = Utc::now();
        let record = Appointment {
            id: self.tables.last_appointment_id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            slot_id: appointment.slot_id,
            status: appointment.status,
            created_at: now,
            updated_at: now,
        };
        remember(&mut self.undo.appointments, &self.tables.appointments, record.id);
        self.tables.appointments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_appointment(
        &mut self,
        appointment_id: i64,
    ) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self.tables.appointments.get(&appointment_id).cloned())
    }

    async fn update_appointment(
        &mut self,
        appointment_id: i64,
        slot_id: i64,
        status: AppointmentStatus,
    ) -> Result<Appointment, DatabaseError> {
        if !self.tables.appointments.contains_key(&appointment_id) {
            return Err(DatabaseError::RowNotFound(format!("appointment {}", appointment_id)));
        }
        remember(&mut self.undo.appointments, &self.tables.appointments, appointment_id);

        let appointment = self
            .tables
            .appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| DatabaseError::RowNotFound(format!("appointment {}", appointment_id)))?;
        appointment.slot_id = slot_id;
        appointment.status = status;
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    async fn count_active_appointments_for_slot(&mut self, slot_id: i64) -> Result<i64, DatabaseError> {
        let count = self
            .tables
            .appointments
            .values()
            .filter(|appointment| appointment.slot_id == slot_id && appointment.status.is_active())
            .count();
        Ok(count as i64)
    }

    async fn list_appointments_for_patient(
        &mut self,
        patient_id: i64,
    ) -> Result<Vec<AppointmentDetails>, DatabaseError> {
        self.details(|appointment| appointment.patient_id == patient_id, true)
    }

    async fn list_appointments_for_doctor(
        &mut self,
        doctor_id: i64,
    ) -> Result<Vec<AppointmentDetails>, DatabaseError> {
        self.details(|appointment| appointment.doctor_id == doctor_id, false)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), DatabaseError> {
        self.undo = UndoLog::default();
        debug!("In-memory transaction committed");
        Ok(())
    }
}
