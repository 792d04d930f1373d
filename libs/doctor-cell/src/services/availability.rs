use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use shared_database::Database;
use shared_models::slot::{NewSlot, Slot};
use shared_utils::state::AppState;

use crate::models::{validate_time_range, CreateSlotRequest, SlotError, UpdateSlotRequest};

/// Slot CRUD scoped to the owning doctor. Occupancy changes belong to the
/// booking coordinator in the appointment cell.
pub struct AvailabilityService {
    db: Arc<dyn Database>,
}

impl AvailabilityService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: Arc::clone(&state.db),
        }
    }

    pub async fn create_slot(
        &self,
        doctor_id: i64,
        request: CreateSlotRequest,
    ) -> Result<Slot, SlotError> {
        debug!("Creating slot for doctor {}: {} - {}", doctor_id, request.start, request.end);
        validate_time_range(request.start, request.end)?;

        let mut tx = self.db.begin().await?;
        let slot = tx
            .insert_slot(NewSlot {
                doctor_id,
                start: request.start,
                end: request.end,
            })
            .await?;
        tx.commit().await?;

        info!("Slot {} created for doctor {}", slot.id, doctor_id);
        Ok(slot)
    }

    pub async fn list_my_slots(&self, doctor_id: i64) -> Result<Vec<Slot>, SlotError> {
        let mut tx = self.db.begin().await?;
        Ok(tx.list_slots_for_doctor(doctor_id).await?)
    }

    /// Future, unoccupied slots of a doctor for the booking view.
    pub async fn list_available_slots(
        &self,
        doctor_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Slot>, SlotError> {
        let mut tx = self.db.begin().await?;
        let slots = tx.list_open_slots_for_doctor(doctor_id, now).await?;
        debug!("Doctor {} has {} open slots", doctor_id, slots.len());
        Ok(slots)
    }

    pub async fn update_slot(
        &self,
        doctor_id: i64,
        slot_id: i64,
        request: UpdateSlotRequest,
    ) -> Result<Slot, SlotError> {
        let mut tx = self.db.begin().await?;
        let slot = Self::owned_slot(tx.find_slot(slot_id).await?, doctor_id)?;

        if let Some(is_booked) = request.is_booked {
            if is_booked != slot.is_booked {
                warn!("Doctor {} tried to flip occupancy of slot {} directly", doctor_id, slot_id);
                return Err(SlotError::OccupancyManaged);
            }
        }

        let start = request.start.unwrap_or(slot.start);
        let end = request.end.unwrap_or(slot.end);
        validate_time_range(start, end)?;

        let updated = if start != slot.start || end != slot.end {
            tx.update_slot_times(slot_id, start, end).await?
        } else {
            slot
        };
        tx.commit().await?;

        info!("Slot {} updated by doctor {}", slot_id, doctor_id);
        Ok(updated)
    }

    pub async fn delete_slot(&self, doctor_id: i64, slot_id: i64) -> Result<Slot, SlotError> {
        let mut tx = self.db.begin().await?;
        let slot = Self::owned_slot(tx.find_slot(slot_id).await?, doctor_id)?;

        if tx.count_active_appointments_for_slot(slot_id).await? > 0 {
            warn!("Refusing to delete slot {}: active appointment attached", slot_id);
            return Err(SlotError::HasActiveAppointment);
        }

        tx.delete_slot(slot_id).await?;
        tx.commit().await?;

        info!("Slot {} deleted by doctor {}", slot_id, doctor_id);
        Ok(slot)
    }

    // Missing and foreign slots are indistinguishable to the caller
    fn owned_slot(slot: Option<Slot>, doctor_id: i64) -> Result<Slot, SlotError> {
        match slot {
            Some(slot) if slot.is_owned_by(doctor_id) => Ok(slot),
            _ => Err(SlotError::NotFound),
        }
    }
}
