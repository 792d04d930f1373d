//! Booking against a live Postgres store. Only runs with
//! LIVE_INTEGRATION_TESTS=true and DATABASE_URL pointing at a scratch database.
//!
//! Run with: LIVE_INTEGRATION_TESTS=true DATABASE_URL=postgres://... cargo test --test postgres_test

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use futures::future::join_all;

use appointment_cell::{AppointmentBookingService, AppointmentError};
use shared_database::{DatabaseError, PostgresDatabase};
use shared_models::appointment::{AppointmentStatus, NewAppointment};
use shared_models::auth::Role;
use shared_models::slot::{NewSlot, Slot};
use shared_models::user::User;
use shared_utils::state::AppState;
use shared_utils::test_utils::{seed_user, TestConfig};

fn should_run_live_tests() -> bool {
    std::env::var("LIVE_INTEGRATION_TESTS").unwrap_or_default() == "true"
}

async fn live_state() -> Option<Arc<AppState>> {
    if !should_run_live_tests() {
        println!("Skipping Postgres tests (set LIVE_INTEGRATION_TESTS=true to enable)");
        return None;
    }
    let Ok(url) = std::env::var("DATABASE_URL") else {
        println!("Skipping Postgres tests (DATABASE_URL is not set)");
        return None;
    };

    let db = PostgresDatabase::connect(&url).await.unwrap();
    db.migrate().await.unwrap();
    Some(AppState::new(TestConfig::default().to_app_config(), Arc::new(db)))
}

// Emails are unique in the table and the database outlives each run
fn unique(name: &str) -> String {
    format!("{} {}", name, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn seed_doctor_with_slot(state: &AppState) -> (User, Slot) {
    let doctor = seed_user(state.db.as_ref(), &unique("Doctor"), Role::Doctor)
        .await
        .unwrap();

    let start = Utc::now() + Duration::days(1);
    let mut tx = state.db.begin().await.unwrap();
    let slot = tx
        .insert_slot(NewSlot {
            doctor_id: doctor.id,
            start,
            end: start + Duration::minutes(30),
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();
    (doctor, slot)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_postgres_concurrent_bookings_resolve_to_one_winner() {
    let Some(state) = live_state().await else { return };
    let (doctor, slot) = seed_doctor_with_slot(&state).await;

    let mut patients = Vec::new();
    for i in 0..8 {
        patients.push(
            seed_user(state.db.as_ref(), &unique(&format!("Patient {}", i)), Role::Patient)
                .await
                .unwrap(),
        );
    }

    let (doctor_id, slot_id) = (doctor.id, slot.id);
    let attempts = patients.iter().map(|patient| {
        let state = state.clone();
        let patient_id = patient.id;
        tokio::spawn(async move {
            AppointmentBookingService::new(&state)
                .book_appointment(patient_id, doctor_id, slot_id)
                .await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(AppointmentError::SlotAlreadyBooked));
    }

    let mut tx = state.db.begin().await.unwrap();
    assert!(tx.find_slot(slot_id).await.unwrap().unwrap().is_booked);
    assert_eq!(tx.count_active_appointments_for_slot(slot_id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_postgres_claim_slot_and_active_slot_index() {
    let Some(state) = live_state().await else { return };
    let (doctor, slot) = seed_doctor_with_slot(&state).await;
    let patient = seed_user(state.db.as_ref(), &unique("Patient"), Role::Patient)
        .await
        .unwrap();

    let mut tx = state.db.begin().await.unwrap();
    assert!(tx.claim_slot(slot.id).await.unwrap());
    assert!(!tx.claim_slot(slot.id).await.unwrap());

    let booking = NewAppointment {
        patient_id: patient.id,
        doctor_id: doctor.id,
        slot_id: slot.id,
        status: AppointmentStatus::Pending,
    };
    tx.insert_appointment(booking.clone()).await.unwrap();
    let second = tx.insert_appointment(booking).await;
    assert_matches!(second, Err(DatabaseError::UniqueViolation(_)));
}

#[tokio::test]
async fn test_postgres_cancel_then_delete_slot_cascades() {
    let Some(state) = live_state().await else { return };
    let (doctor, slot) = seed_doctor_with_slot(&state).await;
    let patient = seed_user(state.db.as_ref(), &unique("Patient"), Role::Patient)
        .await
        .unwrap();

    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .book_appointment(patient.id, doctor.id, slot.id)
        .await
        .unwrap();
    let cancelled = service
        .update_status(doctor.id, appointment.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    let mut tx = state.db.begin().await.unwrap();
    assert!(!tx.find_slot(slot.id).await.unwrap().unwrap().is_booked);
    assert_eq!(tx.count_active_appointments_for_slot(slot.id).await.unwrap(), 0);
    tx.delete_slot(slot.id).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = state.db.begin().await.unwrap();
    assert!(tx.find_slot(slot.id).await.unwrap().is_none());
    assert!(tx.find_appointment(appointment.id).await.unwrap().is_none());
}
