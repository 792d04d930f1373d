use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
};

use shared_models::appointment::{Appointment, AppointmentDetails};
use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use shared_utils::extractor::AppJson;
use shared_utils::state::AppState;

use crate::models::{BookAppointmentRequest, RescheduleAppointmentRequest, UpdateStatusRequest};
use crate::services::AppointmentBookingService;

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(request): AppJson<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .book_appointment(user.id, request.doctor_id, request.slot_id)
        .await?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<AppointmentDetails>>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointments = service.get_patient_appointments(user.id).await?;

    Ok(Json(appointments))
}

// ==============================================================================
// DOCTOR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn doctor_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<AppointmentDetails>>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointments = service.get_doctor_appointments(user.id).await?;

    Ok(Json(appointments))
}

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<AuthUser>,
    AppJson(request): AppJson<UpdateStatusRequest>,
) -> Result<Json<Appointment>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .update_status(user.id, appointment_id, request.status)
        .await?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<AuthUser>,
    AppJson(request): AppJson<RescheduleAppointmentRequest>,
) -> Result<Json<AppointmentDetails>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let details = service
        .reschedule_appointment(user.id, appointment_id, request.new_slot_id)
        .await?;

    Ok(Json(details))
}
