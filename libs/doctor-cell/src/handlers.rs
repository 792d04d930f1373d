use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::debug;

use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use shared_models::slot::Slot;
use shared_models::user::DoctorSummary;
use shared_utils::extractor::AppJson;
use shared_utils::state::AppState;

use crate::models::{CreateSlotRequest, UpdateSlotRequest};
use crate::services::{AvailabilityService, DoctorService};

// ==============================================================================
// DOCTOR DIRECTORY
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<DoctorSummary>>, AppError> {
    debug!("User {} listing doctors", user.id);
    let service = DoctorService::new(&state);
    let doctors = service.list_doctors().await?;

    Ok(Json(doctors))
}

// ==============================================================================
// SLOT MANAGEMENT (DOCTOR ONLY)
// ==============================================================================

#[axum::debug_handler]
pub async fn create_slot(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(request): AppJson<CreateSlotRequest>,
) -> Result<(StatusCode, Json<Slot>), AppError> {
    let service = AvailabilityService::new(&state);
    let slot = service.create_slot(user.id, request).await?;

    Ok((StatusCode::CREATED, Json(slot)))
}

#[axum::debug_handler]
pub async fn my_slots(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Slot>>, AppError> {
    let service = AvailabilityService::new(&state);
    let slots = service.list_my_slots(user.id).await?;

    Ok(Json(slots))
}

#[axum::debug_handler]
pub async fn update_slot(
    State(state): State<Arc<AppState>>,
    Path(slot_id): Path<i64>,
    Extension(user): Extension<AuthUser>,
    AppJson(request): AppJson<UpdateSlotRequest>,
) -> Result<Json<Slot>, AppError> {
    let service = AvailabilityService::new(&state);
    let slot = service.update_slot(user.id, slot_id, request).await?;

    Ok(Json(slot))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<Arc<AppState>>,
    Path(slot_id): Path<i64>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Slot>, AppError> {
    let service = AvailabilityService::new(&state);
    let slot = service.delete_slot(user.id, slot_id).await?;

    Ok(Json(slot))
}

// ==============================================================================
// PUBLIC
// ==============================================================================

#[axum::debug_handler]
pub async fn available_slots(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<i64>,
) -> Result<Json<Vec<Slot>>, AppError> {
    let service = AvailabilityService::new(&state);
    let slots = service.list_available_slots(doctor_id, Utc::now()).await?;

    Ok(Json(slots))
}
