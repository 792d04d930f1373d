use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};
use tracing::debug;

use shared_models::auth::{AuthResponse, AuthUser};
use shared_models::error::AppError;
use shared_utils::extractor::AppJson;
use shared_utils::state::AppState;

use crate::models::{LoginRequest, RegisterRequest};
use crate::services::AccountService;

#[axum::debug_handler]
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let service = AccountService::new(&state);
    let response = service.register(request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let service = AccountService::new(&state);
    let response = service.login(request).await?;

    // Issuing a token counts as creating a session
    Ok((StatusCode::CREATED, Json(response)))
}

// Identity comes straight from the validated token
pub async fn me(Extension(user): Extension<AuthUser>) -> Json<AuthUser> {
    debug!("Returning identity for user: {}", user.id);
    Json(user)
}
