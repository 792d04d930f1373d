use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::appointment_routes;
use auth_cell::auth_routes;
use doctor_cell::{doctor_routes, slot_routes};
use shared_utils::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Doctor booking API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/slots", slot_routes(state.clone()))
        .nest("/appointments", appointment_routes(state))
}
