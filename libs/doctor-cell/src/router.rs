use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, require_roles, ANY_ROLE, DOCTOR_ONLY};
use shared_utils::state::AppState;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::list_doctors))
        .route_layer(middleware::from_fn_with_state(ANY_ROLE, require_roles))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

pub fn slot_routes(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/doctor/{doctor_id}", get(handlers::available_slots));

    // Layers run bottom-up: token first, then the role gate
    let doctor_routes = Router::new()
        .route("/", post(handlers::create_slot))
        .route("/me", get(handlers::my_slots))
        .route("/{slot_id}", patch(handlers::update_slot).delete(handlers::delete_slot))
        .route_layer(middleware::from_fn_with_state(DOCTOR_ONLY, require_roles))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(doctor_routes)
        .with_state(state)
}
