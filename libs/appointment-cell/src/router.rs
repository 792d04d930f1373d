use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, require_roles, DOCTOR_ONLY, PATIENT_ONLY};
use shared_utils::state::AppState;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppState>) -> Router {
    let patient_routes = Router::new()
        .route("/book", post(handlers::book_appointment))
        .route("/me", get(handlers::my_appointments))
        .route_layer(middleware::from_fn_with_state(PATIENT_ONLY, require_roles))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let doctor_routes = Router::new()
        .route("/doctor/me", get(handlers::doctor_appointments))
        .route("/{appointment_id}/status", patch(handlers::update_status))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route_layer(middleware::from_fn_with_state(DOCTOR_ONLY, require_roles))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(patient_routes)
        .merge(doctor_routes)
        .with_state(state)
}
