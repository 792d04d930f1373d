use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequest, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use shared_models::auth::{AuthUser, Role};
use shared_models::error::AppError;

use crate::jwt::validate_token;
use crate::state::AppState;

/// `Json` body extractor whose rejections answer with the shared
/// `{"error": ..}` body and a 400.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

pub const DOCTOR_ONLY: &[Role] = &[Role::Doctor];
pub const PATIENT_ONLY: &[Role] = &[Role::Patient];
pub const ANY_ROLE: &[Role] = &[Role::Doctor, Role::Patient];

// Pull the raw token out of an `Authorization: Bearer ...` header
pub fn bearer_token<B>(request: &Request<B>) -> Result<&str, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

// Validates the bearer token and stores the caller in request extensions
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = validate_token(bearer_token(&request)?, &state.config.jwt_secret)
        .map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Capability check: does a caller with `role` pass a route open to `allowed`?
pub fn authorize(role: Role, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role {} is not allowed to access this resource",
            role
        )))
    }
}

// Role gate; must be layered inside `auth_middleware`
pub async fn require_roles(
    State(allowed): State<&'static [Role]>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = extract_user(&request)?;

    if let Err(err) = authorize(user.role, allowed) {
        warn!("User {} with role {} denied access to {}", user.id, user.role, request.uri().path());
        return Err(err);
    }

    Ok(next.run(request).await)
}

pub fn extract_user<B>(request: &Request<B>) -> Result<AuthUser, AppError> {
    request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_authorize_allows_listed_roles() {
        assert!(authorize(Role::Doctor, DOCTOR_ONLY).is_ok());
        assert!(authorize(Role::Patient, PATIENT_ONLY).is_ok());
        assert!(authorize(Role::Patient, ANY_ROLE).is_ok());
    }

    #[test]
    fn test_authorize_rejects_other_roles() {
        assert_matches!(authorize(Role::Patient, DOCTOR_ONLY), Err(AppError::Forbidden(_)));
        assert_matches!(authorize(Role::Doctor, PATIENT_ONLY), Err(AppError::Forbidden(_)));
    }

    #[test]
    fn test_bearer_token_parsing() {
        let request = Request::builder()
            .header("Authorization", "Bearer abc.def.ghi")
            .body(())
            .unwrap();
        assert_eq!(bearer_token(&request).unwrap(), "abc.def.ghi");

        let request = Request::builder()
            .header("Authorization", "Basic abc")
            .body(())
            .unwrap();
        assert_matches!(bearer_token(&request), Err(AppError::Auth(msg)) if msg == "Invalid authorization header format");

        let request = Request::builder().body(()).unwrap();
        assert_matches!(bearer_token(&request), Err(AppError::Auth(msg)) if msg == "Missing authorization header");
    }

    #[derive(Debug, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Booking {
        slot_id: i64,
    }

    fn json_request(content_type: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header("Content-Type", content_type);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_app_json_accepts_well_formed_body() {
        let request = json_request(Some("application/json"), r#"{"slotId":7}"#);
        let AppJson(booking) = AppJson::<Booking>::from_request(request, &()).await.unwrap();
        assert_eq!(booking.slot_id, 7);
    }

    #[tokio::test]
    async fn test_app_json_rejections_become_bad_requests() {
        let missing_field = json_request(Some("application/json"), "{}");
        assert_matches!(
            AppJson::<Booking>::from_request(missing_field, &()).await,
            Err(AppError::ValidationError(msg)) if msg.contains("slotId")
        );

        let wrong_type = json_request(Some("application/json"), r#"{"slotId":"seven"}"#);
        assert_matches!(
            AppJson::<Booking>::from_request(wrong_type, &()).await,
            Err(AppError::ValidationError(_))
        );

        let broken = json_request(Some("application/json"), r#"{"slotId":"#);
        assert_matches!(
            AppJson::<Booking>::from_request(broken, &()).await,
            Err(AppError::BadRequest(_))
        );

        let no_content_type = json_request(None, r#"{"slotId":7}"#);
        let rejection = AppJson::<Booking>::from_request(no_content_type, &()).await.unwrap_err();
        assert_eq!(rejection.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
