use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::appointment_routes;
use shared_models::auth::Role;
use shared_models::slot::NewSlot;
use shared_utils::test_utils::{seed_user, JwtTestUtils, TestConfig, TestUser};

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn request(method: Method, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_book_confirm_cancel_flow() {
    let config = TestConfig::default();
    let state = config.to_state();
    let app = appointment_routes(state.clone());

    let doctor = seed_user(state.db.as_ref(), "Dr House", Role::Doctor).await.unwrap();
    let patient = seed_user(state.db.as_ref(), "Pat Patient", Role::Patient).await.unwrap();
    let doctor_token = JwtTestUtils::create_test_token(&TestUser::from_user(&doctor), &config.jwt_secret, None);
    let patient_token = JwtTestUtils::create_test_token(&TestUser::from_user(&patient), &config.jwt_secret, None);

    let start = Utc::now() + Duration::days(1);
    let slot = {
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
        slot
    };

    let (status, appointment) = send(
        &app,
        request(
            Method::POST,
            "/book",
            &patient_token,
            Some(json!({ "doctorId": doctor.id, "slotId": slot.id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(appointment["status"], "PENDING");
    assert_eq!(appointment["slotId"], slot.id);

    let status_uri = format!("/{}/status", appointment["id"]);

    let (status, confirmed) = send(
        &app,
        request(Method::PATCH, &status_uri, &doctor_token, Some(json!({ "status": "CONFIRMED" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "CONFIRMED");

    let (status, cancelled) = send(
        &app,
        request(Method::PATCH, &status_uri, &doctor_token, Some(json!({ "status": "CANCELLED" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");

    let (status, mine) = send(&app, request(Method::GET, "/me", &patient_token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine[0]["status"], "CANCELLED");
    assert_eq!(mine[0]["slot"]["isBooked"], false);
    assert_eq!(mine[0]["doctor"]["name"], "Dr House");
}

#[tokio::test]
async fn test_appointment_routes_gate_by_role() {
    let config = TestConfig::default();
    let app = appointment_routes(config.to_state());
    let doctor_token = JwtTestUtils::create_test_token(&TestUser::doctor(1), &config.jwt_secret, None);
    let patient_token = JwtTestUtils::create_test_token(&TestUser::patient(2), &config.jwt_secret, None);

    let (status, _) = send(
        &app,
        request(Method::POST, "/book", &doctor_token, Some(json!({ "doctorId": 1, "slotId": 1 }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, request(Method::GET, "/doctor/me", &patient_token, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request(Method::PATCH, "/1/status", &patient_token, Some(json!({ "status": "CANCELLED" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, request(Method::GET, "/doctor/me", &doctor_token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let missing = Request::builder().uri("/me").body(Body::empty()).unwrap();
    let (status, _) = send(&app, missing).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_appointment_bodies_answer_400() {
    let config = TestConfig::default();
    let app = appointment_routes(config.to_state());
    let doctor_token = JwtTestUtils::create_test_token(&TestUser::doctor(1), &config.jwt_secret, None);
    let patient_token = JwtTestUtils::create_test_token(&TestUser::patient(2), &config.jwt_secret, None);

    let (status, body) = send(
        &app,
        request(Method::POST, "/book", &patient_token, Some(json!({ "doctorId": 1 }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("slotId"));

    let (status, body) = send(
        &app,
        request(Method::PATCH, "/1/status", &doctor_token, Some(json!({ "status": "DONE" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        request(Method::PATCH, "/1/reschedule", &doctor_token, Some(json!({ "newSlotId": 2, "force": true }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
