use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use auth_cell::auth_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_register_then_me_round_trip() {
    let app = auth_routes(TestConfig::default().to_state());

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/register",
            json!({
                "name": "Dr. Strange",
                "email": "strange@example.com",
                "password": "secret123",
                "role": "DOCTOR"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "DOCTOR");
    assert!(body["user"].get("passwordHash").is_none());
    let token = body["token"].as_str().unwrap().to_string();

    let (status, identity) = send(&app, get_with_token("/me", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(identity["email"], "strange@example.com");
    assert_eq!(identity["role"], "DOCTOR");
    assert_eq!(identity["id"], body["user"]["id"]);
}

#[tokio::test]
async fn test_login_answers_201_with_token() {
    let app = auth_routes(TestConfig::default().to_state());

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/register",
            json!({
                "name": "Pat",
                "email": "pat@example.com",
                "password": "secret123",
                "role": "PATIENT"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/login",
            json!({ "email": "pat@example.com", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "pat@example.com");
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = auth_routes(TestConfig::default().to_state());

    let request = Request::builder().uri("/me").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing authorization header");
}

#[tokio::test]
async fn test_me_rejects_expired_and_forged_tokens() {
    let config = TestConfig::default();
    let app = auth_routes(config.to_state());
    let user = TestUser::patient(1);

    let expired = JwtTestUtils::create_expired_token(&user, &config.jwt_secret);
    let (status, _) = send(&app, get_with_token("/me", &expired)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = JwtTestUtils::create_invalid_signature_token(&user);
    let (status, _) = send(&app, get_with_token("/me", &forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get_with_token("/me", &JwtTestUtils::create_malformed_token())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_unknown_role() {
    let app = auth_routes(TestConfig::default().to_state());

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/register",
            json!({
                "name": "Root",
                "email": "root@example.com",
                "password": "secret123",
                "role": "ADMIN"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_register_bodies_answer_400_with_error_body() {
    let app = auth_routes(TestConfig::default().to_state());

    let cases = [
        // missing password
        json!({ "name": "Ann", "email": "ann@example.com", "role": "PATIENT" }),
        // unknown role
        json!({ "name": "Ann", "email": "ann@example.com", "password": "secret123", "role": "ADMIN" }),
        // unknown field
        json!({ "name": "Ann", "email": "ann@example.com", "password": "secret123", "role": "PATIENT", "isAdmin": true }),
        // too short, rejected by validation instead of parsing
        json!({ "name": "Ann", "email": "ann@example.com", "password": "123", "role": "PATIENT" }),
    ];

    for body in cases {
        let (status, response) = send(&app, json_request(Method::POST, "/register", body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert!(response["error"].is_string(), "body: {}", body);
    }
}

#[tokio::test]
async fn test_login_without_json_content_type_is_bad_request() {
    let app = auth_routes(TestConfig::default().to_state());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/login")
        .body(Body::from(r#"{"email":"ann@example.com","password":"secret123"}"#))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
