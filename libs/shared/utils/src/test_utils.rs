use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use shared_config::AppConfig;
use shared_database::{Database, DatabaseError, MemoryDatabase};
use shared_models::auth::{AuthUser, Role};
use shared_models::user::{NewUser, User};

use crate::state::AppState;

pub struct TestConfig {
    pub jwt_secret: String,
    pub jwt_expires_in_hours: i64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            jwt_expires_in_hours: 24,
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            database_url: String::new(),
            jwt_secret: self.jwt_secret.clone(),
            jwt_expires_in_hours: self.jwt_expires_in_hours,
            port: 0,
            cors_origins: Vec::new(),
        }
    }

    /// State backed by a fresh in-memory store.
    pub fn to_state(&self) -> Arc<AppState> {
        AppState::new(self.to_app_config(), Arc::new(MemoryDatabase::new()))
    }
}

pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(id: i64, email: &str, role: Role) -> Self {
        Self {
            id,
            email: email.to_string(),
            role,
        }
    }

    pub fn doctor(id: i64) -> Self {
        Self::new(id, &format!("doctor{}@example.com", id), Role::Doctor)
    }

    pub fn patient(id: i64) -> Self {
        Self::new(id, &format!("patient{}@example.com", id), Role::Patient)
    }

    pub fn from_user(user: &User) -> Self {
        Self::new(user.id, &user.email, user.role)
    }

    pub fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id.to_string(),
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Inserts an account directly into the store, bypassing registration.
pub async fn seed_user(db: &dyn Database, name: &str, role: Role) -> Result<User, DatabaseError> {
    let mut tx = db.begin().await?;
    let user = tx
        .insert_user(NewUser {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            password_hash: "not-a-real-hash".to_string(),
            role,
        })
        .await?;
    tx.commit().await?;
    Ok(user)
}
