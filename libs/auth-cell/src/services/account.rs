use std::sync::Arc;

use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::{Database, DatabaseError};
use shared_models::auth::AuthResponse;
use shared_models::user::{NewUser, User};
use shared_utils::jwt::issue_token;
use shared_utils::password::PasswordService;
use shared_utils::state::AppState;

use crate::models::{normalize_email, AccountError, LoginRequest, RegisterRequest};

pub struct AccountService {
    db: Arc<dyn Database>,
    config: Arc<AppConfig>,
}

impl AccountService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: Arc::clone(&state.db),
            config: Arc::clone(&state.config),
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AccountError> {
        request.validate()?;
        let email = normalize_email(&request.email);
        debug!("Registering {} account for {}", request.role, email);

        let password_hash = PasswordService::hash_password(&request.password)
            .map_err(|e| AccountError::PasswordHash(e.to_string()))?;

        let mut tx = self.db.begin().await?;
        if tx.find_user_by_email(&email).await?.is_some() {
            warn!("Registration rejected, email already in use: {}", email);
            return Err(AccountError::EmailTaken);
        }

        let user = tx
            .insert_user(NewUser {
                name: request.name.trim().to_string(),
                email,
                password_hash,
                role: request.role,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::UniqueViolation(_) => AccountError::EmailTaken,
                other => AccountError::Database(other),
            })?;
        tx.commit().await?;

        info!("User {} registered as {}", user.id, user.role);
        self.sign_in(&user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AccountError> {
        let email = normalize_email(&request.email);

        let user = {
            let mut tx = self.db.begin().await?;
            tx.find_user_by_email(&email).await?
        };
        let Some(user) = user else {
            debug!("Login attempt for unknown email: {}", email);
            return Err(AccountError::InvalidCredentials);
        };

        let matches = PasswordService::verify_password(&request.password, &user.password_hash)
            .map_err(|e| AccountError::PasswordHash(e.to_string()))?;
        if !matches {
            warn!("Login rejected for user {}: wrong password", user.id);
            return Err(AccountError::InvalidCredentials);
        }

        info!("User {} logged in", user.id);
        self.sign_in(&user)
    }

    fn sign_in(&self, user: &User) -> Result<AuthResponse, AccountError> {
        let token = issue_token(user, &self.config.jwt_secret, self.config.jwt_expires_in_hours)
            .map_err(AccountError::Token)?;
        Ok(AuthResponse {
            token,
            user: user.profile(),
        })
    }
}
