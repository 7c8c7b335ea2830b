//! crates/nexus_chat_core/src/accounts.rs
//!
//! The credential store and the session token issuer.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{IssuedToken, User, UserCredentials};
use crate::errors::{AuthError, TokenError};
use crate::ports::{PasswordHasher, PortError, TokenService, UserRepository};

pub const MIN_PASSWORD_LENGTH: usize = 8;

//=========================================================================================
// Credential Store
//=========================================================================================

/// Registers users and checks their passwords. Raw passwords are never stored.
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserRepository>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { users, hasher }
    }

    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let username = username.trim();
        let email = normalize_email(email);

        if username.is_empty() {
            return Err(AuthError::InvalidInput("username must not be empty".to_string()));
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidInput("email address is not valid".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        if self.users.find_user_by_email(&email).await?.is_some() {
            warn!("Registration rejected, email already present");
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = self.hasher.hash(password)?;
        let credentials = UserCredentials {
            user: User {
                id: Uuid::new_v4(),
                username: username.to_string(),
                email,
                created_at: Utc::now(),
            },
            password_hash,
        };

        let user = self
            .users
            .insert_user(credentials)
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => AuthError::DuplicateEmail,
                other => AuthError::Port(other),
            })?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Unknown emails and wrong passwords both yield `InvalidCredentials`.
    #[instrument(skip(self, password))]
    pub async fn verify(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let Some(credentials) = self.users.find_user_by_email(&email).await? else {
            warn!("Login attempt for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &credentials.password_hash)? {
            warn!(user_id = %credentials.user.id, "Login attempt with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(credentials.user)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

//=========================================================================================
// Session Token Issuer
//=========================================================================================

/// Issues, validates and refreshes stateless bearer tokens.
#[derive(Clone)]
pub struct SessionTokenIssuer {
    tokens: Arc<dyn TokenService>,
}

impl SessionTokenIssuer {
    pub fn new(tokens: Arc<dyn TokenService>) -> Self {
        Self { tokens }
    }

    pub fn issue(&self, user: &User) -> Result<IssuedToken, AuthError> {
        Ok(self.tokens.issue(user.id)?)
    }

    pub fn validate(&self, token: &str) -> Result<Uuid, TokenError> {
        self.tokens.validate(token)
    }

    /// Re-issues a token for the same subject. Tokens that fail validation for any
    /// reason, including expiry, are never extended.
    pub fn refresh(&self, token: &str) -> Result<IssuedToken, AuthError> {
        let subject = self.tokens.validate(token).map_err(|e| {
            warn!("Refusing to refresh token: {e}");
            AuthError::InvalidToken
        })?;
        Ok(self.tokens.issue(subject)?)
    }
}
