use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::principal::{AuthUser, NewIdentity, Session, SignUpResponse};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid_credentials")]
    InvalidCredentials,
    #[error("invalid_token")]
    InvalidToken,
    #[error("email already registered")]
    AlreadyRegistered,
    #[error("auth provider rejected request: {0}")]
    Rejected(String),
    #[error("auth provider unreachable: {0}")]
    Transport(String),
}

/// Operations the back office needs from the identity service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpResponse, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Resolve the identity behind an access token.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError>;

    async fn admin_create_user(&self, identity: &NewIdentity) -> Result<AuthUser, AuthError>;

    async fn admin_delete_user(&self, user_id: &str) -> Result<(), AuthError>;
}
