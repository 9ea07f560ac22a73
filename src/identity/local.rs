use std::collections::HashMap;

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use base64::Engine;
use parking_lot::RwLock;
use password_hash::{PasswordHash, SaltString};
use serde_json::Value;

use crate::tprintln;

use super::principal::{AuthUser, NewIdentity, Session, SignUpResponse};
use super::provider::{AuthError, AuthProvider};

const MIN_PASSWORD_LEN: usize = 6;
const SESSION_TTL_SECS: u64 = 60 * 60;

struct LocalAccount {
    user: AuthUser,
    password_hash: String,
}

/// In-process identity service: Argon2 password hashes and opaque bearer tokens.
/// Used when no hosted provider is configured, and by tests.
#[derive(Default)]
pub struct LocalAuthProvider {
    accounts: RwLock<HashMap<String, LocalAccount>>,
    tokens: RwLock<HashMap<String, String>>,
}

fn gen_token() -> Result<String, AuthError> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AuthError::Transport(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AuthError::Transport(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Rejected(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Rejected(e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

impl LocalAuthProvider {
    pub fn new() -> Self { Self::default() }

    /// Number of identities currently registered.
    pub fn identity_count(&self) -> usize { self.accounts.read().len() }

    fn create(&self, email: &str, password: &str, metadata: Value) -> Result<AuthUser, AuthError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Rejected(format!("Password should be at least {MIN_PASSWORD_LEN} characters")));
        }
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AuthError::Rejected("email is required".into()));
        }
        let password_hash = hash_password(password)?;
        let mut accounts = self.accounts.write();
        if accounts.values().any(|a| a.user.email.as_deref() == Some(email.as_str())) {
            return Err(AuthError::AlreadyRegistered);
        }
        let user = AuthUser { id: uuid::Uuid::new_v4().to_string(), email: Some(email), user_metadata: metadata };
        accounts.insert(user.id.clone(), LocalAccount { user: user.clone(), password_hash });
        tprintln!("local_auth.create user={}", user.id);
        Ok(user)
    }

    fn issue(&self, user: AuthUser) -> Result<Session, AuthError> {
        let access_token = gen_token()?;
        let refresh_token = gen_token()?;
        self.tokens.write().insert(access_token.clone(), user.id.clone());
        Ok(Session {
            access_token,
            refresh_token: Some(refresh_token),
            token_type: "bearer".into(),
            expires_in: SESSION_TTL_SECS,
            user,
        })
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpResponse, AuthError> {
        let user = self.create(email, password, metadata)?;
        let session = self.issue(user.clone())?;
        Ok(SignUpResponse { user, session: Some(session) })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim().to_lowercase();
        let found = {
            let accounts = self.accounts.read();
            accounts
                .values()
                .find(|a| a.user.email.as_deref() == Some(email.as_str()))
                .map(|a| (a.user.clone(), a.password_hash.clone()))
        };
        let Some((user, phc)) = found else { return Err(AuthError::InvalidCredentials); };
        if !verify_password(&phc, password) {
            return Err(AuthError::InvalidCredentials);
        }
        self.issue(user)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        match self.tokens.write().remove(access_token) {
            Some(_) => Ok(()),
            None => Err(AuthError::InvalidToken),
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let user_id = self.tokens.read().get(access_token).cloned().ok_or(AuthError::InvalidToken)?;
        self.accounts.read().get(&user_id).map(|a| a.user.clone()).ok_or(AuthError::InvalidToken)
    }

    async fn admin_create_user(&self, identity: &NewIdentity) -> Result<AuthUser, AuthError> {
        self.create(&identity.email, &identity.password, identity.user_metadata.clone())
    }

    async fn admin_delete_user(&self, user_id: &str) -> Result<(), AuthError> {
        if self.accounts.write().remove(user_id).is_none() {
            return Err(AuthError::Rejected(format!("user {user_id} not found")));
        }
        self.tokens.write().retain(|_, uid| uid != user_id);
        Ok(())
    }
}
