use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::profiles::ProfileStore;
use crate::tprintln;

use super::principal::{AuthUser, Session, SignUpResponse};
use super::provider::{AuthError, AuthProvider};
use super::signin::sign_in_with_identifier;

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(AuthUser),
    SignedOut,
    UserUpdated(AuthUser),
}

/// Holds the dashboard's current session and broadcasts auth-state changes.
pub struct SessionManager {
    provider: Arc<dyn AuthProvider>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { provider, current: RwLock::new(None), events }
    }

    /// Receiver for every subsequent auth-state change.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> { self.events.subscribe() }

    fn emit(&self, ev: AuthEvent) {
        // no subscribers is fine
        let _ = self.events.send(ev);
    }

    fn store(&self, session: Session) {
        let user = session.user.clone();
        *self.current.write() = Some(session);
        tprintln!("session.store user={}", user.id);
        self.emit(AuthEvent::SignedIn(user));
    }

    pub async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpResponse, AuthError> {
        let out = self.provider.sign_up(email, password, metadata).await?;
        if let Some(session) = out.session.clone() {
            self.store(session);
        }
        Ok(out)
    }

    pub async fn sign_in(&self, identifier: &str, password: &str, profiles: &ProfileStore) -> Result<Session, AuthError> {
        let session = sign_in_with_identifier(self.provider.as_ref(), profiles, identifier, password).await?;
        info!(user_id = %session.user.id, "signed in");
        self.store(session.clone());
        Ok(session)
    }

    /// Local state is cleared even when the provider call fails.
    pub async fn sign_out(&self) {
        let token = self.current.write().take().map(|s| s.access_token);
        if let Some(token) = token {
            if let Err(e) = self.provider.sign_out(&token).await {
                warn!("provider sign-out failed: {e}");
            }
        }
        self.emit(AuthEvent::SignedOut);
    }

    pub fn session(&self) -> Option<Session> { self.current.read().clone() }

    pub fn user(&self) -> Option<AuthUser> { self.current.read().as_ref().map(|s| s.user.clone()) }

    /// Re-read the user behind the stored token. A rejected token ends the session.
    pub async fn refresh_user(&self) -> Result<Option<AuthUser>, AuthError> {
        let Some(token) = self.current.read().as_ref().map(|s| s.access_token.clone()) else {
            return Ok(None);
        };
        match self.provider.get_user(&token).await {
            Ok(user) => {
                if let Some(s) = self.current.write().as_mut() {
                    s.user = user.clone();
                }
                self.emit(AuthEvent::UserUpdated(user.clone()));
                Ok(Some(user))
            }
            Err(AuthError::InvalidToken) => {
                *self.current.write() = None;
                self.emit(AuthEvent::SignedOut);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
