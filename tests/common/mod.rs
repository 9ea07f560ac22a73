#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use backoffice::db::{Database, DbError, Filter, MemoryDatabase};
use backoffice::identity::{AuthError, AuthProvider, AuthUser, LocalAuthProvider, NewIdentity, Session, SignUpResponse};
use backoffice::profiles::{NewProfile, Profile, ProfileStore};
use backoffice::server::{build_router, AppState};

/// Local provider that records the calls it receives and can be told to fail.
#[derive(Default)]
pub struct RecordingProvider {
    pub inner: LocalAuthProvider,
    pub sign_in_attempts: Mutex<Vec<String>>,
    pub created: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
    pub fail_delete: AtomicBool,
    pub fail_create_transport: AtomicBool,
}

impl RecordingProvider {
    pub fn new() -> Self { Self::default() }
    pub fn attempts(&self) -> Vec<String> { self.sign_in_attempts.lock().clone() }
    pub fn deleted(&self) -> Vec<String> { self.deleted.lock().clone() }
}

#[async_trait]
impl AuthProvider for RecordingProvider {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpResponse, AuthError> {
        self.inner.sign_up(email, password, metadata).await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.sign_in_attempts.lock().push(email.to_string());
        self.inner.sign_in_with_password(email, password).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.inner.sign_out(access_token).await
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        self.inner.get_user(access_token).await
    }

    async fn admin_create_user(&self, identity: &NewIdentity) -> Result<AuthUser, AuthError> {
        if self.fail_create_transport.load(Ordering::SeqCst) {
            return Err(AuthError::Transport("connection reset".into()));
        }
        let out = self.inner.admin_create_user(identity).await;
        if out.is_ok() {
            self.created.fetch_add(1, Ordering::SeqCst);
        }
        out
    }

    async fn admin_delete_user(&self, user_id: &str) -> Result<(), AuthError> {
        self.deleted.lock().push(user_id.to_string());
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(AuthError::Transport("delete timed out".into()));
        }
        self.inner.admin_delete_user(user_id).await
    }
}

/// Memory tables with switchable failures.
#[derive(Default)]
pub struct FlakyDatabase {
    pub inner: MemoryDatabase,
    pub fail_select: AtomicBool,
    pub fail_insert: AtomicBool,
}

impl FlakyDatabase {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl Database for FlakyDatabase {
    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, DbError> {
        if self.fail_select.load(Ordering::SeqCst) {
            return Err(DbError::Transport("select failed".into()));
        }
        self.inner.select(table, filters).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, DbError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(DbError::Status { status: 500, body: "insert failed".into() });
        }
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>, DbError> {
        self.inner.update(table, filters, patch).await
    }
}

pub fn profile(auth_user_id: &str, email: &str, pseudo: &str, role: &str) -> NewProfile {
    NewProfile {
        auth_user_id: auth_user_id.into(),
        email: email.into(),
        pseudo: pseudo.into(),
        first_name: None,
        last_name: None,
        phone: None,
        role: role.into(),
        is_active: true,
        created_by: None,
    }
}

/// Register an identity and its profile directly, bypassing provisioning.
pub async fn register(provider: &dyn AuthProvider, profiles: &ProfileStore, email: &str, password: &str, pseudo: &str, role: &str) -> Profile {
    let user = provider
        .admin_create_user(&NewIdentity { email: email.into(), password: password.into(), email_confirm: true, user_metadata: Value::Null })
        .await
        .expect("create identity");
    profiles.insert(&profile(&user.id, email, pseudo, role)).await.expect("insert profile")
}

pub async fn spawn_app(state: AppState) -> SocketAddr {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    addr
}

pub fn local_state() -> (Arc<RecordingProvider>, Arc<MemoryDatabase>, AppState) {
    let provider = Arc::new(RecordingProvider::new());
    let db = Arc::new(MemoryDatabase::new());
    let state = AppState::new(provider.clone(), db.clone());
    (provider, db, state)
}
