//!
//! backoffice HTTP server
//! ----------------------
//! Axum-based JSON API for the administration dashboard.
//!
//! Responsibilities:
//! - Sign-in by email or handle, sign-up, sign-out and current-user lookups.
//! - Role lookups (`/auth/role`) backed by the profile table.
//! - Admin user provisioning (`/api/admin/create-user`).
//! - Profile listing/editing for admin-tier users.
//! - List/detail/create/update over the dashboard collections; reads need a
//!   valid session, writes need an admin-tier role.
//!
//! Bearer tokens are validated against the auth provider on every request;
//! nothing is cached between requests.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{Backend, Config};
use crate::db::{Database, MemoryDatabase, RestDatabase};
use crate::error::{AppError, AppResult};
use crate::identity::{self, AuthProvider, AuthUser, LocalAuthProvider, RemoteAuthProvider};
use crate::profiles::{Profile, ProfilePatch, ProfileStore};
use crate::provisioning::{self, ProvisionRequest, ProvisionResponse, SignUpOutcome, SignUpRequest};
use crate::records::{Collection, RecordStore};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn AuthProvider>,
    pub profiles: ProfileStore,
    pub records: RecordStore,
}

impl AppState {
    pub fn new(provider: Arc<dyn AuthProvider>, db: Arc<dyn Database>) -> Self {
        Self { provider, profiles: ProfileStore::new(db.clone()), records: RecordStore::new(db) }
    }
}

/// Wire the provider and database for the configured backend.
///
/// In local mode a superadmin is provisioned when seed credentials are set,
/// so the dashboard is usable without a hosted provider.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    match config.backend {
        Backend::Remote => {
            let remote = config.remote.as_ref().context("remote backend selected without provider settings")?;
            let provider = RemoteAuthProvider::new(&remote.provider_url, &remote.anon_key, &remote.service_key)
                .with_context(|| format!("While creating auth client for {}", remote.provider_url))?;
            let db = RestDatabase::new(&remote.provider_url, &remote.service_key)
                .with_context(|| format!("While creating database client for {}", remote.provider_url))?;
            Ok(AppState::new(Arc::new(provider), Arc::new(db)))
        }
        Backend::Local => {
            let state = AppState::new(Arc::new(LocalAuthProvider::new()), Arc::new(MemoryDatabase::new()));
            if let Some((email, password)) = &config.seed_admin {
                let req = ProvisionRequest {
                    email: email.clone(),
                    password: password.clone(),
                    pseudo: "admin".into(),
                    role: Some("superadmin".into()),
                    ..Default::default()
                };
                provisioning::provision_user(state.provider.as_ref(), &state.profiles, req)
                    .await
                    .map_err(|e| anyhow::anyhow!("seeding admin {email}: {e}"))?;
                info!(email = %email, "seeded local superadmin");
            }
            Ok(state)
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "backoffice ok" }))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signup", post(sign_up))
        .route("/auth/signout", post(sign_out))
        .route("/auth/user", get(current_user))
        .route("/auth/role", get(current_role))
        .route("/api/admin/create-user", post(create_user))
        .route("/api/users", get(list_users))
        .route("/api/users/{id}", get(get_user_profile).patch(update_user))
        .route("/api/{collection}", get(list_records).post(create_record))
        .route("/api/{collection}/{id}", get(get_record).patch(update_record))
        .with_state(state)
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = build_state(&config).await?;
    let app = build_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => { s.recv().await; }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let v = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = v.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") { return None; }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token.to_string()) }
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<AuthUser> {
    let Some(token) = bearer_token(headers) else {
        return Err(AppError::auth("unauthorized", "missing bearer token"));
    };
    Ok(state.provider.get_user(&token).await?)
}

async fn require_admin(state: &AppState, headers: &HeaderMap) -> AppResult<AuthUser> {
    let user = authenticate(state, headers).await?;
    if !identity::is_admin(&state.profiles, Some(&user.id)).await {
        return Err(AppError::forbidden("forbidden", "admin privileges required"));
    }
    Ok(user)
}

/// `Json` body whose rejection goes through `AppError`, so a malformed or
/// mistyped body gets the same 400 `{error}` reply as any other bad input.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = axum::extract::rejection::JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

#[derive(Debug, Deserialize)]
struct SignInPayload {
    #[serde(alias = "email", alias = "pseudo")]
    identifier: String,
    password: String,
}

async fn sign_in(State(state): State<AppState>, JsonBody(payload): JsonBody<SignInPayload>) -> AppResult<Json<Value>> {
    let session = identity::sign_in_with_identifier(state.provider.as_ref(), &state.profiles, &payload.identifier, &payload.password).await?;
    Ok(Json(json!(session)))
}

/// Self-registration always writes the matching profile row at the default role.
async fn sign_up(State(state): State<AppState>, JsonBody(payload): JsonBody<SignUpRequest>) -> AppResult<Json<SignUpOutcome>> {
    let out = provisioning::register_user(state.provider.as_ref(), &state.profiles, payload).await?;
    Ok(Json(out))
}

async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let Some(token) = bearer_token(&headers) else {
        return Err(AppError::auth("unauthorized", "missing bearer token"));
    };
    state.provider.sign_out(&token).await?;
    Ok(Json(json!({"status": "ok"})))
}

async fn current_user(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let user = authenticate(&state, &headers).await?;
    let role = identity::get_user_role(&state.profiles, Some(&user.id)).await;
    let is_admin = role.as_deref().map(|r| identity::Role::parse(r).is_admin_tier()).unwrap_or(false);
    Ok(Json(json!({"user": user, "role": role, "is_admin": is_admin})))
}

/// Never fails: a missing or rejected token resolves like an absent user id.
async fn current_role(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let user_id = match bearer_token(&headers) {
        Some(token) => state.provider.get_user(&token).await.ok().map(|u| u.id),
        None => None,
    };
    let role = identity::get_user_role(&state.profiles, user_id.as_deref()).await;
    let is_admin = role.as_deref().map(|r| identity::Role::parse(r).is_admin_tier()).unwrap_or(false);
    Json(json!({"role": role, "is_admin": is_admin}))
}

async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(mut payload): JsonBody<ProvisionRequest>,
) -> AppResult<Json<ProvisionResponse>> {
    let caller = require_admin(&state, &headers).await?;
    if payload.created_by.as_deref().map(str::trim).unwrap_or("").is_empty() {
        payload.created_by = match state.profiles.find_by_auth_user_id(&caller.id).await {
            Ok(p) => p.map(|p| p.id),
            Err(e) => {
                warn!("creator profile lookup failed: {e}");
                None
            }
        };
    }
    let user = provisioning::provision_user(state.provider.as_ref(), &state.profiles, payload).await?;
    Ok(Json(ProvisionResponse { success: true, user, message: "User created successfully".into() }))
}

async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<Profile>>> {
    require_admin(&state, &headers).await?;
    Ok(Json(state.profiles.list().await?))
}

async fn get_user_profile(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<String>) -> AppResult<Json<Profile>> {
    require_admin(&state, &headers).await?;
    state
        .profiles
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound { code: "not_found".into(), message: format!("user '{id}' not found") })
}

async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<ProfilePatch>,
) -> AppResult<Json<Profile>> {
    require_admin(&state, &headers).await?;
    if patch.is_empty() {
        return Err(AppError::user("empty_patch", "nothing to update"));
    }
    state
        .profiles
        .update(&id, &patch)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound { code: "not_found".into(), message: format!("user '{id}' not found") })
}

async fn list_records(State(state): State<AppState>, headers: HeaderMap, Path(collection): Path<String>) -> AppResult<Json<Vec<Value>>> {
    let c: Collection = collection.parse()?;
    authenticate(&state, &headers).await?;
    Ok(Json(state.records.list(c).await?))
}

async fn get_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((collection, id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let c: Collection = collection.parse()?;
    authenticate(&state, &headers).await?;
    Ok(Json(state.records.get(c, &id).await?))
}

async fn create_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(collection): Path<String>,
    JsonBody(row): JsonBody<Value>,
) -> AppResult<Json<Value>> {
    let c: Collection = collection.parse()?;
    require_admin(&state, &headers).await?;
    Ok(Json(state.records.create(c, row).await?))
}

async fn update_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((collection, id)): Path<(String, String)>,
    JsonBody(patch): JsonBody<Value>,
) -> AppResult<Json<Value>> {
    let c: Collection = collection.parse()?;
    require_admin(&state, &headers).await?;
    Ok(Json(state.records.update(c, &id, patch).await?))
}
