//! User creation: an auth identity plus its profile row, either provisioned
//! by an admin or self-registered through sign-up.
//!
//! The two writes are not atomic. Duplicate emails and handles are rejected by
//! prior reads, and a failed profile insert triggers a best-effort delete of
//! the identity that was just created. If that delete fails too, the identity
//! is left without a profile and the orphan is logged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::db::DbError;
use crate::error::{AppError, AppResult};
use crate::identity::{AuthError, AuthProvider, AuthUser, NewIdentity, Session};
use crate::profiles::{normalize_email, NewProfile, Profile, ProfileStore};

const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_ROLE: &str = "other";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub pseudo: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionResponse {
    pub success: bool,
    pub user: Profile,
    pub message: String,
}

/// Self-registration body. Carries no role: new accounts always start at the
/// default role.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignUpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub pseudo: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<Session>,
    pub profile: Profile,
}

fn non_blank(v: &Option<String>) -> Option<String> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn validate(req: &ProvisionRequest) -> AppResult<()> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() || req.pseudo.trim().is_empty() {
        return Err(AppError::user("missing_fields", "email, password and pseudo are required"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(AppError::user("invalid_email", "email address is not valid"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::UserInput {
            code: "weak_password".into(),
            message: format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        });
    }
    Ok(())
}

async fn ensure_available(profiles: &ProfileStore, email: &str, pseudo: &str) -> AppResult<()> {
    let precheck = |e: DbError| {
        error!("profile pre-check failed: {e}");
        AppError::internal("precheck_failed", "could not verify existing users")
    };
    if profiles.find_by_email(email).await.map_err(precheck)?.is_some() {
        return Err(AppError::user("email_exists", "a user with this email already exists"));
    }
    if profiles.find_by_pseudo(pseudo).await.map_err(precheck)?.is_some() {
        return Err(AppError::user("pseudo_exists", "a user with this pseudo already exists"));
    }
    Ok(())
}

fn identity_metadata(pseudo: &str, first_name: &Option<String>, last_name: &Option<String>) -> serde_json::Value {
    json!({
        "pseudo": pseudo,
        "first_name": non_blank(first_name),
        "last_name": non_blank(last_name),
    })
}

// Refusals are the caller's fault (400); anything else is ours.
fn identity_failure(email: &str, e: AuthError) -> AppError {
    match e {
        AuthError::AlreadyRegistered | AuthError::Rejected(_) => {
            warn!(email = %email, "identity creation refused: {e}");
            e.into()
        }
        _ => {
            error!(email = %email, "identity creation failed: {e}");
            AppError::internal("auth_create_failed", "failed to create auth user")
        }
    }
}

/// Insert the profile for a fresh identity, deleting the identity if the insert fails.
async fn attach_profile(provider: &dyn AuthProvider, profiles: &ProfileStore, row: NewProfile) -> AppResult<Profile> {
    let auth_user_id = row.auth_user_id.clone();
    match profiles.insert(&row).await {
        Ok(profile) => Ok(profile),
        Err(e) => {
            error!(auth_user_id = %auth_user_id, "profile insert failed: {e}");
            if let Err(del) = provider.admin_delete_user(&auth_user_id).await {
                error!(auth_user_id = %auth_user_id, "compensating identity delete failed, identity left without profile: {del}");
            }
            Err(AppError::internal("profile_create_failed", "failed to create user profile"))
        }
    }
}

/// Create an auth identity and its profile row.
pub async fn provision_user(provider: &dyn AuthProvider, profiles: &ProfileStore, req: ProvisionRequest) -> AppResult<Profile> {
    validate(&req)?;
    let email = normalize_email(&req.email);
    let pseudo = req.pseudo.trim().to_string();
    let role = non_blank(&req.role).unwrap_or_else(|| DEFAULT_ROLE.to_string());
    ensure_available(profiles, &email, &pseudo).await?;

    let identity = NewIdentity {
        email: email.clone(),
        password: req.password.clone(),
        email_confirm: true,
        user_metadata: identity_metadata(&pseudo, &req.first_name, &req.last_name),
    };
    let auth_user = provider.admin_create_user(&identity).await.map_err(|e| identity_failure(&email, e))?;

    let row = NewProfile {
        auth_user_id: auth_user.id.clone(),
        email,
        pseudo,
        first_name: non_blank(&req.first_name),
        last_name: non_blank(&req.last_name),
        phone: non_blank(&req.phone),
        role,
        is_active: true,
        created_by: non_blank(&req.created_by),
    };
    let profile = attach_profile(provider, profiles, row).await?;
    info!(profile_id = %profile.id, auth_user_id = %auth_user.id, role = ?profile.role, "user provisioned");
    Ok(profile)
}

/// Self-registration: same checks and compensation as provisioning, always at
/// the default role and with no creator.
pub async fn register_user(provider: &dyn AuthProvider, profiles: &ProfileStore, req: SignUpRequest) -> AppResult<SignUpOutcome> {
    let req = ProvisionRequest {
        email: req.email,
        password: req.password,
        pseudo: req.pseudo,
        first_name: req.first_name,
        last_name: req.last_name,
        phone: req.phone,
        role: None,
        created_by: None,
    };
    validate(&req)?;
    let email = normalize_email(&req.email);
    let pseudo = req.pseudo.trim().to_string();
    ensure_available(profiles, &email, &pseudo).await?;

    let metadata = identity_metadata(&pseudo, &req.first_name, &req.last_name);
    let out = provider.sign_up(&email, &req.password, metadata).await.map_err(|e| identity_failure(&email, e))?;

    let row = NewProfile {
        auth_user_id: out.user.id.clone(),
        email,
        pseudo,
        first_name: non_blank(&req.first_name),
        last_name: non_blank(&req.last_name),
        phone: non_blank(&req.phone),
        role: DEFAULT_ROLE.to_string(),
        is_active: true,
        created_by: None,
    };
    let profile = attach_profile(provider, profiles, row).await?;
    info!(profile_id = %profile.id, auth_user_id = %out.user.id, "user registered");
    Ok(SignUpOutcome { user: out.user, session: out.session, profile })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(email: &str, password: &str, pseudo: &str) -> ProvisionRequest {
        ProvisionRequest { email: email.into(), password: password.into(), pseudo: pseudo.into(), ..Default::default() }
    }

    #[test]
    fn validation_rules() {
        assert!(validate(&req("a@b.fr", "secret", "ab")).is_ok());
        assert_eq!(validate(&req("", "secret", "ab")).unwrap_err().code_str(), "missing_fields");
        assert_eq!(validate(&req("a@b.fr", "secret", "  ")).unwrap_err().code_str(), "missing_fields");
        assert_eq!(validate(&req("not-an-email", "secret", "ab")).unwrap_err().code_str(), "invalid_email");
        assert_eq!(validate(&req("a@b.fr", "12345", "ab")).unwrap_err().code_str(), "weak_password");
        assert_eq!(validate(&req("a@b.fr", "12345", "ab")).unwrap_err().http_status(), 400);
    }

    #[test]
    fn blank_optionals_are_dropped() {
        assert_eq!(non_blank(&Some("  ".into())), None);
        assert_eq!(non_blank(&Some(" x ".into())), Some("x".into()));
        assert_eq!(non_blank(&None), None);
    }
}
