use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity record owned by the auth provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

/// Token bundle issued by the provider on sign-in. Only read here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    pub user: AuthUser,
}

fn default_token_type() -> String { "bearer".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignUpResponse {
    pub user: AuthUser,
    /// Absent when the provider requires email confirmation first.
    #[serde(default)]
    pub session: Option<Session>,
}

/// Admin-side identity creation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub email_confirm: bool,
    #[serde(default)]
    pub user_metadata: Value,
}
