use std::fmt::{Display, Formatter};

use tracing::{error, warn};

use crate::profiles::ProfileStore;

/// Role strings that grant access to the administration screens.
pub const ADMIN_ROLES: [&str; 3] = ["admin", "superadmin", "manager"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    SuperAdmin,
    Manager,
    Other(String),
}

impl Role {
    /// Case-insensitive parse; anything outside the allow-list is `Other`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "superadmin" => Role::SuperAdmin,
            "manager" => Role::Manager,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn is_admin_tier(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin | Role::Manager)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::SuperAdmin => "superadmin",
            Role::Manager => "manager",
            Role::Other(s) => s.as_str(),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Raw role string of the profile linked to `user_id`.
///
/// `None` covers every failure: absent id, missing row, null role, and query
/// errors (logged, then swallowed). One profile read per call.
pub async fn get_user_role(store: &ProfileStore, user_id: Option<&str>) -> Option<String> {
    let user_id = user_id.map(str::trim).filter(|s| !s.is_empty())?;
    match store.find_by_auth_user_id(user_id).await {
        Ok(Some(profile)) => profile.role,
        Ok(None) => {
            warn!(user_id, "no profile row for user");
            None
        }
        Err(e) => {
            error!(user_id, "role lookup failed: {e}");
            None
        }
    }
}

/// True only when the user's role is admin, superadmin or manager.
/// Lookup failures collapse to `false`, indistinguishable from a denial.
pub async fn is_admin(store: &ProfileStore, user_id: Option<&str>) -> bool {
    get_user_role(store, user_id)
        .await
        .map(|r| Role::parse(&r).is_admin_tier())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Role::parse("ADMIN"), Role::Admin);
        assert_eq!(Role::parse(" SuperAdmin "), Role::SuperAdmin);
        assert_eq!(Role::parse("Manager"), Role::Manager);
        assert_eq!(Role::parse("cashier"), Role::Other("cashier".into()));
        assert!(!Role::parse("super admin").is_admin_tier());
        assert!(ADMIN_ROLES.iter().all(|r| Role::parse(r).is_admin_tier()));
        assert_eq!(Role::SuperAdmin.to_string(), "superadmin");
    }
}
