use tracing::{debug, warn};

use crate::profiles::ProfileStore;

use super::principal::Session;
use super::provider::{AuthError, AuthProvider};

/// Sign in with either an email or a display handle.
///
/// The identifier is first tried as an email. Only an invalid-credentials
/// refusal triggers the fallback: the handle is looked up in the profile table
/// and the sign-in is retried once with the profile's email. Other provider
/// errors are returned as-is.
pub async fn sign_in_with_identifier(
    provider: &dyn AuthProvider,
    profiles: &ProfileStore,
    identifier: &str,
    password: &str,
) -> Result<Session, AuthError> {
    let identifier = identifier.trim();
    if identifier.is_empty() || password.is_empty() {
        return Err(AuthError::InvalidCredentials);
    }

    match provider.sign_in_with_password(identifier, password).await {
        Ok(session) => return Ok(session),
        Err(AuthError::InvalidCredentials) => {}
        Err(e) => return Err(e),
    }

    let email = match profiles.find_by_pseudo(identifier).await {
        Ok(Some(profile)) => profile.email,
        Ok(None) => return Err(AuthError::InvalidCredentials),
        Err(e) => {
            warn!("handle lookup failed during sign-in: {e}");
            return Err(AuthError::InvalidCredentials);
        }
    };
    debug!(handle = identifier, "retrying sign-in with profile email");
    provider.sign_in_with_password(&email, password).await
}
