//! Identity: auth provider access, session state, role resolution and sign-in.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod provider;
mod local;
mod remote;
mod session;
pub mod roles;
mod signin;

pub use principal::{AuthUser, NewIdentity, Session, SignUpResponse};
pub use provider::{AuthError, AuthProvider};
pub use local::{hash_password, verify_password, LocalAuthProvider};
pub use remote::{classify_error, RemoteAuthProvider};
pub use session::{AuthEvent, SessionManager};
pub use roles::{get_user_role, is_admin, Role, ADMIN_ROLES};
pub use signin::sign_in_with_identifier;
