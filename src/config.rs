//! Environment-driven configuration.
//!
//! | variable                        | default  |
//! |---------------------------------|----------|
//! | `BACKOFFICE_HTTP_PORT`          | `7878`   |
//! | `BACKOFFICE_BACKEND`            | `local`  |
//! | `BACKOFFICE_PROVIDER_URL`       | required for `remote` |
//! | `BACKOFFICE_ANON_KEY`           | required for `remote` |
//! | `BACKOFFICE_SERVICE_KEY`        | required for `remote` |
//! | `BACKOFFICE_SEED_ADMIN_EMAIL`   | unset (local only) |
//! | `BACKOFFICE_SEED_ADMIN_PASSWORD`| unset (local only) |

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// In-process auth provider and tables.
    Local,
    /// Hosted auth service + REST database.
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub provider_url: String,
    pub anon_key: String,
    pub service_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub http_port: u16,
    pub backend: Backend,
    pub remote: Option<RemoteSettings>,
    /// (email, password) of a superadmin created at startup in local mode.
    pub seed_admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |k: &str| vars.get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let http_port = match get("BACKOFFICE_HTTP_PORT") {
            Some(p) => p.parse::<u16>().with_context(|| format!("invalid BACKOFFICE_HTTP_PORT '{p}'"))?,
            None => 7878,
        };
        let backend = match get("BACKOFFICE_BACKEND").map(|s| s.to_ascii_lowercase()).as_deref() {
            None | Some("local") => Backend::Local,
            Some("remote") => Backend::Remote,
            Some(other) => return Err(anyhow!("unknown BACKOFFICE_BACKEND '{other}' (expected local or remote)")),
        };
        let remote = match backend {
            Backend::Local => None,
            Backend::Remote => {
                let need = |k: &str| get(k).ok_or_else(|| anyhow!("{k} is required for the remote backend"));
                Some(RemoteSettings {
                    provider_url: need("BACKOFFICE_PROVIDER_URL")?,
                    anon_key: need("BACKOFFICE_ANON_KEY")?,
                    service_key: need("BACKOFFICE_SERVICE_KEY")?,
                })
            }
        };
        let seed_admin = match (get("BACKOFFICE_SEED_ADMIN_EMAIL"), get("BACKOFFICE_SEED_ADMIN_PASSWORD")) {
            (Some(e), Some(p)) => Some((e, p)),
            _ => None,
        };
        Ok(Self { http_port, backend, remote, seed_admin })
    }
}
