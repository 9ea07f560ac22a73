use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde_json::{json, Value};
use tracing::debug;

use super::principal::{AuthUser, NewIdentity, Session, SignUpResponse};
use super::provider::{AuthError, AuthProvider};

/// Client for a hosted GoTrue-style identity service (`/auth/v1/*`).
///
/// Public calls carry the anon key; `admin_*` calls carry the service key.
#[derive(Clone)]
pub struct RemoteAuthProvider {
    base: Url,
    client: reqwest::Client,
    anon_key: String,
    service_key: String,
}

impl RemoteAuthProvider {
    pub fn new(base: &str, anon_key: &str, service_key: &str) -> anyhow::Result<Self> {
        let base = Url::parse(base)?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self { base, client, anon_key: anon_key.to_string(), service_key: service_key.to_string() })
    }

    fn url(&self, path: &str) -> Result<Url, AuthError> {
        self.base.join(path).map_err(|e| AuthError::Transport(format!("invalid auth url: {e}")))
    }

    fn headers(&self, key: &str, bearer: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(key) {
            h.insert("apikey", v);
        }
        if let Ok(v) = HeaderValue::from_str(&format!("Bearer {bearer}")) {
            h.insert(AUTHORIZATION, v);
        }
        h
    }

    fn public_headers(&self) -> HeaderMap { self.headers(&self.anon_key, &self.anon_key) }
    fn user_headers(&self, token: &str) -> HeaderMap { self.headers(&self.anon_key, token) }
    fn admin_headers(&self) -> HeaderMap { self.headers(&self.service_key, &self.service_key) }

    async fn send(req: reqwest::RequestBuilder) -> Result<(StatusCode, Value), AuthError> {
        let resp = req.send().await.map_err(|e| AuthError::Transport(e.to_string()))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| AuthError::Transport(e.to_string()))?;
        let body = if text.trim().is_empty() { Value::Null } else { serde_json::from_str(&text).unwrap_or(Value::String(text)) };
        Ok((status, body))
    }

    fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, AuthError> {
        serde_json::from_value(body).map_err(|e| AuthError::Rejected(format!("unexpected auth payload: {e}")))
    }
}

fn error_text(body: &Value) -> String {
    for key in ["error_description", "msg", "message", "error"] {
        if let Some(s) = body.get(key).and_then(|v| v.as_str()) {
            return s.to_string();
        }
    }
    match body {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Map a non-success auth response onto the error taxonomy.
pub fn classify_error(status: StatusCode, body: &Value) -> AuthError {
    let code = body
        .get("error_code")
        .or_else(|| body.get("code"))
        .or_else(|| body.get("error"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let text = error_text(body);
    let lower = text.to_ascii_lowercase();

    if code == "invalid_grant" || code == "invalid_credentials" || lower.contains("invalid login credentials") {
        return AuthError::InvalidCredentials;
    }
    if code == "email_exists" || code == "user_already_exists" || lower.contains("already been registered") || lower.contains("already registered") {
        return AuthError::AlreadyRegistered;
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN || code == "bad_jwt" {
        return AuthError::InvalidToken;
    }
    if status.is_server_error() {
        return AuthError::Transport(format!("HTTP {status}: {text}"));
    }
    AuthError::Rejected(if text.is_empty() { format!("HTTP {status}") } else { text })
}

#[async_trait]
impl AuthProvider for RemoteAuthProvider {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpResponse, AuthError> {
        let url = self.url("/auth/v1/signup")?;
        let req = self
            .client
            .post(url)
            .headers(self.public_headers())
            .json(&json!({"email": email, "password": password, "data": metadata}));
        let (status, body) = Self::send(req).await?;
        if !status.is_success() {
            return Err(classify_error(status, &body));
        }
        // With auto-confirm the provider answers with a full session; otherwise with the bare user.
        if body.get("access_token").is_some() {
            let session: Session = Self::decode(body)?;
            return Ok(SignUpResponse { user: session.user.clone(), session: Some(session) });
        }
        let user: AuthUser = match body.get("user") {
            Some(u) => Self::decode(u.clone())?,
            None => Self::decode(body)?,
        };
        Ok(SignUpResponse { user, session: None })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let mut url = self.url("/auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let req = self
            .client
            .post(url)
            .headers(self.public_headers())
            .json(&json!({"email": email, "password": password}));
        let (status, body) = Self::send(req).await?;
        if !status.is_success() {
            let err = classify_error(status, &body);
            debug!(%status, error = %err, "password grant refused");
            return Err(err);
        }
        Self::decode(body)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = self.url("/auth/v1/logout")?;
        let req = self.client.post(url).headers(self.user_headers(access_token));
        let (status, body) = Self::send(req).await?;
        if !status.is_success() {
            return Err(classify_error(status, &body));
        }
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let url = self.url("/auth/v1/user")?;
        let req = self.client.get(url).headers(self.user_headers(access_token));
        let (status, body) = Self::send(req).await?;
        if !status.is_success() {
            return Err(classify_error(status, &body));
        }
        Self::decode(body)
    }

    async fn admin_create_user(&self, identity: &NewIdentity) -> Result<AuthUser, AuthError> {
        let url = self.url("/auth/v1/admin/users")?;
        let req = self.client.post(url).headers(self.admin_headers()).json(identity);
        let (status, body) = Self::send(req).await?;
        if !status.is_success() {
            return Err(classify_error(status, &body));
        }
        Self::decode(body)
    }

    async fn admin_delete_user(&self, user_id: &str) -> Result<(), AuthError> {
        let url = self.url(&format!("/auth/v1/admin/users/{user_id}"))?;
        let req = self.client.delete(url).headers(self.admin_headers());
        let (status, body) = Self::send(req).await?;
        if !status.is_success() {
            return Err(classify_error(status, &body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_provider_errors() {
        let bad_grant = json!({"error": "invalid_grant", "error_description": "Invalid login credentials"});
        assert_eq!(classify_error(StatusCode::BAD_REQUEST, &bad_grant), AuthError::InvalidCredentials);

        let newer = json!({"code": 400, "error_code": "invalid_credentials", "msg": "Invalid login credentials"});
        assert_eq!(classify_error(StatusCode::BAD_REQUEST, &newer), AuthError::InvalidCredentials);

        let exists = json!({"code": 422, "msg": "A user with this email address has already been registered"});
        assert_eq!(classify_error(StatusCode::UNPROCESSABLE_ENTITY, &exists), AuthError::AlreadyRegistered);

        let jwt = json!({"msg": "invalid JWT"});
        assert_eq!(classify_error(StatusCode::UNAUTHORIZED, &jwt), AuthError::InvalidToken);

        assert!(matches!(classify_error(StatusCode::BAD_GATEWAY, &Value::Null), AuthError::Transport(_)));
        assert_eq!(
            classify_error(StatusCode::BAD_REQUEST, &json!({"msg": "Password should be at least 6 characters"})),
            AuthError::Rejected("Password should be at least 6 characters".into())
        );
    }
}
