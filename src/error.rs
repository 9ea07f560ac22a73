//! Unified application error model and mapping helpers.
//! This module provides the common error enum returned by HTTP handlers and the
//! provisioning/collection services, along with the mapping to HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::db::DbError;
use crate::identity::AuthError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    Upstream { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn upstream<S: Into<String>>(code: S, msg: S) -> Self { AppError::Upstream { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::Upstream { .. } => 502,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.message() }))).into_response()
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidRow(msg) => AppError::UserInput { code: "invalid_row".into(), message: msg },
            DbError::Status { status, body } if (400..500).contains(&status) => {
                AppError::UserInput { code: "db_rejected".into(), message: body }
            }
            other => AppError::Upstream { code: "db_error".into(), message: other.to_string() },
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::auth("invalid_credentials", "Invalid login credentials"),
            AuthError::InvalidToken => AppError::auth("invalid_token", "Session expired or invalid"),
            AuthError::AlreadyRegistered => AppError::user("email_exists", "A user with this email address has already been registered"),
            AuthError::Rejected(msg) => AppError::UserInput { code: "auth_rejected".into(), message: msg },
            AuthError::Transport(msg) => AppError::Upstream { code: "auth_unreachable".into(), message: msg },
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::UserInput { code: "invalid_body".into(), message: rejection.body_text() }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}
