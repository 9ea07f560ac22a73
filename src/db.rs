//!
//! backoffice table access
//! -----------------------
//! Thin abstraction over the hosted database's REST table API. Rows travel as
//! JSON objects; callers narrow them into typed records (`profiles`, `records`).
//!
//! Two backends are provided:
//! - `RestDatabase`: PostgREST-style HTTP client (`/rest/v1/<table>`).
//! - `MemoryDatabase`: in-process tables used for local mode and tests.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod memory;
pub mod rest;

pub use memory::MemoryDatabase;
pub use rest::RestDatabase;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database unreachable: {0}")]
    Transport(String),
    #[error("database returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected database payload: {0}")]
    Decode(String),
    #[error("{0}")]
    InvalidRow(String),
}

/// Column equality predicate (`column = value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self { column: column.into(), value: value.into() }
    }
}

#[async_trait]
pub trait Database: Send + Sync {
    /// All rows of `table` matching every filter, in storage order.
    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, DbError>;

    /// Insert one row and return it as stored (with generated columns filled).
    async fn insert(&self, table: &str, row: Value) -> Result<Value, DbError>;

    /// Merge `patch` into every matching row; returns the updated rows.
    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>, DbError>;
}

/// First matching row, if any.
pub async fn select_one(db: &dyn Database, table: &str, filters: &[Filter]) -> Result<Option<Value>, DbError> {
    let mut rows = db.select(table, filters).await?;
    if rows.is_empty() { return Ok(None); }
    Ok(Some(rows.swap_remove(0)))
}

/// Render a JSON scalar the way it is compared against a filter value.
pub(crate) fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
