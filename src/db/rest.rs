use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, Url};
use serde_json::Value;

use super::{Database, DbError, Filter};

/// PostgREST-style client: `GET/POST/PATCH {base}/rest/v1/{table}` with `col=eq.value` filters.
///
/// Requests are sent with the service key so row-level policies do not hide
/// rows from the back office.
#[derive(Clone)]
pub struct RestDatabase {
    base: Url,
    client: reqwest::Client,
    api_key: String,
}

impl RestDatabase {
    pub fn new(base: &str, api_key: &str) -> anyhow::Result<Self> {
        let base = Url::parse(base)?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self { base, client, api_key: api_key.to_string() })
    }

    fn table_url(&self, table: &str) -> Result<Url, DbError> {
        self.base
            .join(&format!("/rest/v1/{table}"))
            .map_err(|e| DbError::Transport(format!("invalid table url: {e}")))
    }

    fn headers(&self) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(&self.api_key) {
            h.insert("apikey", v);
        }
        if let Ok(v) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            h.insert(AUTHORIZATION, v);
        }
        h
    }

    fn with_filters(req: RequestBuilder, filters: &[Filter]) -> RequestBuilder {
        let pairs: Vec<(String, String)> = filters
            .iter()
            .map(|f| (f.column.clone(), format!("eq.{}", f.value)))
            .collect();
        req.query(&pairs)
    }

    async fn rows(resp: reqwest::Response) -> Result<Vec<Value>, DbError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DbError::Status { status: status.as_u16(), body });
        }
        let val: Value = resp.json().await.map_err(|e| DbError::Decode(e.to_string()))?;
        match val {
            Value::Array(rows) => Ok(rows),
            Value::Object(_) => Ok(vec![val]),
            other => Err(DbError::Decode(format!("expected rows, got {other}"))),
        }
    }
}

#[async_trait]
impl Database for RestDatabase {
    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, DbError> {
        let url = self.table_url(table)?;
        let req = self.client.get(url).headers(self.headers()).query(&[("select", "*")]);
        let resp = Self::with_filters(req, filters)
            .send()
            .await
            .map_err(|e| DbError::Transport(e.to_string()))?;
        Self::rows(resp).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, DbError> {
        if !row.is_object() {
            return Err(DbError::InvalidRow("row must be a JSON object".into()));
        }
        let url = self.table_url(table)?;
        let resp = self
            .client
            .post(url)
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| DbError::Transport(e.to_string()))?;
        let mut rows = Self::rows(resp).await?;
        if rows.is_empty() {
            return Err(DbError::Decode("insert returned no representation".into()));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>, DbError> {
        if !patch.is_object() {
            return Err(DbError::InvalidRow("patch must be a JSON object".into()));
        }
        let url = self.table_url(table)?;
        let req = self
            .client
            .patch(url)
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .json(&patch);
        let resp = Self::with_filters(req, filters)
            .send()
            .await
            .map_err(|e| DbError::Transport(e.to_string()))?;
        Self::rows(resp).await
    }
}
