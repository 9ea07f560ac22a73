use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{scalar_text, Database, DbError, Filter};

/// In-process tables keyed by name. Missing `id`/`created_at` columns are filled on insert.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: RwLock<HashMap<String, Vec<Map<String, Value>>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self { Self::default() }

    /// Number of rows currently stored in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map(|t| t.len()).unwrap_or(0)
    }
}

fn row_matches(row: &Map<String, Value>, filters: &[Filter]) -> bool {
    filters.iter().all(|f| {
        row.get(&f.column).and_then(scalar_text).map(|v| v == f.value).unwrap_or(false)
    })
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, DbError> {
        let tables = self.tables.read();
        let Some(rows) = tables.get(table) else { return Ok(Vec::new()); };
        Ok(rows.iter().filter(|r| row_matches(r, filters)).cloned().map(Value::Object).collect())
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, DbError> {
        let Value::Object(mut obj) = row else {
            return Err(DbError::InvalidRow("row must be a JSON object".into()));
        };
        if !obj.get("id").map(|v| !v.is_null()).unwrap_or(false) {
            obj.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
        }
        if !obj.contains_key("created_at") {
            obj.insert("created_at".into(), Value::String(chrono::Utc::now().to_rfc3339()));
        }
        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_string()).or_default();
        let id = obj.get("id").and_then(scalar_text);
        if rows.iter().any(|r| r.get("id").and_then(scalar_text) == id) {
            return Err(DbError::Status { status: 409, body: format!("duplicate key value for {table}.id") });
        }
        rows.push(obj.clone());
        Ok(Value::Object(obj))
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>, DbError> {
        let Value::Object(patch) = patch else {
            return Err(DbError::InvalidRow("patch must be a JSON object".into()));
        };
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else { return Ok(Vec::new()); };
        let mut out = Vec::new();
        for row in rows.iter_mut().filter(|r| row_matches(r, filters)) {
            for (k, v) in patch.iter() {
                // primary key is immutable
                if k == "id" { continue; }
                row.insert(k.clone(), v.clone());
            }
            out.push(Value::Object(row.clone()));
        }
        Ok(out)
    }
}
