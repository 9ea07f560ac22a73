//! Dashboard collections: appointments, stock, deliveries, categories,
//! promotions and financials. Rows are free-form JSON objects keyed by `id`.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::db::{select_one, Database, Filter};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Appointments,
    Stock,
    Deliveries,
    Categories,
    Promotions,
    Financials,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Appointments,
        Collection::Stock,
        Collection::Deliveries,
        Collection::Categories,
        Collection::Promotions,
        Collection::Financials,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Collection::Appointments => "appointments",
            Collection::Stock => "stock",
            Collection::Deliveries => "deliveries",
            Collection::Categories => "categories",
            Collection::Promotions => "promotions",
            Collection::Financials => "financials",
        }
    }
}

impl FromStr for Collection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Collection::ALL
            .into_iter()
            .find(|c| c.table() == key)
            .ok_or_else(|| AppError::NotFound { code: "unknown_collection".into(), message: format!("unknown collection '{s}'") })
    }
}

#[derive(Clone)]
pub struct RecordStore {
    db: Arc<dyn Database>,
}

impl RecordStore {
    pub fn new(db: Arc<dyn Database>) -> Self { Self { db } }

    pub async fn list(&self, c: Collection) -> AppResult<Vec<Value>> {
        Ok(self.db.select(c.table(), &[]).await?)
    }

    pub async fn get(&self, c: Collection, id: &str) -> AppResult<Value> {
        select_one(self.db.as_ref(), c.table(), &[Filter::eq("id", id)])
            .await?
            .ok_or_else(|| not_found(c, id))
    }

    pub async fn create(&self, c: Collection, row: Value) -> AppResult<Value> {
        if !row.is_object() {
            return Err(AppError::user("invalid_row", "request body must be a JSON object"));
        }
        Ok(self.db.insert(c.table(), row).await?)
    }

    pub async fn update(&self, c: Collection, id: &str, patch: Value) -> AppResult<Value> {
        let Some(obj) = patch.as_object() else {
            return Err(AppError::user("invalid_row", "request body must be a JSON object"));
        };
        if obj.is_empty() {
            return Err(AppError::user("empty_patch", "nothing to update"));
        }
        let mut rows = self.db.update(c.table(), &[Filter::eq("id", id)], patch).await?;
        if rows.is_empty() { return Err(not_found(c, id)); }
        Ok(rows.swap_remove(0))
    }
}

fn not_found(c: Collection, id: &str) -> AppError {
    AppError::NotFound { code: "not_found".into(), message: format!("{} '{id}' not found", c.table()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDatabase;
    use serde_json::json;

    #[test]
    fn collection_names_round_trip() {
        for c in Collection::ALL {
            assert_eq!(c.table().parse::<Collection>().unwrap(), c);
        }
        assert_eq!("Stock".parse::<Collection>().unwrap(), Collection::Stock);
        assert_eq!("users".parse::<Collection>().unwrap_err().http_status(), 404);
    }

    #[tokio::test]
    async fn create_get_update() {
        let store = RecordStore::new(Arc::new(MemoryDatabase::new()));
        let row = store.create(Collection::Promotions, json!({"code": "SPRING", "percent": 10})).await.unwrap();
        let id = row["id"].as_str().unwrap().to_string();

        let fetched = store.get(Collection::Promotions, &id).await.unwrap();
        assert_eq!(fetched["code"], "SPRING");

        let updated = store.update(Collection::Promotions, &id, json!({"percent": 15})).await.unwrap();
        assert_eq!(updated["percent"], 15);
        assert_eq!(store.list(Collection::Promotions).await.unwrap().len(), 1);
        assert!(store.list(Collection::Deliveries).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_bad_bodies_and_unknown_ids() {
        let store = RecordStore::new(Arc::new(MemoryDatabase::new()));
        assert_eq!(store.create(Collection::Stock, json!("flour")).await.unwrap_err().http_status(), 400);
        assert_eq!(store.get(Collection::Stock, "nope").await.unwrap_err().http_status(), 404);
        assert_eq!(store.update(Collection::Stock, "nope", json!({"q": 1})).await.unwrap_err().http_status(), 404);
        assert_eq!(store.update(Collection::Stock, "nope", json!({})).await.unwrap_err().code_str(), "empty_patch");
    }
}
