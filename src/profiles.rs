//! User profiles: the application-level record kept next to each auth identity.
//! Profiles live in the `users` table and are addressed by the identity id
//! (`auth_user_id`), the email, or the display handle (`pseudo`).

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{select_one, Database, DbError, Filter};

pub const PROFILE_TABLE: &str = "users";

fn default_active() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    pub auth_user_id: String,
    pub email: String,
    #[serde(default)]
    pub pseudo: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub salary: Option<f64>,
    #[serde(default)]
    pub hire_date: Option<NaiveDate>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// Integer and uuid primary keys are both in use depending on how the table was created.
fn id_text<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid profile id: {other}"))),
    }
}

/// Row written by provisioning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewProfile {
    pub auth_user_id: String,
    pub email: String,
    pub pseudo: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_by: Option<String>,
}

/// Fields an admin form may change. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pseudo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hire_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool { self == &ProfilePatch::default() }
}

/// Typed access to the profile table.
#[derive(Clone)]
pub struct ProfileStore {
    db: Arc<dyn Database>,
}

impl ProfileStore {
    pub fn new(db: Arc<dyn Database>) -> Self { Self { db } }

    async fn find_by(&self, column: &str, value: &str) -> Result<Option<Profile>, DbError> {
        let row = select_one(self.db.as_ref(), PROFILE_TABLE, &[Filter::eq(column, value)]).await?;
        row.map(decode).transpose()
    }

    pub async fn find_by_auth_user_id(&self, auth_user_id: &str) -> Result<Option<Profile>, DbError> {
        self.find_by("auth_user_id", auth_user_id).await
    }

    /// Emails are stored lowercased by provisioning; the lookup normalizes the same way.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, DbError> {
        self.find_by("email", &normalize_email(email)).await
    }

    pub async fn find_by_pseudo(&self, pseudo: &str) -> Result<Option<Profile>, DbError> {
        self.find_by("pseudo", pseudo).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Profile>, DbError> {
        self.find_by("id", id).await
    }

    pub async fn list(&self) -> Result<Vec<Profile>, DbError> {
        let rows = self.db.select(PROFILE_TABLE, &[]).await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn insert(&self, profile: &NewProfile) -> Result<Profile, DbError> {
        let row = serde_json::to_value(profile).map_err(|e| DbError::Decode(e.to_string()))?;
        decode(self.db.insert(PROFILE_TABLE, row).await?)
    }

    pub async fn update(&self, id: &str, patch: &ProfilePatch) -> Result<Option<Profile>, DbError> {
        let body = serde_json::to_value(patch).map_err(|e| DbError::Decode(e.to_string()))?;
        let mut rows = self.db.update(PROFILE_TABLE, &[Filter::eq("id", id)], body).await?;
        if rows.is_empty() { return Ok(None); }
        decode(rows.swap_remove(0)).map(Some)
    }
}

fn decode(row: Value) -> Result<Profile, DbError> {
    serde_json::from_value(row).map_err(|e| DbError::Decode(format!("profile row: {e}")))
}

pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }
