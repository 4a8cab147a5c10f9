//! Project store capability.
//!
//! Projects are owned by a user id. Every call is scoped to the owner, so a
//! visitor can only ever see or touch their own rows.

mod memory;
mod postgrest;

pub use memory::MemoryProjectStore;
pub use postgrest::PostgrestProjectStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Accept both text and numeric primary keys.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected project id: {other}"
        ))),
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),
    #[error("Project not found")]
    NotFound,
    #[error("{0}")]
    Backend(String),
}

/// Trim and check a project name before it reaches a store.
///
/// # Errors
/// Returns `StoreError::Validation` when the name is blank.
pub fn normalize_name(name: &str) -> Result<&str, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        Err(StoreError::Validation("Project name is required".to_string()))
    } else {
        Ok(name)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Projects owned by `owner`, newest first.
    async fn list(&self, owner: Uuid) -> Result<Vec<Project>, StoreError>;

    async fn insert(&self, owner: Uuid, name: &str) -> Result<Project, StoreError>;

    async fn delete(&self, owner: Uuid, id: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed() {
        assert_eq!(normalize_name("  alpha "), Ok("alpha"));
        assert_eq!(
            normalize_name("   "),
            Err(StoreError::Validation("Project name is required".to_string()))
        );
    }

    #[test]
    fn project_ids_accept_numbers() -> Result<(), serde_json::Error> {
        let project: Project = serde_json::from_str(
            r#"{"id": 42, "name": "alpha", "created_at": "2024-05-01T10:00:00+00:00"}"#,
        )?;
        assert_eq!(project.id, "42");

        let project: Project = serde_json::from_str(
            r#"{"id": "7c0e", "name": "beta", "created_at": "2024-05-01T10:00:00Z"}"#,
        )?;
        assert_eq!(project.id, "7c0e");
        Ok(())
    }
}
