use super::{normalize_name, Project, ProjectStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use ulid::Ulid;
use uuid::Uuid;

#[derive(Debug)]
struct Row {
    owner: Uuid,
    project: Project,
}

/// Project store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    rows: Mutex<Vec<Row>>,
}

impl MemoryProjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Row>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn list(&self, owner: Uuid) -> Result<Vec<Project>, StoreError> {
        let mut projects: Vec<Project> = self
            .lock()
            .iter()
            .filter(|row| row.owner == owner)
            .map(|row| row.project.clone())
            .collect();
        // ULIDs sort by creation time, so they break timestamp ties.
        projects.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(projects)
    }

    async fn insert(&self, owner: Uuid, name: &str) -> Result<Project, StoreError> {
        let project = Project {
            id: Ulid::new().to_string(),
            name: normalize_name(name)?.to_string(),
            created_at: Utc::now(),
        };
        self.lock().push(Row {
            owner,
            project: project.clone(),
        });
        Ok(project)
    }

    async fn delete(&self, owner: Uuid, id: &str) -> Result<(), StoreError> {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|row| !(row.owner == owner && row.project.id == id));
        if rows.len() == before {
            Err(StoreError::NotFound)
        } else {
            Ok(())
        }
    }
}
