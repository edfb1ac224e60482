use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{apply, ProjectStore, SetFields, StoreError};
use crate::models::*;

/// In-process document store. Documents are cloned in and out, so callers
/// only ever see point-in-time snapshots.
#[derive(Clone, Default)]
pub struct MemoryStore {
    projects: Arc<Mutex<HashMap<Uuid, Project>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        let projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(projects.get(&id).cloned())
    }

    async fn list(&self, status: Option<ProjectStatus>) -> Result<Vec<Project>, StoreError> {
        let projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<Project> = projects
            .values()
            .filter(|p| status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn insert(&self, project: &Project) -> Result<(), StoreError> {
        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        if projects.contains_key(&project.id) {
            return Err(StoreError::Internal(format!(
                "project {} already exists",
                project.id
            )));
        }
        projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        fields: SetFields,
        history: Vec<HistoryEntry>,
    ) -> Result<Option<Project>, StoreError> {
        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(project) = projects.get_mut(&id) else {
            return Ok(None);
        };
        apply(project, fields, history, Utc::now());
        Ok(Some(project.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(projects.remove(&id).is_some())
    }
}
