//! Document store adapters.
//!
//! The engine talks to storage only through [`ProjectStore`]. Every call is
//! one round trip and is atomic for the single project document it touches;
//! nothing spans documents.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::engine::ledger;
use crate::models::*;

/// Storage failure, classified by whether retrying can help.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Storage is reachable but momentarily refusing work (locked, busy).
    #[error("store busy: {0}")]
    Busy(String),

    #[error("store timed out: {0}")]
    Timeout(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored document could not be decoded or encoded.
    #[error("corrupt document for project {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },

    #[error("store failure: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy(_) | Self::Timeout(_) | Self::Unavailable(_))
    }
}

/// Field assignments for [`ProjectStore::conditional_update`].
///
/// `None` leaves the stored value untouched. For the optional text fields,
/// `Some(None)` clears the stored value. `updated_at` is always stamped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetFields {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub client: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    pub subgoals: Option<Vec<Subgoal>>,
    pub total_goals_cost: Option<Cost>,
    pub total_cost: Option<Cost>,
    pub images: Option<Vec<ImageRef>>,
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Project>, StoreError>;

    /// All projects ordered by name, optionally narrowed to one status.
    async fn list(&self, status: Option<ProjectStatus>) -> Result<Vec<Project>, StoreError>;

    async fn insert(&self, project: &Project) -> Result<(), StoreError>;

    /// Sets `fields`, stamps `updated_at`, and appends `history` in order with
    /// bounded truncation, all in one atomic step. `Ok(None)` if the project
    /// does not exist.
    async fn conditional_update(
        &self,
        id: Uuid,
        fields: SetFields,
        history: Vec<HistoryEntry>,
    ) -> Result<Option<Project>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Applies a write to a decoded document. Shared by every adapter so that the
/// set-then-append semantics cannot drift between backends.
pub(crate) fn apply(
    project: &mut Project,
    fields: SetFields,
    history: Vec<HistoryEntry>,
    now: DateTime<Utc>,
) {
    let SetFields {
        name,
        description,
        client,
        location,
        status,
        subgoals,
        total_goals_cost,
        total_cost,
        images,
    } = fields;

    if let Some(name) = name {
        project.name = name;
    }
    if let Some(description) = description {
        project.description = description;
    }
    if let Some(client) = client {
        project.client = client;
    }
    if let Some(location) = location {
        project.location = location;
    }
    if let Some(status) = status {
        project.status = status;
    }
    if let Some(subgoals) = subgoals {
        project.subgoals = subgoals;
    }
    if let Some(total_goals_cost) = total_goals_cost {
        project.total_goals_cost = total_goals_cost;
    }
    if let Some(total_cost) = total_cost {
        project.total_cost = total_cost;
    }
    if let Some(images) = images {
        project.images = images;
    }
    for entry in history {
        ledger::append(&mut project.history, entry);
    }
    project.updated_at = now;
}
