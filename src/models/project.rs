use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cost::{self, Cost};
use super::history::HistoryEntry;

/// A construction or architecture project tracked by the ledger.
///
/// The whole project, including its sub-goals and audit history, is stored
/// as one document. `total_goals_cost` and `total_cost` are derived values:
/// after any cost-affecting mutation `total_cost == original_cost + total_goals_cost`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub client: Option<String>,
    pub location: Option<String>,
    pub status: ProjectStatus,
    /// Budget fixed at creation. Ordinary updates never change it.
    #[serde(default, deserialize_with = "cost::lenient")]
    pub original_cost: Cost,
    #[serde(default, deserialize_with = "cost::lenient")]
    pub total_goals_cost: Cost,
    #[serde(default, deserialize_with = "cost::lenient")]
    pub total_cost: Cost,
    #[serde(default)]
    pub subgoals: Vec<Subgoal>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    /// Audit trail, oldest first, never longer than [`HISTORY_LIMIT`](crate::engine::HISTORY_LIMIT).
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn subgoal(&self, subgoal_id: &str) -> Option<&Subgoal> {
        self.subgoals.iter().find(|g| g.id == subgoal_id)
    }
}

/// The lifecycle status of a project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Waiting,
    Planning,
    InProgress,
    Completed,
    OnHold,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Planning => "planning",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::OnHold => "on-hold",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(Self::Waiting),
            "planning" => Some(Self::Planning),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "on-hold" => Some(Self::OnHold),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Label used in history descriptions.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Waiting => "Waiting",
            Self::Planning => "Planning",
            Self::InProgress => "In progress",
            Self::Completed => "Completed",
            Self::OnHold => "On hold",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// A costed milestone within a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subgoal {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "cost::lenient")]
    pub goal_cost: Cost,
    #[serde(default)]
    pub status: SubgoalStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SubgoalStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// Reference to an image held by the media service. Opaque to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub url: String,
    pub public_id: String,
}

/// Sub-goal as supplied by a caller. A missing `id` means a new sub-goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgoalInput {
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub goal_cost: Cost,
    pub status: Option<SubgoalStatus>,
}

impl From<&Subgoal> for SubgoalInput {
    fn from(goal: &Subgoal) -> Self {
        Self {
            id: Some(goal.id.clone()),
            title: goal.title.clone(),
            goal_cost: goal.goal_cost,
            status: Some(goal.status),
        }
    }
}

/// Input for creating a new project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectInput {
    pub name: String,
    pub description: Option<String>,
    pub client: Option<String>,
    pub location: Option<String>,
    /// Initial status. Defaults to `Waiting` if not specified.
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub original_cost: Cost,
    #[serde(default)]
    pub subgoals: Vec<SubgoalInput>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

/// Input for updating an existing project. All fields are optional for partial updates.
///
/// `subgoals` replaces the whole list. `total_cost` is the total the caller
/// expects after the update; it must agree with the derived total.
///
/// `description`, `client` and `location` distinguish an absent key (keep)
/// from an explicit `null` (clear).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    pub name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub client: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub location: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    pub subgoals: Option<Vec<SubgoalInput>>,
    pub total_cost: Option<Cost>,
    pub images: Option<Vec<ImageRef>>,
}

/// Input for changing the cost of one sub-goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGoalCostInput {
    pub goal_cost: Cost,
    pub note: Option<String>,
}

/// Input for reordering sub-goals. Must name every existing sub-goal exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderSubgoalsInput {
    pub subgoal_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            ProjectStatus::Waiting,
            ProjectStatus::Planning,
            ProjectStatus::InProgress,
            ProjectStatus::Completed,
            ProjectStatus::OnHold,
            ProjectStatus::Cancelled,
        ] {
            assert_eq!(ProjectStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ProjectStatus::from_str("done"), None);
    }

    #[test]
    fn stored_subgoal_with_bad_cost_reads_as_zero() {
        let goal: Subgoal = serde_json::from_value(json!({
            "id": "a",
            "title": "Foundation",
            "goalCost": "n/a"
        }))
        .unwrap();
        assert_eq!(goal.goal_cost, Cost::ZERO);
        assert_eq!(goal.status, SubgoalStatus::Pending);
    }

    #[test]
    fn patch_rejects_non_numeric_cost() {
        let parsed = serde_json::from_value::<ProjectPatch>(json!({ "totalCost": "lots" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn patch_tells_null_apart_from_absent() {
        let patch: ProjectPatch =
            serde_json::from_value(json!({ "location": null, "client": "Grupo Delta" })).unwrap();
        assert_eq!(patch.location, Some(None));
        assert_eq!(patch.client, Some(Some("Grupo Delta".to_string())));
        assert_eq!(patch.description, None);
    }
}
