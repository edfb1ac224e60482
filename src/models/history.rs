use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cost::Cost;
use super::project::ProjectStatus;

/// One audit entry in a project's history.
///
/// Entries are immutable once written. The history list is only ever grown
/// at the end and truncated from the front, so entries stay in the order
/// they were recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub description: String,
    #[serde(default)]
    pub changes: Vec<Change>,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_name: String,
}

/// What kind of change an entry records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Created,
    StatusChanged,
    GoalsUpdated,
    CostUpdated,
    GoalCostUpdated,
    Updated,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::StatusChanged => "status_changed",
            Self::GoalsUpdated => "goals_updated",
            Self::CostUpdated => "cost_updated",
            Self::GoalCostUpdated => "goal_cost_updated",
            Self::Updated => "updated",
        }
    }
}

/// A before/after record for one monitored field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    tag = "field",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Change {
    Status {
        from: ProjectStatus,
        to: ProjectStatus,
    },
    /// Sub-goal count changed.
    Subgoals { from: usize, to: usize },
    TotalCost(CostChange),
    TotalGoalsCost(CostChange),
    GoalCost {
        goal_id: String,
        goal_title: String,
        cost: CostChange,
        note: Option<String>,
    },
}

/// A numeric change with raw and display-formatted values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CostChange {
    pub from: Cost,
    pub to: Cost,
    pub difference: Cost,
    pub formatted: FormattedCostChange,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FormattedCostChange {
    pub from: String,
    pub to: String,
    pub difference: String,
}

impl CostChange {
    pub fn new(from: Cost, to: Cost) -> Self {
        let difference = to.saturating_sub(from);
        Self {
            from,
            to,
            difference,
            formatted: FormattedCostChange {
                from: from.display(),
                to: to.display(),
                difference: difference.display_signed(),
            },
        }
    }
}

/// The user on whose behalf a mutation is made.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new("anonymous", "Anonymous")
    }
}
