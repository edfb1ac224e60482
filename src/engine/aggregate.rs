//! Derived cost totals.

use crate::error::{ProjectError, Result};
use crate::models::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregates {
    pub total_goals_cost: Cost,
    pub total_cost: Cost,
}

impl Aggregates {
    /// Whether the stored totals of `project` already equal these.
    pub fn matches(&self, project: &Project) -> bool {
        project.total_goals_cost == self.total_goals_cost && project.total_cost == self.total_cost
    }

    /// Changes needed to move `project`'s stored totals to these.
    pub fn changes_from(&self, project: &Project) -> Vec<Change> {
        let mut changes = Vec::new();
        if project.total_goals_cost != self.total_goals_cost {
            changes.push(Change::TotalGoalsCost(CostChange::new(
                project.total_goals_cost,
                self.total_goals_cost,
            )));
        }
        if project.total_cost != self.total_cost {
            changes.push(Change::TotalCost(CostChange::new(
                project.total_cost,
                self.total_cost,
            )));
        }
        changes
    }
}

/// `total_goals_cost = Σ goal_cost`, `total_cost = original_cost + total_goals_cost`.
///
/// Pure and idempotent. Malformed stored costs were already coerced to zero
/// when the document was decoded. Totals that do not fit in an `i64` are a
/// validation error.
pub fn recalculate(original_cost: Cost, subgoals: &[Subgoal]) -> Result<Aggregates> {
    let out_of_range = || ProjectError::validation("cost total out of range");
    let total_goals_cost =
        Cost::checked_sum(subgoals.iter().map(|g| g.goal_cost)).ok_or_else(out_of_range)?;
    let total_cost = original_cost.checked_add(total_goals_cost).ok_or_else(out_of_range)?;
    Ok(Aggregates {
        total_goals_cost,
        total_cost,
    })
}
