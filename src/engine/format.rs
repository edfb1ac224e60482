//! Human-readable history descriptions.

use crate::models::*;

/// Describes an entry. Deterministic for a given kind and change list.
pub fn describe(kind: HistoryKind, changes: &[Change]) -> String {
    match kind {
        HistoryKind::Created => "Project created".to_string(),
        _ if changes.is_empty() => "Project updated".to_string(),
        _ => changes
            .iter()
            .map(describe_change)
            .collect::<Vec<_>>()
            .join("; "),
    }
}

fn describe_change(change: &Change) -> String {
    match change {
        Change::Status { from, to } => {
            format!("Status changed from {} to {}", from.label(), to.label())
        }
        Change::Subgoals { from, to } => {
            format!("Sub-goals changed from {} to {}", from, to)
        }
        Change::TotalCost(cost) => format!("Total cost {}", describe_cost(cost)),
        Change::TotalGoalsCost(cost) => format!("Sub-goal total {}", describe_cost(cost)),
        Change::GoalCost {
            goal_title,
            cost,
            note,
            ..
        } => {
            let mut text = format!("Cost of \"{}\" {}", goal_title, describe_cost(cost));
            if let Some(note) = note.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                text.push_str(": ");
                text.push_str(note);
            }
            text
        }
    }
}

fn describe_cost(cost: &CostChange) -> String {
    format!(
        "changed from {} to {} ({})",
        cost.formatted.from, cost.formatted.to, cost.formatted.difference
    )
}
