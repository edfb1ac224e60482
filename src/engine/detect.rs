//! Decides whether an update is worth recording in the history.

use crate::models::*;

/// Outcome of comparing a patch against the stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub significant: bool,
    pub diff: Diff,
}

/// The monitored fields a patch actually changes, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub changes: Vec<Change>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The single entry type recorded for this diff.
    ///
    /// Status beats sub-goal count, which beats cost.
    pub fn kind(&self) -> HistoryKind {
        let has = |pred: fn(&Change) -> bool| self.changes.iter().any(pred);
        if has(|c| matches!(c, Change::Status { .. })) {
            HistoryKind::StatusChanged
        } else if has(|c| matches!(c, Change::Subgoals { .. })) {
            HistoryKind::GoalsUpdated
        } else if has(|c| matches!(c, Change::TotalCost(_))) {
            HistoryKind::CostUpdated
        } else {
            HistoryKind::Updated
        }
    }
}

/// Compares `patch` against `old`.
///
/// Only three fields are audited:
/// - `status`, when it differs;
/// - `subgoals`, when the *count* differs (reorders and per-item edits of a
///   same-length list are not audited);
/// - `total_cost`, when it differs numerically.
///
/// Anything else in the patch may still be written, but never produces a
/// history entry on its own.
pub fn detect(old: &Project, patch: &ProjectPatch) -> Detection {
    let mut changes = Vec::new();

    if let Some(status) = patch.status {
        if status != old.status {
            changes.push(Change::Status {
                from: old.status,
                to: status,
            });
        }
    }

    if let Some(subgoals) = &patch.subgoals {
        if subgoals.len() != old.subgoals.len() {
            changes.push(Change::Subgoals {
                from: old.subgoals.len(),
                to: subgoals.len(),
            });
        }
    }

    if let Some(total_cost) = patch.total_cost {
        if total_cost != old.total_cost {
            changes.push(Change::TotalCost(CostChange::new(old.total_cost, total_cost)));
        }
    }

    Detection {
        significant: !changes.is_empty(),
        diff: Diff { changes },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn project() -> Project {
        let now = Utc::now();
        Project {
            id: Uuid::new_v4(),
            name: "Casa Norte".to_string(),
            description: None,
            client: None,
            location: None,
            status: ProjectStatus::Planning,
            original_cost: Cost(100_000),
            total_goals_cost: Cost(20_000),
            total_cost: Cost(120_000),
            subgoals: vec![goal("a", 20_000)],
            images: vec![],
            history: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn goal(id: &str, cost: i64) -> Subgoal {
        Subgoal {
            id: id.to_string(),
            title: format!("Goal {id}"),
            goal_cost: Cost(cost),
            status: SubgoalStatus::Pending,
        }
    }

    fn input(id: &str, cost: i64) -> SubgoalInput {
        SubgoalInput::from(&goal(id, cost))
    }

    #[test]
    fn empty_patch_is_not_significant() {
        let detection = detect(&project(), &ProjectPatch::default());
        assert!(!detection.significant);
        assert!(detection.diff.is_empty());
    }

    #[test]
    fn same_status_is_not_significant() {
        let patch = ProjectPatch {
            status: Some(ProjectStatus::Planning),
            ..Default::default()
        };
        assert!(!detect(&project(), &patch).significant);
    }

    #[test]
    fn status_change_is_recorded() {
        let patch = ProjectPatch {
            status: Some(ProjectStatus::InProgress),
            ..Default::default()
        };
        let detection = detect(&project(), &patch);
        assert!(detection.significant);
        assert_eq!(
            detection.diff.changes,
            vec![Change::Status {
                from: ProjectStatus::Planning,
                to: ProjectStatus::InProgress
            }]
        );
        assert_eq!(detection.diff.kind(), HistoryKind::StatusChanged);
    }

    #[test]
    fn non_audited_fields_are_ignored() {
        let patch = ProjectPatch {
            name: Some("Casa Sur".to_string()),
            description: Some(Some("renamed".to_string())),
            ..Default::default()
        };
        assert!(!detect(&project(), &patch).significant);
    }

    #[test]
    fn same_length_subgoal_edit_is_not_significant() {
        let patch = ProjectPatch {
            subgoals: Some(vec![input("a", 99_000)]),
            ..Default::default()
        };
        assert!(!detect(&project(), &patch).significant);
    }

    #[test]
    fn subgoal_count_change_is_recorded() {
        let patch = ProjectPatch {
            subgoals: Some(vec![input("a", 20_000), input("b", 0)]),
            ..Default::default()
        };
        let detection = detect(&project(), &patch);
        assert_eq!(detection.diff.changes, vec![Change::Subgoals { from: 1, to: 2 }]);
        assert_eq!(detection.diff.kind(), HistoryKind::GoalsUpdated);
    }

    #[test]
    fn cost_change_is_recorded_with_difference() {
        let patch = ProjectPatch {
            total_cost: Some(Cost(150_000)),
            ..Default::default()
        };
        let detection = detect(&project(), &patch);
        let [Change::TotalCost(change)] = detection.diff.changes.as_slice() else {
            panic!("expected a single cost change, got {:?}", detection.diff.changes);
        };
        assert_eq!(change.from, Cost(120_000));
        assert_eq!(change.to, Cost(150_000));
        assert_eq!(change.difference, Cost(30_000));
        assert_eq!(detection.diff.kind(), HistoryKind::CostUpdated);
    }

    #[test]
    fn status_takes_priority_when_several_rules_fire() {
        let patch = ProjectPatch {
            status: Some(ProjectStatus::OnHold),
            subgoals: Some(vec![]),
            total_cost: Some(Cost(100_000)),
            ..Default::default()
        };
        let detection = detect(&project(), &patch);
        assert_eq!(detection.diff.changes.len(), 3);
        assert_eq!(detection.diff.kind(), HistoryKind::StatusChanged);
    }

    #[test]
    fn empty_diff_falls_back_to_updated() {
        assert_eq!(Diff::default().kind(), HistoryKind::Updated);
    }
}
