//! The project mutation engine.
//!
//! Every mutation follows the same shape:
//!
//! ```text
//! RetryPolicy::run
//!   └─ MutationCoordinator::with_lock(id)
//!        ├─ read snapshot
//!        ├─ detect::detect            (is it worth auditing?)
//!        ├─ aggregate::recalculate    (cost paths)
//!        └─ store write               (fields, totals, history entries)
//! ```
//!
//! Each mutation ends in exactly one store write, so a failure leaves the
//! stored document as it was.
//!
//! Because the whole sequence is re-run on a transient failure, every step
//! re-reads the current document rather than trusting an earlier read.

pub mod aggregate;
pub mod coordinator;
pub mod detect;
pub mod format;
pub mod ledger;
pub mod retry;

pub use coordinator::MutationCoordinator;
pub use ledger::HISTORY_LIMIT;
pub use retry::{RetryPolicy, Retryable};

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::error::{ProjectError, Result};
use crate::media::{LoggingMediaStore, MediaStore};
use crate::models::*;
use crate::store::{ProjectStore, SetFields};

/// Entry point for all project reads and writes.
#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn ProjectStore>,
    media: Arc<dyn MediaStore>,
    locks: Arc<MutationCoordinator>,
    retry: RetryPolicy,
}

impl ProjectService {
    pub fn new(store: Arc<dyn ProjectStore>, config: &LedgerConfig) -> Self {
        Self {
            store,
            media: Arc::new(LoggingMediaStore),
            locks: Arc::new(MutationCoordinator::new(config.lock_timeout)),
            retry: config.retry.clone(),
        }
    }

    pub fn with_media(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = media;
        self
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.locks
    }

    // ============================================================
    // Reads
    // ============================================================

    pub async fn get_project(&self, id: &str) -> Result<Project> {
        let id = parse_id(id)?;
        self.retry
            .run("get_project", move || async move {
                self.store.get(id).await?.ok_or(ProjectError::NotFound(id))
            })
            .await
    }

    pub async fn list_projects(&self, status: Option<ProjectStatus>) -> Result<Vec<Project>> {
        self.retry
            .run("list_projects", move || async move {
                self.store.list(status).await.map_err(ProjectError::from)
            })
            .await
    }

    // ============================================================
    // Creation and deletion
    // ============================================================

    pub async fn create_project(&self, input: CreateProjectInput, actor: &Actor) -> Result<Project> {
        validate_name(&input.name)?;
        validate_cost("originalCost", input.original_cost)?;
        validate_subgoals(&input.subgoals)?;

        let now = Utc::now();
        let subgoals = materialize(input.subgoals, &[]);
        let totals = aggregate::recalculate(input.original_cost, &subgoals)?;
        let project = Project {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            description: input.description,
            client: input.client,
            location: input.location,
            status: input.status.unwrap_or_default(),
            original_cost: input.original_cost,
            total_goals_cost: totals.total_goals_cost,
            total_cost: totals.total_cost,
            subgoals,
            images: input.images,
            history: vec![ledger::created(actor, now)],
            created_at: now,
            updated_at: now,
        };

        let project = &project;
        self.retry
            .run("create_project", move || async move {
                self.store.insert(project).await.map_err(ProjectError::from)
            })
            .await?;

        tracing::info!(project_id = %project.id, name = %project.name, "project created");
        Ok(project.clone())
    }

    /// Deletes the project document, then asks the media collaborator to drop
    /// its images. Media failures are logged; the project is already gone.
    pub async fn delete_project(&self, id: &str) -> Result<()> {
        let id = parse_id(id)?;
        let images = self
            .retry
            .run("delete_project", move || {
                self.locks.with_lock(id, move || async move {
                    let project = self.store.get(id).await?.ok_or(ProjectError::NotFound(id))?;
                    if !self.store.delete(id).await? {
                        return Err(ProjectError::NotFound(id));
                    }
                    Ok(project.images)
                })
            })
            .await?;

        tracing::info!(project_id = %id, images = images.len(), "project deleted");
        if !images.is_empty() {
            if let Err(e) = self.media.remove(&images).await {
                tracing::warn!(project_id = %id, error = %e, "failed to remove project media");
            }
        }
        Ok(())
    }

    // ============================================================
    // Updates
    // ============================================================

    /// Applies `patch` to the project.
    ///
    /// A history entry is appended only when the patch changes the status,
    /// the number of sub-goals, or the total cost. A replaced sub-goal list
    /// always has its cost totals recomputed in the same write.
    pub async fn update_project(&self, id: &str, patch: ProjectPatch, actor: &Actor) -> Result<Project> {
        let id = parse_id(id)?;
        validate_patch(&patch)?;

        let (patch, actor) = (&patch, actor);
        self.retry
            .run("update_project", move || {
                self.locks.with_lock(id, move || async move {
                    let current = self.load(id).await?;
                    self.commit_patch(current, patch, actor).await
                })
            })
            .await
    }

    /// Changes one sub-goal's cost and brings the project totals in line.
    ///
    /// The new cost, the recomputed totals, and the `goal_cost_updated` and
    /// `cost_updated` entries land in a single store write. Nothing is written
    /// when neither the cost nor the stored totals would change.
    pub async fn update_subgoal_cost(
        &self,
        id: &str,
        subgoal_id: &str,
        new_cost: Cost,
        note: Option<String>,
        actor: &Actor,
    ) -> Result<Project> {
        let id = parse_id(id)?;
        validate_cost("goalCost", new_cost)?;
        if subgoal_id.trim().is_empty() {
            return Err(ProjectError::validation("sub-goal id is required"));
        }

        let note = note.as_deref();
        self.retry
            .run("update_subgoal_cost", move || {
                self.locks.with_lock(id, move || async move {
                    let project = self.load(id).await?;
                    self.write_goal_cost(project, subgoal_id, new_cost, note, actor)
                        .await
                })
            })
            .await
    }

    /// Puts the sub-goals in the given order. Goes through the general update
    /// path; a reorder keeps the count, so it is not audited.
    pub async fn reorder_subgoals(&self, id: &str, ordered_ids: &[String], actor: &Actor) -> Result<Project> {
        let id = parse_id(id)?;
        let distinct = ordered_ids.iter().collect::<HashSet<_>>().len();
        if distinct != ordered_ids.len() {
            return Err(ProjectError::validation("sub-goal order lists an id twice"));
        }

        self.retry
            .run("reorder_subgoals", move || {
                self.locks.with_lock(id, move || async move {
                    let current = self.load(id).await?;
                    let reordered = reorder(&current, ordered_ids)?;
                    let patch = ProjectPatch {
                        subgoals: Some(reordered.iter().map(SubgoalInput::from).collect()),
                        ..Default::default()
                    };
                    self.commit_patch(current, &patch, actor).await
                })
            })
            .await
    }

    // ============================================================
    // Steps (run under the project lock)
    // ============================================================

    async fn load(&self, id: Uuid) -> Result<Project> {
        self.store.get(id).await?.ok_or(ProjectError::NotFound(id))
    }

    async fn commit_patch(&self, current: Project, patch: &ProjectPatch, actor: &Actor) -> Result<Project> {
        let id = current.id;
        let subgoals = patch
            .subgoals
            .clone()
            .map(|inputs| materialize(inputs, &current.subgoals));

        let totals = aggregate::recalculate(
            current.original_cost,
            subgoals.as_deref().unwrap_or(&current.subgoals),
        )?;
        if let Some(expected) = patch.total_cost {
            if expected != totals.total_cost {
                return Err(ProjectError::validation(format!(
                    "totalCost {} does not match originalCost + sub-goal costs ({})",
                    expected, totals.total_cost
                )));
            }
        }

        let detection = detect::detect(&current, patch);
        let cost_affecting = subgoals.is_some() || patch.total_cost.is_some();

        let fields = SetFields {
            name: patch.name.as_ref().map(|n| n.trim().to_string()),
            description: patch.description.clone(),
            client: patch.client.clone(),
            location: patch.location.clone(),
            status: patch.status,
            subgoals,
            total_goals_cost: cost_affecting.then_some(totals.total_goals_cost),
            total_cost: cost_affecting.then_some(totals.total_cost),
            images: patch.images.clone(),
        };
        let entry = detection.significant.then(|| {
            let kind = detection.diff.kind();
            ledger::entry(kind, detection.diff.changes, actor, Utc::now())
        });
        let kind = entry.as_ref().map(|e| e.kind.as_str());

        let updated = self
            .store
            .conditional_update(id, fields, entry.into_iter().collect())
            .await?
            .ok_or(ProjectError::NotFound(id))?;

        match kind {
            Some(kind) => tracing::info!(project_id = %id, kind, user = %actor.id, "project updated"),
            None => tracing::debug!(project_id = %id, "project updated without significant change"),
        }
        Ok(updated)
    }

    async fn write_goal_cost(
        &self,
        project: Project,
        subgoal_id: &str,
        new_cost: Cost,
        note: Option<&str>,
        actor: &Actor,
    ) -> Result<Project> {
        let id = project.id;
        let goal = project
            .subgoal(subgoal_id)
            .ok_or_else(|| ProjectError::SubgoalNotFound {
                project_id: id,
                subgoal_id: subgoal_id.to_string(),
            })?;

        let now = Utc::now();
        let mut history = Vec::with_capacity(2);
        let mut fields = SetFields::default();

        if goal.goal_cost != new_cost {
            let change = Change::GoalCost {
                goal_id: goal.id.clone(),
                goal_title: goal.title.clone(),
                cost: CostChange::new(goal.goal_cost, new_cost),
                note: note.map(str::to_string),
            };
            history.push(ledger::entry(HistoryKind::GoalCostUpdated, vec![change], actor, now));
            fields.subgoals = Some(
                project
                    .subgoals
                    .iter()
                    .map(|g| {
                        let mut g = g.clone();
                        if g.id == subgoal_id {
                            g.goal_cost = new_cost;
                        }
                        g
                    })
                    .collect(),
            );
        }

        let totals = aggregate::recalculate(
            project.original_cost,
            fields.subgoals.as_deref().unwrap_or(&project.subgoals),
        )?;
        if !totals.matches(&project) {
            let changes = totals.changes_from(&project);
            history.push(ledger::entry(HistoryKind::CostUpdated, changes, actor, now));
            fields.total_goals_cost = Some(totals.total_goals_cost);
            fields.total_cost = Some(totals.total_cost);
        }

        if history.is_empty() {
            tracing::debug!(project_id = %id, subgoal_id, "sub-goal cost unchanged");
            return Ok(project);
        }

        let updated = self
            .store
            .conditional_update(id, fields, history)
            .await?
            .ok_or(ProjectError::NotFound(id))?;

        tracing::info!(
            project_id = %id,
            subgoal_id,
            cost = new_cost.cents(),
            total_cost = totals.total_cost.cents(),
            "sub-goal cost updated"
        );
        Ok(updated)
    }
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).map_err(|_| ProjectError::InvalidId(id.to_string()))
}

/// Turns caller sub-goals into stored ones. Known ids are kept, missing ids
/// are generated, and omitted statuses fall back to the stored status.
fn materialize(inputs: Vec<SubgoalInput>, existing: &[Subgoal]) -> Vec<Subgoal> {
    inputs
        .into_iter()
        .map(|input| {
            let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let stored_status = existing.iter().find(|g| g.id == id).map(|g| g.status);
            Subgoal {
                status: input.status.or(stored_status).unwrap_or_default(),
                title: input.title.trim().to_string(),
                goal_cost: input.goal_cost,
                id,
            }
        })
        .collect()
}

fn reorder(project: &Project, ordered_ids: &[String]) -> Result<Vec<Subgoal>> {
    if ordered_ids.len() != project.subgoals.len() {
        return Err(ProjectError::validation(format!(
            "sub-goal order names {} sub-goals, project has {}",
            ordered_ids.len(),
            project.subgoals.len()
        )));
    }
    ordered_ids
        .iter()
        .map(|sid| {
            project
                .subgoal(sid)
                .cloned()
                .ok_or_else(|| ProjectError::SubgoalNotFound {
                    project_id: project.id,
                    subgoal_id: sid.clone(),
                })
        })
        .collect()
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ProjectError::validation("name must not be empty"));
    }
    Ok(())
}

fn validate_cost(field: &str, cost: Cost) -> Result<()> {
    if cost.is_negative() {
        return Err(ProjectError::validation(format!("{field} must not be negative")));
    }
    Ok(())
}

fn validate_subgoals(subgoals: &[SubgoalInput]) -> Result<()> {
    let mut seen = HashSet::new();
    for goal in subgoals {
        if goal.title.trim().is_empty() {
            return Err(ProjectError::validation("sub-goal title must not be empty"));
        }
        validate_cost("goalCost", goal.goal_cost)?;
        if let Some(id) = &goal.id {
            if id.trim().is_empty() {
                return Err(ProjectError::validation("sub-goal id must not be blank"));
            }
            if !seen.insert(id.as_str()) {
                return Err(ProjectError::validation(format!("duplicate sub-goal id {id:?}")));
            }
        }
    }
    Ok(())
}

fn validate_patch(patch: &ProjectPatch) -> Result<()> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    if let Some(subgoals) = &patch.subgoals {
        validate_subgoals(subgoals)?;
    }
    if let Some(total_cost) = patch.total_cost {
        validate_cost("totalCost", total_cost)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: Option<&str>, title: &str, cost: i64) -> SubgoalInput {
        SubgoalInput {
            id: id.map(str::to_string),
            title: title.to_string(),
            goal_cost: Cost(cost),
            status: None,
        }
    }

    #[test]
    fn parse_id_rejects_malformed_ids() {
        assert!(matches!(parse_id("not-a-uuid"), Err(ProjectError::InvalidId(_))));
        assert!(matches!(parse_id(""), Err(ProjectError::InvalidId(_))));
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn materialize_keeps_known_ids_and_statuses() {
        let existing = vec![Subgoal {
            id: "a".to_string(),
            title: "Old".to_string(),
            goal_cost: Cost(5),
            status: SubgoalStatus::Completed,
        }];
        let goals = materialize(
            vec![input(Some("a"), " Walls ", 10), input(None, "Roof", 20)],
            &existing,
        );
        assert_eq!(goals[0].id, "a");
        assert_eq!(goals[0].title, "Walls");
        assert_eq!(goals[0].status, SubgoalStatus::Completed);
        assert!(Uuid::parse_str(&goals[1].id).is_ok());
        assert_eq!(goals[1].status, SubgoalStatus::Pending);
    }

    #[test]
    fn subgoal_validation_catches_duplicates_and_blanks() {
        assert!(validate_subgoals(&[input(Some("a"), "x", 1), input(Some("a"), "y", 1)]).is_err());
        assert!(validate_subgoals(&[input(None, "  ", 1)]).is_err());
        assert!(validate_subgoals(&[input(None, "x", -1)]).is_err());
        assert!(validate_subgoals(&[input(Some("a"), "x", 1), input(None, "y", 0)]).is_ok());
    }
}
