use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::engine::ProjectService;
use crate::error::ProjectError;
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

/// Map an engine error to a status code and client-safe message.
///
/// Storage failures are logged in full server-side; clients only see a
/// generic message for those.
fn error_response(e: ProjectError) -> (StatusCode, String) {
    match &e {
        ProjectError::InvalidId(_) | ProjectError::Validation(_) => {
            tracing::warn!("Validation error: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        ProjectError::NotFound(_) | ProjectError::SubgoalNotFound { .. } => {
            (StatusCode::NOT_FOUND, e.to_string())
        }
        ProjectError::ConcurrencyTimeout { .. } => {
            tracing::warn!("Lock contention: {}", e);
            (StatusCode::CONFLICT, e.to_string())
        }
        ProjectError::TransientStore(_) => {
            tracing::error!("Store unavailable: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Storage temporarily unavailable".to_string(),
            )
        }
        ProjectError::PermanentStore(_) => {
            tracing::error!("Internal error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

/// The acting user, taken from `x-user-id` / `x-user-name`. Session handling
/// happens upstream; requests without the headers act anonymously.
fn actor(headers: &HeaderMap) -> Actor {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    match header("x-user-id") {
        Some(id) => {
            let name = header("x-user-name").unwrap_or_else(|| id.clone());
            Actor::new(id, name)
        }
        None => Actor::anonymous(),
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Projects
// ============================================================

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub status: Option<String>,
}

pub async fn list_projects(
    State(service): State<ProjectService>,
    Query(query): Query<ListProjectsQuery>,
) -> Result<Json<Vec<Project>>, (StatusCode, String)> {
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => Some(ProjectStatus::from_str(s).ok_or((
            StatusCode::BAD_REQUEST,
            format!("Unknown status: {s}"),
        ))?),
    };
    service
        .list_projects(status)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn get_project(
    State(service): State<ProjectService>,
    Path(id): Path<String>,
) -> Result<Json<Project>, (StatusCode, String)> {
    service.get_project(&id).await.map(Json).map_err(error_response)
}

pub async fn get_project_history(
    State(service): State<ProjectService>,
    Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, (StatusCode, String)> {
    service
        .get_project(&id)
        .await
        .map(|p| Json(p.history))
        .map_err(error_response)
}

pub async fn create_project(
    State(service): State<ProjectService>,
    headers: HeaderMap,
    Json(input): Json<CreateProjectInput>,
) -> Result<(StatusCode, Json<Project>), (StatusCode, String)> {
    service
        .create_project(input, &actor(&headers))
        .await
        .map(|p| (StatusCode::CREATED, Json(p)))
        .map_err(error_response)
}

pub async fn update_project(
    State(service): State<ProjectService>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<ProjectPatch>,
) -> Result<Json<Project>, (StatusCode, String)> {
    service
        .update_project(&id, patch, &actor(&headers))
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_project(
    State(service): State<ProjectService>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    service
        .delete_project(&id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

// ============================================================
// Sub-goals
// ============================================================

pub async fn update_subgoal_cost(
    State(service): State<ProjectService>,
    Path((id, subgoal_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(input): Json<UpdateGoalCostInput>,
) -> Result<Json<Project>, (StatusCode, String)> {
    service
        .update_subgoal_cost(&id, &subgoal_id, input.goal_cost, input.note, &actor(&headers))
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn reorder_subgoals(
    State(service): State<ProjectService>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<ReorderSubgoalsInput>,
) -> Result<Json<Project>, (StatusCode, String)> {
    service
        .reorder_subgoals(&id, &input.subgoal_ids, &actor(&headers))
        .await
        .map(Json)
        .map_err(error_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn actor_falls_back_to_anonymous() {
        assert_eq!(actor(&HeaderMap::new()), Actor::anonymous());
    }

    #[test]
    fn actor_reads_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("u42"));
        headers.insert("x-user-name", HeaderValue::from_static("Marta"));
        assert_eq!(actor(&headers), Actor::new("u42", "Marta"));
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let (status, body) = error_response(ProjectError::PermanentStore(
            crate::store::StoreError::Internal("disk I/O at /var/db".into()),
        ));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("/var/db"));
    }
}
