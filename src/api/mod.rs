mod handlers;

use axum::{
    routing::{get, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::ProjectService;

pub fn create_router(service: ProjectService) -> Router {
    let api = Router::new()
        // Projects
        .route(
            "/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/projects/{id}",
            get(handlers::get_project)
                .put(handlers::update_project)
                .patch(handlers::update_project)
                .delete(handlers::delete_project),
        )
        .route("/projects/{id}/history", get(handlers::get_project_history))
        // Sub-goals
        .route(
            "/projects/{id}/subgoals/order",
            put(handlers::reorder_subgoals),
        )
        .route(
            "/projects/{id}/subgoals/{subgoal_id}/cost",
            put(handlers::update_subgoal_cost),
        )
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(service)
}
