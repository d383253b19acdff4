pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::assessment::handlers;
use crate::journey::handlers as journey;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Assessment wizard
        .route(
            "/api/v1/assessment",
            get(handlers::handle_get_assessment).delete(handlers::handle_reset),
        )
        .route("/api/v1/assessment/steps", get(handlers::handle_get_steps))
        .route(
            "/api/v1/assessment/questions",
            get(handlers::handle_get_questions),
        )
        .route("/api/v1/assessment/advance", post(handlers::handle_advance))
        .route("/api/v1/assessment/retreat", post(handlers::handle_retreat))
        .route(
            "/api/v1/assessment/continue-without-saving",
            post(handlers::handle_continue_without_saving),
        )
        .route(
            "/api/v1/assessment/results",
            get(handlers::handle_get_results),
        )
        // Sign-in
        .route(
            "/api/v1/auth/redirect",
            post(handlers::handle_begin_auth_redirect),
        )
        .route(
            "/api/v1/auth/session",
            post(handlers::handle_sign_in).delete(handlers::handle_sign_out),
        )
        // Background sync
        .route("/api/v1/sync/status", get(handlers::handle_sync_status))
        .route(
            "/api/v1/sync/notices/:id",
            delete(handlers::handle_dismiss_notice),
        )
        // Learning journey
        .route("/api/v1/projects/:id", get(journey::handle_get_project))
        .route(
            "/api/v1/projects/:id/transition",
            post(journey::handle_transition),
        )
        .with_state(state)
}
