use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::journey::project_status::{ProjectRecord, ProjectStatus};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub to: ProjectStatus,
}

/// GET /api/v1/projects/:id
pub async fn handle_get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Json<ProjectRecord> {
    Json(state.projects.get(id))
}

/// POST /api/v1/projects/:id/transition
pub async fn handle_transition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<ProjectRecord>, AppError> {
    let record = state.projects.transition(id, req.to)?;
    Ok(Json(record))
}
