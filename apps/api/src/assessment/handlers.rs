use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assessment::service::{AssessmentSnapshot, ResultsView};
use crate::errors::AppError;
use crate::models::identity::Identity;
use crate::models::session::SessionPatch;
use crate::persistence::{RestoreSource, SyncStatus};
use crate::state::AppState;
use crate::wizard::questions::{Question, QUESTIONS};
use crate::wizard::steps::{total_estimated_minutes, StepDescriptor, STEPS};
use crate::wizard::AdvanceOutcome;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepsResponse {
    pub steps: Vec<StepDescriptor>,
    pub total_estimated_minutes: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResponse {
    pub current_step: u8,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub user_id: String,
    pub restored_from: RestoreSource,
    pub current_step: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub user_id: String,
    pub token: String,
}

/// GET /api/v1/assessment/steps
pub async fn handle_get_steps() -> Json<StepsResponse> {
    Json(StepsResponse {
        steps: STEPS.to_vec(),
        total_estimated_minutes: total_estimated_minutes(),
    })
}

/// GET /api/v1/assessment/questions
pub async fn handle_get_questions() -> Json<Vec<Question>> {
    Json(QUESTIONS.to_vec())
}

/// GET /api/v1/assessment
pub async fn handle_get_assessment(State(state): State<AppState>) -> Json<AssessmentSnapshot> {
    Json(state.assessment.lock().await.snapshot())
}

/// POST /api/v1/assessment/advance
/// A failed step rule is reported in the body, not as an HTTP error.
pub async fn handle_advance(
    State(state): State<AppState>,
    Json(patch): Json<SessionPatch>,
) -> Json<AdvanceOutcome> {
    Json(state.assessment.lock().await.advance(patch).await)
}

/// POST /api/v1/assessment/retreat
pub async fn handle_retreat(State(state): State<AppState>) -> Json<StepResponse> {
    let current_step = state.assessment.lock().await.retreat();
    Json(StepResponse { current_step })
}

/// POST /api/v1/assessment/continue-without-saving
pub async fn handle_continue_without_saving(
    State(state): State<AppState>,
) -> Json<AdvanceOutcome> {
    Json(state.assessment.lock().await.continue_without_saving())
}

/// DELETE /api/v1/assessment
pub async fn handle_reset(State(state): State<AppState>) -> StatusCode {
    state.assessment.lock().await.reset_all();
    StatusCode::NO_CONTENT
}

/// GET /api/v1/assessment/results
pub async fn handle_get_results(
    State(state): State<AppState>,
) -> Result<Json<ResultsView>, AppError> {
    state
        .assessment
        .lock()
        .await
        .results()
        .await
        .map(Json)
        .ok_or_else(|| {
            AppError::Validation("Results are available once the assessment is complete".to_string())
        })
}

/// POST /api/v1/auth/redirect
pub async fn handle_begin_auth_redirect(
    State(state): State<AppState>,
) -> Result<Json<StepResponse>, AppError> {
    let current_step = state.assessment.lock().await.begin_auth_redirect()?;
    Ok(Json(StepResponse { current_step }))
}

/// POST /api/v1/auth/session
pub async fn handle_sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, AppError> {
    if req.user_id.trim().is_empty() || req.token.trim().is_empty() {
        return Err(AppError::Validation(
            "userId and token are required".to_string(),
        ));
    }

    let mut assessment = state.assessment.lock().await;
    let restored_from = assessment
        .sign_in(Identity {
            user_id: req.user_id.clone(),
            token: req.token,
        })
        .await;
    Ok(Json(SignInResponse {
        user_id: req.user_id,
        restored_from,
        current_step: assessment.snapshot().current_step,
    }))
}

/// DELETE /api/v1/auth/session
pub async fn handle_sign_out(State(state): State<AppState>) -> StatusCode {
    state.assessment.lock().await.sign_out();
    StatusCode::NO_CONTENT
}

/// GET /api/v1/sync/status
pub async fn handle_sync_status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.sync.status())
}

/// DELETE /api/v1/sync/notices/:id
pub async fn handle_dismiss_notice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sync.dismiss_notice(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Notice {id} not found")))
    }
}
