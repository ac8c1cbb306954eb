//! Operator-initiated deposits over HTTP. Each step presents the session
//! token issued by `start`, so a stale confirm button acts on nothing.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use kassa_core::session::SessionError;
use kassa_types::api::{
    ManualAmountRequest, ManualDecisionRequest, ManualOutcome, ManualPlayerAccepted,
    ManualPlayerRequest, ManualSessionToken, ManualStartRequest, ManualSummary,
};

use crate::AppState;

type SessionRejection = (StatusCode, Json<serde_json::Value>);

fn session_error(e: SessionError) -> SessionRejection {
    let status = match &e {
        SessionError::NoSession => StatusCode::NOT_FOUND,
        SessionError::TokenMismatch | SessionError::WrongStep => StatusCode::CONFLICT,
        SessionError::InvalidPlayerId | SessionError::AmountOutOfRange => StatusCode::BAD_REQUEST,
        SessionError::PlayerRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::DeskUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<ManualStartRequest>,
) -> impl IntoResponse {
    let token = state.manual.start(req.operator_id, req.provider);
    (StatusCode::CREATED, Json(ManualSessionToken { token }))
}

/// Accept the player id after a live desk lookup. Rejections carry the
/// desk's raw reason so the operator can react.
pub async fn submit_player(
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
    Json(req): Json<ManualPlayerRequest>,
) -> Result<Json<ManualPlayerAccepted>, SessionRejection> {
    let player_name = state
        .manual
        .submit_player(req.operator_id, token, &req.player_id)
        .await
        .map_err(session_error)?;
    Ok(Json(ManualPlayerAccepted { player_name }))
}

pub async fn submit_amount(
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
    Json(req): Json<ManualAmountRequest>,
) -> Result<Json<ManualSummary>, SessionRejection> {
    let summary = state
        .manual
        .submit_amount(req.operator_id, token, &req.amount)
        .map_err(session_error)?;
    Ok(Json(ManualSummary {
        provider: summary.provider,
        player_id: summary.player_id,
        player_name: summary.player_name,
        amount: summary.amount,
    }))
}

/// Execute the credit. The session is consumed first, so repeating this
/// request answers 404 instead of moving money twice.
pub async fn confirm(
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
    Json(req): Json<ManualDecisionRequest>,
) -> Result<Json<ManualOutcome>, SessionRejection> {
    let outcome = state
        .manual
        .confirm(req.operator_id, token)
        .await
        .map_err(session_error)?;
    Ok(Json(ManualOutcome {
        success: outcome.success,
        reason: outcome.reason,
    }))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
    Json(req): Json<ManualDecisionRequest>,
) -> Result<StatusCode, SessionRejection> {
    state
        .manual
        .cancel(req.operator_id, token)
        .await
        .map_err(session_error)?;
    Ok(StatusCode::NO_CONTENT)
}
