use axum::{Json, extract::State, http::StatusCode};

use kassa_types::api::RelayNotification;

use crate::AppState;

/// Webhook for the relay channel. Acknowledge immediately; the
/// reconciler parses inline and does everything else in a background
/// task. An unparseable or unmatched text is a silent no-op by design.
pub async fn relay_notification(
    State(state): State<AppState>,
    Json(req): Json<RelayNotification>,
) -> StatusCode {
    state.reconciler.handle_notification(&req.text);
    StatusCode::ACCEPTED
}
