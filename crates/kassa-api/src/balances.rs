use axum::{Json, extract::State, http::StatusCode};

use kassa_types::api::BalanceRequest;

use crate::AppState;

/// Kick off the cash-desk balance fan-out. The handler only acknowledges;
/// the rendered report reaches the operator through the relay once the
/// desks have answered (or the wait window has elapsed).
pub async fn request_report(
    State(state): State<AppState>,
    Json(req): Json<BalanceRequest>,
) -> StatusCode {
    state.balances.request(state.notifier.clone(), req.refresh);
    StatusCode::ACCEPTED
}
