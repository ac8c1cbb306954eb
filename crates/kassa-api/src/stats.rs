use axum::{Json, extract::State, http::StatusCode};
use tracing::error;

use kassa_types::api::StatsResponse;
use kassa_types::models::PaymentStatus;

use crate::AppState;

/// Reporting aggregates. Reads are not linearizable with concurrent
/// writers; a payment settling mid-request may or may not be counted.
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, StatusCode> {
    let db = state.db.clone();
    let stats = tokio::task::spawn_blocking(move || -> anyhow::Result<StatsResponse> {
        Ok(StatsResponse {
            users: db.count_users()?,
            pending_payments: db.count_payments_by_status(PaymentStatus::Pending)?,
            completed_payments: db.count_payments_by_status(PaymentStatus::Completed)?,
            completed_today: db.sum_completed_today()?,
        })
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| {
        error!("stats query failed: {:#}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(stats))
}
