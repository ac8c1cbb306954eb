use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::error;

use kassa_core::validate;
use kassa_types::api::SetPhoneRequest;

use crate::AppState;

/// Attach a phone number collected by the conversational flow. The only
/// mutation a user row ever sees after creation.
pub async fn set_phone(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<SetPhoneRequest>,
) -> Result<StatusCode, StatusCode> {
    if !validate::valid_phone(&req.phone) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let db = state.db.clone();
    let phone = req.phone.trim().to_string();
    let changed = tokio::task::spawn_blocking(move || db.set_phone(user_id, &phone))
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| {
        error!("phone update failed: {:#}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if changed { Ok(StatusCode::NO_CONTENT) } else { Err(StatusCode::NOT_FOUND) }
}
