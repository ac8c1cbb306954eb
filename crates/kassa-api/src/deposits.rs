use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use kassa_core::deposit::{self, DepositError, PAYMENT_WINDOW_SECS};
use kassa_types::api::{AttachNoticeRequest, CreateDepositRequest, DepositCreated};

use crate::AppState;

pub async fn create_deposit(
    State(state): State<AppState>,
    Json(req): Json<CreateDepositRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let limits = state.deposit_limits;

    // Run blocking ledger work off the async runtime
    let created = tokio::task::spawn_blocking(move || {
        db.ensure_user(req.user_id, None, None)?;
        deposit::create_deposit_request(
            &db,
            req.user_id,
            req.provider,
            &req.player_id,
            req.amount,
            limits,
        )
        .map_err(|e| e.into())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(deposit_status)?;

    Ok((
        StatusCode::CREATED,
        Json(DepositCreated {
            payment_id: created.payment_id,
            provider: created.provider,
            player_id: created.player_id,
            amount_to_pay: created.amount_to_pay,
            requested_amount: created.requested_amount,
            card_number: created.card_number,
            expires_in_secs: PAYMENT_WINDOW_SECS,
            notice_text: created.notice_text,
        }),
    ))
}

/// Record where the payment notice was shown so the reconciler can strip
/// its keyboard after settlement. Older database files without the
/// notice columns simply report `attached: false`.
pub async fn attach_notice(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    Json(req): Json<AttachNoticeRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let attached = tokio::task::spawn_blocking(move || {
        db.set_payment_notice(&payment_id, req.chat_id, req.message_id)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({ "attached": attached })))
}

fn deposit_status(e: anyhow::Error) -> StatusCode {
    match e.downcast_ref::<DepositError>() {
        Some(DepositError::InvalidPlayerId) | Some(DepositError::AmountOutOfRange) => {
            StatusCode::BAD_REQUEST
        }
        Some(DepositError::NoActiveCards) => StatusCode::SERVICE_UNAVAILABLE,
        _ => {
            error!("deposit request failed: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
