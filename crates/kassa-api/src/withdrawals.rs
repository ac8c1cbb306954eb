//! Withdrawal lifecycle. Requests are created by payers; approval and
//! completion are operator actions only — nothing here moves a withdrawal
//! forward automatically.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use kassa_core::{render, validate};
use kassa_types::api::{CompleteWithdrawalRequest, CreateWithdrawalRequest, WithdrawalCreated};
use kassa_types::models::{NewWithdrawal, User, Withdrawal, WithdrawalStatus};

use crate::AppState;

fn internal(e: anyhow::Error) -> StatusCode {
    error!("withdrawal storage error: {:#}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

fn join_error(e: tokio::task::JoinError) -> StatusCode {
    error!("spawn_blocking join error: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

pub async fn create_withdrawal(
    State(state): State<AppState>,
    Json(req): Json<CreateWithdrawalRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if !validate::valid_player_id(&req.player_id)
        || !validate::valid_card_number(&req.card_number)
        || !validate::valid_code(&req.code)
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    let db = state.db.clone();
    let (id, withdrawal, user) = tokio::task::spawn_blocking(
        move || -> anyhow::Result<(i64, Option<Withdrawal>, Option<User>)> {
            db.ensure_user(req.user_id, None, None)?;
            let id = db.add_withdrawal(&NewWithdrawal {
                user_id: req.user_id,
                provider: req.provider,
                player_id: req.player_id.trim().to_string(),
                card_number: req.card_number.trim().replace([' ', '-'], ""),
                code: req.code.trim().to_string(),
            })?;
            Ok((id, db.get_withdrawal(id)?, db.get_user(req.user_id)?))
        },
    )
    .await
    .map_err(join_error)?
    .map_err(internal)?;

    // The operator learns about the new request out of band; the response
    // does not wait for the relay.
    if let Some(withdrawal) = withdrawal {
        let notifier = state.notifier.clone();
        tokio::spawn(async move {
            notifier
                .operator(&render::withdrawal_operator_alert(&withdrawal, user.as_ref()))
                .await;
        });
    }

    Ok((StatusCode::CREATED, Json(WithdrawalCreated { id })))
}

pub async fn pending(State(state): State<AppState>) -> Result<Json<Vec<Withdrawal>>, StatusCode> {
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.pending_withdrawals())
        .await
        .map_err(join_error)?
        .map_err(internal)?;
    Ok(Json(rows))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let db = state.db.clone();
    let changed =
        tokio::task::spawn_blocking(move || db.update_withdrawal_status(id, WithdrawalStatus::Approved))
            .await
            .map_err(join_error)?
            .map_err(internal)?;
    if changed { Ok(StatusCode::NO_CONTENT) } else { Err(StatusCode::NOT_FOUND) }
}

/// Operator marks the money as sent. The amount is recorded when the
/// operator resolved one via a desk lookup; the payer and the channel
/// notifications tolerate it staying unresolved.
pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CompleteWithdrawalRequest>,
) -> Result<Json<Withdrawal>, StatusCode> {
    let db = state.db.clone();
    let updated = tokio::task::spawn_blocking(
        move || -> anyhow::Result<Option<(Withdrawal, Option<User>)>> {
            if let Some(amount) = req.amount {
                db.set_withdrawal_amount(id, amount)?;
            }
            if !db.update_withdrawal_status(id, WithdrawalStatus::Completed)? {
                return Ok(None);
            }
            match db.get_withdrawal(id)? {
                None => Ok(None),
                Some(w) => {
                    let user = db.get_user(w.user_id)?;
                    Ok(Some((w, user)))
                }
            }
        },
    )
    .await
    .map_err(join_error)?
    .map_err(internal)?;

    let Some((withdrawal, user)) = updated else {
        return Err(StatusCode::NOT_FOUND);
    };

    let notifier = state.notifier.clone();
    let payer_text = render::withdrawal_completed_payer(&withdrawal);
    let channel_text = render::withdrawal_channel_summary(&withdrawal, user.as_ref());
    let payer_id = withdrawal.user_id;
    tokio::spawn(async move {
        notifier.payer(payer_id, &payer_text).await;
        notifier.channel(&channel_text).await;
    });

    Ok(Json(withdrawal))
}

pub async fn fail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let db = state.db.clone();
    let row = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<Withdrawal>> {
        if !db.update_withdrawal_status(id, WithdrawalStatus::Failed)? {
            return Ok(None);
        }
        db.get_withdrawal(id)
    })
    .await
    .map_err(join_error)?
    .map_err(internal)?;

    let Some(withdrawal) = row else {
        return Err(StatusCode::NOT_FOUND);
    };

    let notifier = state.notifier.clone();
    tokio::spawn(async move {
        notifier
            .payer(
                withdrawal.user_id,
                "The withdrawal could not be completed. Please contact support.",
            )
            .await;
    });

    Ok(StatusCode::NO_CONTENT)
}
