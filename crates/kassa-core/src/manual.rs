//! Operator-initiated deposits. The flow never touches notification
//! parsing or the payments table: the operator walks provider → player →
//! amount → confirm, and only the confirm step moves money — once.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use kassa_providers::ProviderGateway;
use kassa_relay::Notifier;
use kassa_types::models::Provider;
use kassa_types::provider::{CreditResult, PlayerLookupResult};
use uuid::Uuid;

use crate::render;
use crate::session::{ManualState, SessionError, SessionStore, SESSION_TTL};
use crate::validate;

/// Outcome of a confirmed manual deposit, also reported through the
/// notifier.
#[derive(Debug, Clone)]
pub struct ManualOutcome {
    pub success: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ManualSummary {
    pub provider: Provider,
    pub player_id: String,
    pub player_name: String,
    pub amount: Decimal,
}

pub struct ManualDeposits {
    gateway: Arc<dyn ProviderGateway>,
    notifier: Notifier,
    sessions: SessionStore,
    limits: (Decimal, Decimal),
}

impl ManualDeposits {
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        notifier: Notifier,
        limits: (Decimal, Decimal),
    ) -> Self {
        Self {
            gateway,
            notifier,
            sessions: SessionStore::new(SESSION_TTL),
            limits,
        }
    }

    pub fn start(&self, operator_id: i64, provider: Provider) -> Uuid {
        self.sessions.begin(operator_id, provider)
    }

    /// Validate the player id format, then against a live desk lookup.
    /// Returns the player's display name on acceptance.
    pub async fn submit_player(
        &self,
        operator_id: i64,
        token: Uuid,
        player_id: &str,
    ) -> Result<String, SessionError> {
        let ManualState::AwaitingPlayerId { provider } = self.sessions.state(operator_id, token)?
        else {
            return Err(SessionError::WrongStep);
        };
        if !validate::valid_player_id(player_id) {
            return Err(SessionError::InvalidPlayerId);
        }

        let player_id = player_id.trim();
        match self.gateway.find_player(provider, player_id).await {
            PlayerLookupResult::Found { name, .. } => {
                self.sessions.advance(
                    operator_id,
                    token,
                    ManualState::AwaitingAmount {
                        provider,
                        player_id: player_id.to_string(),
                        player_name: name.clone(),
                    },
                )?;
                Ok(name)
            }
            PlayerLookupResult::NotFound { reason } => Err(SessionError::PlayerRejected(reason)),
            PlayerLookupResult::Unavailable { reason } => Err(SessionError::DeskUnavailable(reason)),
        }
    }

    pub fn submit_amount(
        &self,
        operator_id: i64,
        token: Uuid,
        amount_text: &str,
    ) -> Result<ManualSummary, SessionError> {
        let ManualState::AwaitingAmount {
            provider,
            player_id,
            player_name,
        } = self.sessions.state(operator_id, token)?
        else {
            return Err(SessionError::WrongStep);
        };

        let (min, max) = self.limits;
        let amount =
            validate::parse_amount(amount_text, min, max).ok_or(SessionError::AmountOutOfRange)?;

        self.sessions.advance(
            operator_id,
            token,
            ManualState::AwaitingConfirmation {
                provider,
                player_id: player_id.clone(),
                player_name: player_name.clone(),
                amount,
            },
        )?;
        Ok(ManualSummary {
            provider,
            player_id,
            player_name,
            amount,
        })
    }

    /// Execute the credit, synchronously, exactly once. The session is
    /// consumed before the call goes out, so a duplicate confirm finds no
    /// session instead of a second credit.
    pub async fn confirm(&self, operator_id: i64, token: Uuid) -> Result<ManualOutcome, SessionError> {
        if !matches!(
            self.sessions.state(operator_id, token)?,
            ManualState::AwaitingConfirmation { .. }
        ) {
            return Err(SessionError::WrongStep);
        }
        let ManualState::AwaitingConfirmation {
            provider,
            player_id,
            amount,
            ..
        } = self.sessions.take(operator_id, token)?
        else {
            return Err(SessionError::WrongStep);
        };

        let result = self.gateway.credit(provider, &player_id, amount).await;
        match result {
            CreditResult::Success => {
                info!("manual deposit executed: {} {} to {}", provider, amount, player_id);
                let balance = self.gateway.get_balance(provider).await;
                let text = render::manual_success(provider, &player_id, amount, &balance);
                self.notifier.operator(&text).await;
                self.notifier.channel(&text).await;
                Ok(ManualOutcome {
                    success: true,
                    reason: None,
                })
            }
            CreditResult::Failure { reason } => {
                let text = render::manual_failure(provider, &player_id, amount, &reason);
                self.notifier.operator(&text).await;
                Ok(ManualOutcome {
                    success: false,
                    reason: Some(reason),
                })
            }
        }
    }

    /// Throw the session away. No ledger interaction, no credit.
    pub async fn cancel(&self, operator_id: i64, token: Uuid) -> Result<(), SessionError> {
        let state = self.sessions.take(operator_id, token)?;
        if let ManualState::AwaitingConfirmation {
            provider,
            player_id,
            amount,
            ..
        } = state
        {
            self.notifier
                .operator(&format!(
                    "Cancelled: {provider}, ID {player_id}, {} so'm",
                    render::fmt_amount(amount)
                ))
                .await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use rust_decimal_macros::dec;

    use crate::testutil::{RecordingTransport, ScriptedGateway};

    fn harness(gateway: Arc<ScriptedGateway>) -> (ManualDeposits, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = Notifier::new(transport.clone(), 999, Some(-100500));
        let manual = ManualDeposits::new(gateway, notifier, (dec!(1000), dec!(50000000)));
        (manual, transport)
    }

    #[tokio::test]
    async fn happy_path_credits_once() {
        let gateway = Arc::new(ScriptedGateway::default());
        let (manual, transport) = harness(gateway.clone());

        let token = manual.start(1, Provider::Melbet);
        let name = manual.submit_player(1, token, "player01").await.unwrap();
        assert_eq!(name, "Player");

        let summary = manual.submit_amount(1, token, "250 000").unwrap();
        assert_eq!(summary.amount, dec!(250000));

        let outcome = manual.confirm(1, token).await.unwrap();
        assert!(outcome.success);
        assert_eq!(gateway.credit_calls.load(Ordering::SeqCst), 1);

        let credited = gateway.credited.lock().unwrap();
        assert_eq!(credited.as_slice(), &[(Provider::Melbet, "player01".to_string(), dec!(250000))]);
        drop(credited);

        // Operator message and channel summary both went out.
        assert!(transport.sent_to(999).iter().any(|t| t.contains("Operation completed")));
        assert!(!transport.sent_to(-100500).is_empty());
    }

    #[tokio::test]
    async fn double_confirm_cannot_double_credit() {
        let gateway = Arc::new(ScriptedGateway::default());
        let (manual, _transport) = harness(gateway.clone());

        let token = manual.start(1, Provider::Melbet);
        manual.submit_player(1, token, "player01").await.unwrap();
        manual.submit_amount(1, token, "250000").unwrap();

        manual.confirm(1, token).await.unwrap();
        assert_eq!(manual.confirm(1, token).await.unwrap_err(), SessionError::NoSession);
        assert_eq!(gateway.credit_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_discards_without_credit() {
        let gateway = Arc::new(ScriptedGateway::default());
        let (manual, _transport) = harness(gateway.clone());

        let token = manual.start(1, Provider::Melbet);
        manual.submit_player(1, token, "player01").await.unwrap();
        manual.submit_amount(1, token, "250000").unwrap();

        manual.cancel(1, token).await.unwrap();
        assert_eq!(manual.confirm(1, token).await.unwrap_err(), SessionError::NoSession);
        assert_eq!(gateway.credit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_credit_reports_the_raw_reason() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.fail_credit("desk cash limit exhausted");
        let (manual, transport) = harness(gateway.clone());

        let token = manual.start(1, Provider::XBet);
        manual.submit_player(1, token, "player01").await.unwrap();
        manual.submit_amount(1, token, "250000").unwrap();

        let outcome = manual.confirm(1, token).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.reason.as_deref(), Some("desk cash limit exhausted"));
        assert!(transport
            .sent_to(999)
            .iter()
            .any(|t| t.contains("desk cash limit exhausted")));
        // Failures do not reach the channel.
        assert!(transport.sent_to(-100500).is_empty());
    }

    #[tokio::test]
    async fn rejected_player_stops_the_flow() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.reject_player("no such account");
        let (manual, _transport) = harness(gateway.clone());

        let token = manual.start(1, Provider::XBet);
        let err = manual.submit_player(1, token, "player01").await.unwrap_err();
        assert_eq!(err, SessionError::PlayerRejected("no such account".into()));

        // Still at the player step.
        assert_eq!(
            manual.submit_amount(1, token, "250000").unwrap_err(),
            SessionError::WrongStep
        );
    }

    #[tokio::test]
    async fn steps_must_run_in_order() {
        let gateway = Arc::new(ScriptedGateway::default());
        let (manual, _transport) = harness(gateway);

        let token = manual.start(1, Provider::XBet);
        assert_eq!(
            manual.submit_amount(1, token, "250000").unwrap_err(),
            SessionError::WrongStep
        );
        assert_eq!(manual.confirm(1, token).await.unwrap_err(), SessionError::WrongStep);
    }
}
