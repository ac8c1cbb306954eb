//! The reconciliation pipeline: parse → match → gate → execute → notify.
//!
//! The gate is the compare-and-set on the payment's status. Concurrent
//! handlers for duplicate notifications all race to apply it, exactly one
//! observes `Applied`, and only that one invokes the credit call — which
//! is what keeps crediting at-most-once without any locking around the
//! provider call itself.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use kassa_db::Database;
use kassa_providers::ProviderGateway;
use kassa_relay::Notifier;
use kassa_types::models::{ParsedNotification, Payment, PaymentStatus, StatusChange};
use kassa_types::provider::CreditResult;

use crate::matching;
use crate::parse;
use crate::render;

pub struct Reconciler {
    db: Arc<Database>,
    gateway: Arc<dyn ProviderGateway>,
    notifier: Notifier,
    tolerance: Decimal,
}

impl Reconciler {
    pub fn new(db: Arc<Database>, gateway: Arc<dyn ProviderGateway>, notifier: Notifier) -> Self {
        Self {
            db,
            gateway,
            notifier,
            // Salted amounts are unique; anything wider is an operator's
            // deliberate choice.
            tolerance: Decimal::ZERO,
        }
    }

    pub fn with_tolerance(mut self, tolerance: Decimal) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Entry point for the relay webhook. Parsing is cheap and happens
    /// inline; everything that can block leaves the dispatch path.
    pub fn handle_notification(self: &Arc<Self>, text: &str) {
        let Some(parsed) = parse::parse_notification(text) else {
            return;
        };
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.settle(parsed).await;
        });
    }

    /// Match the candidate and drive the matched payment to a terminal
    /// status. Misses are silent: the channel carries plenty of text that
    /// is not a payment for us.
    pub async fn settle(&self, parsed: ParsedNotification) {
        let payment = match matching::find_match(&self.db, &parsed, self.tolerance) {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                debug!(
                    "no pending payment for {} / {}",
                    parsed.card_last4, parsed.amount
                );
                return;
            }
            Err(e) => {
                error!("match lookup failed: {:#}", e);
                return;
            }
        };

        match self
            .db
            .update_payment_status(&payment.payment_id, PaymentStatus::Completed)
        {
            Ok(StatusChange::Applied) => {}
            Ok(_) => {
                debug!("payment {} settled by a concurrent handler", payment.payment_id);
                return;
            }
            Err(e) => {
                error!("gating transition failed for {}: {:#}", payment.payment_id, e);
                return;
            }
        }

        // This invocation won the gate: the one-shot credit happens here
        // and nowhere else.
        let result = self
            .gateway
            .credit(payment.provider, &payment.player_id, payment.amount)
            .await;
        match result {
            CreditResult::Success => {
                info!(
                    "payment {} credited: {} {} to {}",
                    payment.payment_id, payment.provider, payment.amount, payment.player_id
                );
                self.report_success(&payment).await;
            }
            CreditResult::Failure { reason } => {
                warn!("payment {} credit failed: {}", payment.payment_id, reason);
                self.report_failure(&payment, &reason).await;
            }
        }
    }

    async fn report_success(&self, payment: &Payment) {
        // Remove the notice keyboard, but only in private chats; group
        // and channel messages are left untouched.
        if let (Some(chat_id), Some(message_id)) =
            (payment.notice_chat_id, payment.notice_message_id)
        {
            if chat_id > 0 {
                self.notifier.clear_markup(chat_id, message_id).await;
            }
        }

        self.notifier
            .payer(payment.user_id, &render::payer_success(payment))
            .await;

        let balance = self.gateway.get_balance(payment.provider).await;
        let user = self.db.get_user(payment.user_id).ok().flatten();
        let summary = render::channel_summary(payment, user.as_ref(), &balance);
        self.notifier.channel(&summary).await;
    }

    async fn report_failure(&self, payment: &Payment, reason: &str) {
        match self.db.mark_credit_failed(&payment.payment_id) {
            Ok(true) => {}
            Ok(false) => warn!(
                "payment {} was not in completed state during compensation",
                payment.payment_id
            ),
            Err(e) => error!("could not mark {} failed: {:#}", payment.payment_id, e),
        }

        self.notifier
            .operator(&render::credit_failure_alert(payment, reason))
            .await;
        self.notifier
            .payer(payment.user_id, render::payer_failure())
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use rust_decimal_macros::dec;

    use kassa_types::models::{NewPayment, Provider};

    use crate::testutil::{RecordingTransport, ScriptedGateway};

    const OPERATOR: i64 = 999;
    const CHANNEL: i64 = -100500;

    struct Harness {
        db: Arc<Database>,
        gateway: Arc<ScriptedGateway>,
        transport: Arc<RecordingTransport>,
        reconciler: Arc<Reconciler>,
    }

    fn harness() -> Harness {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let gateway = Arc::new(ScriptedGateway::default());
        let transport = Arc::new(RecordingTransport::default());
        let notifier = Notifier::new(transport.clone(), OPERATOR, Some(CHANNEL));
        let reconciler = Arc::new(Reconciler::new(db.clone(), gateway.clone(), notifier));
        Harness {
            db,
            gateway,
            transport,
            reconciler,
        }
    }

    fn seed_payment(h: &Harness, payment_id: &str, amount: Decimal, last4: &str) {
        h.db.ensure_user(7, Some("alice"), None).unwrap();
        h.db.add_payment(&NewPayment {
            user_id: 7,
            provider: Provider::XBet,
            player_id: "player01".into(),
            amount,
            payment_id: payment_id.into(),
            card_last4: last4.into(),
        })
        .unwrap();
    }

    fn note(text: &str) -> ParsedNotification {
        parse::parse_notification(text).unwrap()
    }

    #[tokio::test]
    async fn salted_payment_settles_end_to_end() {
        let h = harness();
        // 50000 requested + 125 salt.
        seed_payment(&h, "10001", dec!(50125), "8012");

        h.reconciler.settle(note("PAYMENT|50125|8012")).await;

        let row = h.db.get_payment("10001").unwrap().unwrap();
        assert_eq!(row.status, PaymentStatus::Completed);

        assert_eq!(h.gateway.credit_calls.load(Ordering::SeqCst), 1);
        let credited = h.gateway.credited.lock().unwrap();
        assert_eq!(
            credited.as_slice(),
            &[(Provider::XBet, "player01".to_string(), dec!(50125))]
        );
        drop(credited);

        // Payer heard about it, channel got the structured summary.
        assert!(!h.transport.sent_to(7).is_empty());
        let channel = h.transport.sent_to(CHANNEL);
        assert!(channel.iter().any(|t| t.contains("10001") && t.contains("CREDITED")));
    }

    #[tokio::test]
    async fn duplicate_notifications_credit_once() {
        let h = harness();
        seed_payment(&h, "10002", dec!(50125), "8012");

        let parsed = note("PAYMENT|50125|8012");
        tokio::join!(
            h.reconciler.settle(parsed.clone()),
            h.reconciler.settle(parsed.clone()),
            h.reconciler.settle(parsed),
        );

        assert_eq!(h.gateway.credit_calls.load(Ordering::SeqCst), 1);
        let row = h.db.get_payment("10002").unwrap().unwrap();
        assert_eq!(row.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn labeled_notification_settles_the_same_payment() {
        let h = harness();
        seed_payment(&h, "10003", dec!(50125), "8012");

        h.reconciler
            .settle(note("Summa: 50 125 so'm, Karta: **** 8012"))
            .await;

        let row = h.db.get_payment("10003").unwrap().unwrap();
        assert_eq!(row.status, PaymentStatus::Completed);
        assert_eq!(h.gateway.credit_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn credit_failure_marks_failed_and_alerts_operator() {
        let h = harness();
        h.gateway.fail_credit("desk is out of cash");
        seed_payment(&h, "10004", dec!(50125), "8012");

        h.reconciler.settle(note("PAYMENT|50125|8012")).await;

        let row = h.db.get_payment("10004").unwrap().unwrap();
        assert_eq!(row.status, PaymentStatus::Failed);
        assert_eq!(h.gateway.credit_calls.load(Ordering::SeqCst), 1);

        let operator = h.transport.sent_to(OPERATOR);
        assert!(operator.iter().any(|t| t.contains("desk is out of cash")));
        // The payer sees only the coarse outcome.
        let payer = h.transport.sent_to(7);
        assert!(payer.iter().all(|t| !t.contains("desk is out of cash")));
        assert!(!payer.is_empty());
    }

    #[tokio::test]
    async fn unmatched_notification_is_a_silent_no_op() {
        let h = harness();
        seed_payment(&h, "10005", dec!(50125), "8012");

        h.reconciler.settle(note("PAYMENT|99999|4444")).await;

        let row = h.db.get_payment("10005").unwrap().unwrap();
        assert_eq!(row.status, PaymentStatus::Pending);
        assert_eq!(h.gateway.credit_calls.load(Ordering::SeqCst), 0);
        assert!(h.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn notice_keyboard_cleared_only_in_private_chats() {
        let h = harness();
        seed_payment(&h, "10006", dec!(50125), "8012");
        h.db.set_payment_notice("10006", 7, 4242).unwrap();
        seed_payment(&h, "10007", dec!(60125), "8012");
        h.db.set_payment_notice("10007", -100123, 17).unwrap();

        h.reconciler.settle(note("PAYMENT|50125|8012")).await;
        h.reconciler.settle(note("PAYMENT|60125|8012")).await;

        assert_eq!(h.transport.cleared(), vec![(7, 4242)]);
    }

    #[tokio::test]
    async fn expired_payment_never_credits() {
        let h = harness();
        seed_payment(&h, "10008", dec!(50125), "8012");
        h.db.update_payment_status("10008", PaymentStatus::Expired)
            .unwrap();

        h.reconciler.settle(note("PAYMENT|50125|8012")).await;

        assert_eq!(h.gateway.credit_calls.load(Ordering::SeqCst), 0);
        let row = h.db.get_payment("10008").unwrap().unwrap();
        assert_eq!(row.status, PaymentStatus::Expired);
    }
}
