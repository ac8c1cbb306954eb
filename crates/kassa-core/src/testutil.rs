//! Shared test doubles: a transport that records every send and a
//! scriptable provider gateway with call counters.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use kassa_providers::ProviderGateway;
use kassa_relay::{MessageRef, Transport};
use kassa_types::models::Provider;
use kassa_types::provider::{BalanceResult, CreditResult, PlayerLookupResult};

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(i64, String)>>,
    pub cleared: Mutex<Vec<(i64, i64)>>,
}

impl RecordingTransport {
    pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(chat, _)| *chat == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn cleared(&self) -> Vec<(i64, i64)> {
        self.cleared.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageRef> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(MessageRef { chat_id, message_id: 1 })
    }

    async fn send_html(&self, chat_id: i64, text: &str) -> Result<MessageRef> {
        self.send_message(chat_id, text).await
    }

    async fn clear_reply_markup(&self, chat_id: i64, message_id: i64) -> Result<()> {
        self.cleared.lock().unwrap().push((chat_id, message_id));
        Ok(())
    }

    async fn delete_message(&self, _chat_id: i64, _message_id: i64) -> Result<()> {
        Ok(())
    }
}

enum LookupScript {
    Found,
    NotFound(String),
    Unavailable(String),
}

pub struct ScriptedGateway {
    pub credit_calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
    pub credited: Mutex<Vec<(Provider, String, Decimal)>>,
    credit_failure: Mutex<Option<String>>,
    lookup: Mutex<LookupScript>,
    balance_delays: Mutex<HashMap<Provider, Duration>>,
    balances: Mutex<HashMap<Provider, BalanceResult>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            credit_calls: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
            credited: Mutex::new(Vec::new()),
            credit_failure: Mutex::new(None),
            lookup: Mutex::new(LookupScript::Found),
            balance_delays: Mutex::new(HashMap::new()),
            balances: Mutex::new(HashMap::new()),
        }
    }
}

impl ScriptedGateway {
    pub fn fail_credit(&self, reason: &str) {
        *self.credit_failure.lock().unwrap() = Some(reason.to_string());
    }

    pub fn reject_player(&self, reason: &str) {
        *self.lookup.lock().unwrap() = LookupScript::NotFound(reason.to_string());
    }

    pub fn desk_down(&self, reason: &str) {
        *self.lookup.lock().unwrap() = LookupScript::Unavailable(reason.to_string());
    }

    pub fn delay_balance(&self, provider: Provider, delay: Duration) {
        self.balance_delays.lock().unwrap().insert(provider, delay);
    }

    pub fn set_balance(&self, provider: Provider, result: BalanceResult) {
        self.balances.lock().unwrap().insert(provider, result);
    }
}

#[async_trait]
impl ProviderGateway for ScriptedGateway {
    async fn find_player(&self, _provider: Provider, player_id: &str) -> PlayerLookupResult {
        match &*self.lookup.lock().unwrap() {
            LookupScript::Found => PlayerLookupResult::Found {
                player_id: player_id.to_string(),
                name: "Player".to_string(),
            },
            LookupScript::NotFound(reason) => PlayerLookupResult::NotFound {
                reason: reason.clone(),
            },
            LookupScript::Unavailable(reason) => PlayerLookupResult::Unavailable {
                reason: reason.clone(),
            },
        }
    }

    async fn credit(&self, provider: Provider, player_id: &str, amount: Decimal) -> CreditResult {
        self.credit_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.credited
            .lock()
            .unwrap()
            .push((provider, player_id.to_string(), amount));
        match &*self.credit_failure.lock().unwrap() {
            Some(reason) => CreditResult::Failure {
                reason: reason.clone(),
            },
            None => CreditResult::Success,
        }
    }

    async fn get_balance(&self, provider: Provider) -> BalanceResult {
        self.balance_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let delay = self.balance_delays.lock().unwrap().get(&provider).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.balances
            .lock()
            .unwrap()
            .get(&provider)
            .cloned()
            .unwrap_or(BalanceResult::Available {
                balance: dec!(1000000),
                limit: dec!(5000000),
            })
    }
}
