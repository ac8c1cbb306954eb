use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use kassa_types::models::Provider;
use kassa_types::provider::{BalanceResult, CreditResult, PlayerLookupResult};

use crate::{ProviderApi, UnconfiguredProvider};

/// The three cash-desk capabilities, addressed by provider. This is the
/// seam the reconciler, the manual-deposit flow and the balance
/// aggregator all talk to, and the one tests mock.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn find_player(&self, provider: Provider, player_id: &str) -> PlayerLookupResult;

    async fn credit(&self, provider: Provider, player_id: &str, amount: Decimal) -> CreditResult;

    async fn get_balance(&self, provider: Provider) -> BalanceResult;
}

/// Dispatches per-provider clients. Every provider in the fixed set gets
/// an entry; desks without credentials fall back to
/// [`UnconfiguredProvider`].
pub struct ProviderRegistry {
    clients: HashMap<Provider, Arc<dyn ProviderApi>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        let mut clients: HashMap<Provider, Arc<dyn ProviderApi>> = HashMap::new();
        for provider in Provider::all() {
            clients.insert(provider, Arc::new(UnconfiguredProvider(provider)));
        }
        Self { clients }
    }

    pub fn register(&mut self, provider: Provider, client: Arc<dyn ProviderApi>) {
        self.clients.insert(provider, client);
    }

    fn client(&self, provider: Provider) -> &Arc<dyn ProviderApi> {
        // `new` seeds every provider, so the entry always exists.
        &self.clients[&provider]
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderGateway for ProviderRegistry {
    async fn find_player(&self, provider: Provider, player_id: &str) -> PlayerLookupResult {
        self.client(provider).find_player(player_id).await
    }

    async fn credit(&self, provider: Provider, player_id: &str, amount: Decimal) -> CreditResult {
        self.client(provider).credit(player_id, amount).await
    }

    async fn get_balance(&self, provider: Provider) -> BalanceResult {
        self.client(provider).get_balance().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn unconfigured_desk_refuses_to_move_money() {
        let registry = ProviderRegistry::new();

        let lookup = registry.find_player(Provider::Melbet, "player01").await;
        assert!(lookup.is_found());

        let credit = registry.credit(Provider::Melbet, "player01", dec!(50000)).await;
        assert!(!credit.is_success());

        let balance = registry.get_balance(Provider::Melbet).await;
        assert!(!balance.is_available());
    }
}
