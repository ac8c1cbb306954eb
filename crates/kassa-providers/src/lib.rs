pub mod http;
pub mod registry;

use async_trait::async_trait;
use rust_decimal::Decimal;

use kassa_types::models::Provider;
use kassa_types::provider::{BalanceResult, CreditResult, PlayerLookupResult};

pub use registry::{ProviderGateway, ProviderRegistry};

/// One cash desk's API. Failures are values, not errors: transport
/// problems surface as `Unavailable`/`Failure` variants with the raw
/// reason, so callers branch instead of unwinding.
///
/// `credit` is one-shot: a logical credit request is submitted at most
/// once, and nothing in this layer retries it. Whether a credit may be
/// attempted at all is decided upstream by the reconciler's gate.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    async fn find_player(&self, player_id: &str) -> PlayerLookupResult;

    async fn credit(&self, player_id: &str, amount: Decimal) -> CreditResult;

    async fn get_balance(&self) -> BalanceResult;
}

/// Stand-in for a desk with no configured credentials. Mirrors how the
/// system behaves when an API client is absent: lookups optimistically
/// succeed, money movement does not.
pub struct UnconfiguredProvider(pub Provider);

#[async_trait]
impl ProviderApi for UnconfiguredProvider {
    async fn find_player(&self, player_id: &str) -> PlayerLookupResult {
        PlayerLookupResult::Found {
            player_id: player_id.to_string(),
            name: "Player".to_string(),
        }
    }

    async fn credit(&self, _player_id: &str, _amount: Decimal) -> CreditResult {
        CreditResult::Failure {
            reason: format!("{} API is not configured", self.0),
        }
    }

    async fn get_balance(&self) -> BalanceResult {
        BalanceResult::Unavailable {
            reason: format!("{} API is not configured", self.0),
        }
    }
}
