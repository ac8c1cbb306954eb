use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use kassa_types::models::Provider;
use kassa_types::provider::{BalanceResult, CreditResult, PlayerLookupResult};

use crate::ProviderApi;

/// Per-call deadline. A desk that is slower than this is reported as
/// unavailable; the call is never re-issued from here.
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Cash-desk HTTP client. The concrete wire format is the desk's
/// business; every endpoint answers with a success flag plus payload or
/// error string, which is all this client relies on.
pub struct HttpProviderApi {
    provider: Provider,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct PlayerQuery<'a> {
    player_id: &'a str,
}

#[derive(Serialize)]
struct CreditRequest<'a> {
    player_id: &'a str,
    amount: Decimal,
}

/// The desks answer with slightly different key casings; aliases absorb
/// the variation.
#[derive(Debug, Deserialize)]
struct DeskEnvelope {
    #[serde(alias = "Success")]
    success: bool,
    #[serde(alias = "UserId")]
    user_id: Option<String>,
    #[serde(alias = "Name")]
    name: Option<String>,
    #[serde(alias = "Balance")]
    balance: Option<Decimal>,
    #[serde(alias = "Limit")]
    limit: Option<Decimal>,
    #[serde(alias = "Error", alias = "Message")]
    error: Option<String>,
}

impl DeskEnvelope {
    fn error_reason(&self) -> String {
        self.error.clone().unwrap_or_else(|| "desk reported failure".to_string())
    }
}

impl HttpProviderApi {
    pub fn new(provider: Provider, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            provider,
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<DeskEnvelope, String> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| describe_transport_error(&e))?;

        response
            .json::<DeskEnvelope>()
            .await
            .map_err(|e| format!("bad response from desk: {e}"))
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "desk did not respond in time".to_string()
    } else if e.is_connect() {
        "could not connect to desk".to_string()
    } else {
        e.to_string()
    }
}

#[async_trait]
impl ProviderApi for HttpProviderApi {
    async fn find_player(&self, player_id: &str) -> PlayerLookupResult {
        match self.post("player/find", &PlayerQuery { player_id }).await {
            Ok(env) if env.success => PlayerLookupResult::Found {
                player_id: env.user_id.unwrap_or_else(|| player_id.to_string()),
                name: env.name.unwrap_or_else(|| "Player".to_string()),
            },
            Ok(env) => PlayerLookupResult::NotFound {
                reason: env.error_reason(),
            },
            Err(reason) => {
                warn!("{} player lookup unavailable: {}", self.provider, reason);
                PlayerLookupResult::Unavailable { reason }
            }
        }
    }

    async fn credit(&self, player_id: &str, amount: Decimal) -> CreditResult {
        match self.post("deposit/add", &CreditRequest { player_id, amount }).await {
            Ok(env) if env.success => CreditResult::Success,
            Ok(env) => CreditResult::Failure {
                reason: env.error_reason(),
            },
            Err(reason) => {
                warn!("{} credit call failed: {}", self.provider, reason);
                CreditResult::Failure { reason }
            }
        }
    }

    async fn get_balance(&self) -> BalanceResult {
        match self.post("balance", &serde_json::json!({})).await {
            Ok(env) if env.success => BalanceResult::Available {
                balance: env.balance.unwrap_or_default(),
                limit: env.limit.unwrap_or_default(),
            },
            Ok(env) => BalanceResult::Unavailable {
                reason: env.error_reason(),
            },
            Err(reason) => BalanceResult::Unavailable { reason },
        }
    }
}
