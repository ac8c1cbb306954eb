//! Cash-desk balance aggregation: one task per provider, a bounded wait
//! window, and a single-slot cache of the last rendered report to absorb
//! button-mashing. The caller never waits for the fan-out — the report is
//! delivered through the notifier.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout_at;
use tracing::{debug, info};

use kassa_providers::ProviderGateway;
use kassa_relay::Notifier;
use kassa_types::models::Provider;
use kassa_types::provider::BalanceResult;

use crate::render;

pub const DEFAULT_WAIT_WINDOW: Duration = Duration::from_secs(10);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

struct CachedReport {
    rendered_at: Instant,
    text: String,
}

pub struct BalanceAggregator {
    gateway: Arc<dyn ProviderGateway>,
    cache: Mutex<Option<CachedReport>>,
    ttl: Duration,
    window: Duration,
}

impl BalanceAggregator {
    pub fn new(gateway: Arc<dyn ProviderGateway>, ttl: Duration, window: Duration) -> Self {
        Self {
            gateway,
            cache: Mutex::new(None),
            ttl,
            window,
        }
    }

    /// Acknowledge immediately; fetch and deliver in the background.
    pub fn request(self: &Arc<Self>, notifier: Notifier, refresh: bool) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let report = if refresh {
                this.refresh().await
            } else {
                this.report().await
            };
            notifier.operator(&report).await;
        });
    }

    /// The last rendered report if it is fresh enough, otherwise a new
    /// fan-out.
    pub async fn report(&self) -> String {
        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.as_ref() {
                if cached.rendered_at.elapsed() < self.ttl {
                    debug!("serving cached balance report");
                    return cached.text.clone();
                }
            }
        }
        self.fetch_and_cache().await
    }

    /// Drop the cache and fetch.
    pub async fn refresh(&self) -> String {
        self.cache.lock().await.take();
        self.fetch_and_cache().await
    }

    async fn fetch_and_cache(&self) -> String {
        let entries = self.fetch_entries().await;
        let text = render::balance_report(&entries);
        *self.cache.lock().await = Some(CachedReport {
            rendered_at: Instant::now(),
            text: text.clone(),
        });
        text
    }

    /// Fan out one task per provider and gather whatever answers inside
    /// the wait window. Late desks are reported individually as
    /// unavailable; nobody blocks past the window.
    pub async fn fetch_entries(&self) -> Vec<(Provider, BalanceResult)> {
        let providers = Provider::all();
        let (tx, mut rx) = mpsc::channel(providers.len());

        for provider in providers {
            let gateway = Arc::clone(&self.gateway);
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = gateway.get_balance(provider).await;
                let _ = tx.send((provider, result)).await;
            });
        }
        drop(tx);

        let deadline = tokio::time::Instant::now() + self.window;
        let mut collected: HashMap<Provider, BalanceResult> = HashMap::new();
        while collected.len() < providers.len() {
            match timeout_at(deadline, rx.recv()).await {
                Ok(Some((provider, result))) => {
                    collected.insert(provider, result);
                }
                Ok(None) => break,
                Err(_) => {
                    info!(
                        "balance window elapsed with {}/{} desks answered",
                        collected.len(),
                        providers.len()
                    );
                    break;
                }
            }
        }

        providers
            .into_iter()
            .map(|provider| {
                let result = collected.remove(&provider).unwrap_or(BalanceResult::Unavailable {
                    reason: "no response within the wait window".to_string(),
                });
                (provider, result)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use rust_decimal_macros::dec;

    use crate::testutil::ScriptedGateway;

    fn aggregator(gateway: Arc<ScriptedGateway>, ttl: Duration, window: Duration) -> BalanceAggregator {
        BalanceAggregator::new(gateway, ttl, window)
    }

    #[tokio::test]
    async fn slow_desk_degrades_to_unavailable_within_the_window() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.delay_balance(Provider::Mostbet, Duration::from_secs(30));
        let agg = aggregator(gateway, DEFAULT_CACHE_TTL, Duration::from_millis(200));

        let started = Instant::now();
        let entries = agg.fetch_entries().await;
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_millis(600), "took {elapsed:?}");
        assert_eq!(entries.len(), 5);

        let available = entries.iter().filter(|(_, r)| r.is_available()).count();
        assert_eq!(available, 4);
        let (_, mostbet) = entries
            .iter()
            .find(|(p, _)| *p == Provider::Mostbet)
            .unwrap();
        assert!(matches!(mostbet, BalanceResult::Unavailable { .. }));
    }

    #[tokio::test]
    async fn entries_keep_a_fixed_provider_order() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.set_balance(
            Provider::WinWin,
            BalanceResult::Unavailable {
                reason: "maintenance".into(),
            },
        );
        let agg = aggregator(gateway, DEFAULT_CACHE_TTL, Duration::from_secs(1));

        let entries = agg.fetch_entries().await;
        let order: Vec<Provider> = entries.iter().map(|(p, _)| *p).collect();
        assert_eq!(order, Provider::all().to_vec());
    }

    #[tokio::test]
    async fn cache_absorbs_bursts() {
        let gateway = Arc::new(ScriptedGateway::default());
        let agg = aggregator(gateway.clone(), Duration::from_secs(60), Duration::from_secs(1));

        let first = agg.report().await;
        let calls_after_first = gateway.balance_calls.load(Ordering::SeqCst);
        let second = agg.report().await;

        assert_eq!(first, second);
        assert_eq!(gateway.balance_calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn refresh_invalidates_the_cache() {
        let gateway = Arc::new(ScriptedGateway::default());
        let agg = aggregator(gateway.clone(), Duration::from_secs(60), Duration::from_secs(1));

        let first = agg.report().await;
        assert!(first.contains("1,000,000"));

        gateway.set_balance(
            Provider::XBet,
            BalanceResult::Available {
                balance: dec!(777),
                limit: dec!(888),
            },
        );
        // Still cached.
        assert_eq!(agg.report().await, first);
        // Refresh refetches.
        let refreshed = agg.refresh().await;
        assert!(refreshed.contains("777"));
    }
}
