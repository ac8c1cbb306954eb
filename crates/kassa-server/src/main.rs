use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use rust_decimal::Decimal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use kassa_api::{
    AppState, AppStateInner, balances, deposits, manual, notifications, stats, users, withdrawals,
};
use kassa_core::balance::{BalanceAggregator, DEFAULT_CACHE_TTL, DEFAULT_WAIT_WINDOW};
use kassa_core::manual::ManualDeposits;
use kassa_core::reconcile::Reconciler;
use kassa_core::sweep;
use kassa_db::Database;
use kassa_providers::http::HttpProviderApi;
use kassa_providers::{ProviderGateway, ProviderRegistry};
use kassa_relay::{Notifier, RelayClient};
use kassa_types::models::Provider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kassa=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("KASSA_DB_PATH").unwrap_or_else(|_| "kassa.db".into());
    let host = std::env::var("KASSA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("KASSA_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    let relay_url =
        std::env::var("KASSA_RELAY_URL").unwrap_or_else(|_| "https://api.telegram.org".into());
    let relay_token = std::env::var("KASSA_RELAY_TOKEN").unwrap_or_default();
    let operator_chat: i64 = std::env::var("KASSA_OPERATOR_CHAT")
        .unwrap_or_else(|_| "0".into())
        .parse()?;
    let notify_channel: Option<i64> = std::env::var("KASSA_NOTIFY_CHANNEL")
        .ok()
        .and_then(|v| v.parse().ok());

    let retention = secs_env("KASSA_RETENTION_SECS", 300);
    let sweep_interval = secs_env("KASSA_SWEEP_INTERVAL_SECS", 60);
    let balance_window = secs_env("KASSA_BALANCE_WINDOW_SECS", DEFAULT_WAIT_WINDOW.as_secs());
    let balance_ttl = secs_env("KASSA_BALANCE_CACHE_SECS", DEFAULT_CACHE_TTL.as_secs());

    let min_deposit = decimal_env("KASSA_MIN_DEPOSIT", Decimal::from(1_000));
    let max_deposit = decimal_env("KASSA_MAX_DEPOSIT", Decimal::from(50_000_000));
    let tolerance = decimal_env("KASSA_MATCH_TOLERANCE", Decimal::ZERO);
    if tolerance > Decimal::ZERO {
        warn!(
            "amount match tolerance widened to {}; salted amounts normally match exactly",
            tolerance
        );
    }

    // Init ledger
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);

    // Outbound transport
    let transport = Arc::new(RelayClient::new(relay_url, &relay_token));
    let notifier = Notifier::new(transport, operator_chat, notify_channel);

    // Cash-desk clients: one per provider with configured credentials,
    // the rest fall back to refusing to move money.
    let mut registry = ProviderRegistry::new();
    for provider in Provider::all() {
        let url = std::env::var(format!("KASSA_PROVIDER_{}_URL", provider.env_key()));
        let key = std::env::var(format!("KASSA_PROVIDER_{}_KEY", provider.env_key()));
        match (url, key) {
            (Ok(url), Ok(key)) => {
                registry.register(provider, Arc::new(HttpProviderApi::new(provider, url, key)));
                info!("{} desk API configured", provider);
            }
            _ => warn!("{} desk API has no credentials; credits to it will fail", provider),
        }
    }
    let gateway: Arc<dyn ProviderGateway> = Arc::new(registry);

    // Core components
    let reconciler = Arc::new(
        Reconciler::new(db.clone(), gateway.clone(), notifier.clone()).with_tolerance(tolerance),
    );
    let manual_deposits = Arc::new(ManualDeposits::new(
        gateway.clone(),
        notifier.clone(),
        (min_deposit, max_deposit),
    ));
    let aggregator = Arc::new(BalanceAggregator::new(gateway, balance_ttl, balance_window));

    sweep::start(db.clone(), retention, sweep_interval);

    let state: AppState = Arc::new(AppStateInner {
        db,
        reconciler,
        manual: manual_deposits,
        balances: aggregator,
        notifier,
        deposit_limits: (min_deposit, max_deposit),
    });

    // Routes
    let app = Router::new()
        .route("/relay/notifications", post(notifications::relay_notification))
        .route("/deposits", post(deposits::create_deposit))
        .route("/deposits/{payment_id}/notice", post(deposits::attach_notice))
        .route("/manual/start", post(manual::start_session))
        .route("/manual/{token}/player", post(manual::submit_player))
        .route("/manual/{token}/amount", post(manual::submit_amount))
        .route("/manual/{token}/confirm", post(manual::confirm))
        .route("/manual/{token}/cancel", post(manual::cancel))
        .route("/balances", post(balances::request_report))
        .route("/users/{user_id}/phone", post(users::set_phone))
        .route("/withdrawals", post(withdrawals::create_withdrawal))
        .route("/withdrawals/pending", get(withdrawals::pending))
        .route("/withdrawals/{id}/approve", post(withdrawals::approve))
        .route("/withdrawals/{id}/complete", post(withdrawals::complete))
        .route("/withdrawals/{id}/fail", post(withdrawals::fail))
        .route("/stats", get(stats::get_stats))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Kassa server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn secs_env(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}

fn decimal_env(name: &str, default: Decimal) -> Decimal {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
