pub mod balances;
pub mod deposits;
pub mod manual;
pub mod notifications;
pub mod stats;
pub mod users;
pub mod withdrawals;

use std::sync::Arc;

use rust_decimal::Decimal;

use kassa_core::balance::BalanceAggregator;
use kassa_core::manual::ManualDeposits;
use kassa_core::reconcile::Reconciler;
use kassa_db::Database;
use kassa_relay::Notifier;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub reconciler: Arc<Reconciler>,
    pub manual: Arc<ManualDeposits>,
    pub balances: Arc<BalanceAggregator>,
    pub notifier: Notifier,
    /// (min, max) accepted deposit amount in so'm.
    pub deposit_limits: (Decimal, Decimal),
}
