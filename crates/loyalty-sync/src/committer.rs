//! # Transaction Committer
//!
//! Turns a confirmed cart into a settled or queued sale.
//!
//! ## Sale State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  DRAFTING (cart open)                                                   │
//! │      │                                                                  │
//! │      │ checkout()                                                       │
//! │      ▼                                                                  │
//! │  freeze() ── cash short / points short / empty cart ──► DRAFTING        │
//! │      │       (CoreError, nothing persisted)                             │
//! │      ▼                                                                  │
//! │  FROZEN (totals locked)                                                 │
//! │      │                                                                  │
//! │      ├── known offline ───────────────────────────┐                     │
//! │      │                                            │                     │
//! │      │ commit_sale + commit_ledger_delta          │                     │
//! │      │ (within commit timeout)                    │                     │
//! │      │                                            │                     │
//! │      ├── ok ──► SETTLED                           │                     │
//! │      │          local ledger mirrors the delta    │                     │
//! │      │                                            ▼                     │
//! │      └── error / timeout ──────────────────► QUEUED                     │
//! │                                   outbox.append(sale)                   │
//! │                                   local ledger applies delta            │
//! │                                   (replayed later by SyncEngine)        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Checkouts and replays share one gate, so only one sale is ever in
//! flight between freezing and settling/queueing on a terminal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use loyalty_core::{freeze, Cart, CheckoutRequest, PointsConfig, Sale, SaleStatus};

use crate::connectivity::Connectivity;
use crate::error::SyncResult;
use crate::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::services::TerminalServices;

/// Where a confirmed sale ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Committed remotely.
    Settled(Sale),
    /// Saved offline; the sync engine will replay it.
    Queued(Sale),
}

impl CommitOutcome {
    pub fn sale(&self) -> &Sale {
        match self {
            CommitOutcome::Settled(sale) | CommitOutcome::Queued(sale) => sale,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, CommitOutcome::Settled(_))
    }
}

/// Sends a frozen sale and its ledger delta to the remote store.
///
/// Both calls are idempotent by sale id, so this is safe to repeat for a
/// sale whose earlier attempt partially succeeded.
pub(crate) async fn commit_remote(
    remote: &dyn RemoteStore,
    sale: &Sale,
    timeout: Duration,
) -> RemoteResult<()> {
    let mut settled = sale.clone();
    settled.status = SaleStatus::Settled;
    let delta = settled.ledger_delta();

    let attempt = async {
        remote.commit_sale(&settled).await?;
        remote.commit_ledger_delta(&delta).await
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Timeout(timeout.as_secs())),
    }
}

pub struct TransactionCommitter {
    services: TerminalServices,
    points: PointsConfig,
    commit_timeout: Duration,
    gate: Arc<Mutex<()>>,
}

impl TransactionCommitter {
    pub fn new(services: TerminalServices, points: PointsConfig, commit_timeout: Duration) -> Self {
        TransactionCommitter {
            services,
            points,
            commit_timeout,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn services(&self) -> &TerminalServices {
        &self.services
    }

    pub fn points_config(&self) -> &PointsConfig {
        &self.points
    }

    pub fn commit_timeout(&self) -> Duration {
        self.commit_timeout
    }

    /// Serializes checkouts against each other and against replays.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Freezes the cart and commits the sale.
    ///
    /// Returns `Err` only for checkout rejections (the cart stays as it is)
    /// and local storage failures. Remote failures produce
    /// [`CommitOutcome::Queued`].
    pub async fn checkout(&self, cart: &Cart, request: &CheckoutRequest) -> SyncResult<CommitOutcome> {
        let _gate = self.lock().await;

        let available = match &request.customer_id {
            Some(customer_id) => {
                self.services
                    .ledger
                    .balance(customer_id, &request.store_id)
                    .await?
            }
            None => 0,
        };

        let sale = freeze(cart, request, &self.points, available)?;
        debug!(
            sale_id = %sale.id,
            customer_id = %sale.customer_id,
            total = %sale.total,
            points_earned = sale.points_earned,
            points_used = sale.points_used,
            "Sale frozen"
        );

        if self.services.monitor.is_known_offline() {
            debug!(sale_id = %sale.id, "Known offline, skipping remote commit");
            return self.queue(sale, "offline").await;
        }

        match commit_remote(self.services.remote.as_ref(), &sale, self.commit_timeout).await {
            Ok(()) => {
                self.services.monitor.set(Connectivity::Online);
                self.settle(sale).await
            }
            Err(e) => {
                warn!(sale_id = %sale.id, error = %e, "Remote commit failed, queueing sale");
                if e.is_transient() {
                    self.services.monitor.set(Connectivity::Offline);
                }
                self.queue(sale, &e.to_string()).await
            }
        }
    }

    async fn settle(&self, mut sale: Sale) -> SyncResult<CommitOutcome> {
        sale.status = SaleStatus::Settled;

        // The remote already holds the sale; a local mirror failure must not
        // turn it back into an error for the operator.
        if let Err(e) = self.services.ledger.apply(&sale.ledger_delta()).await {
            error!(sale_id = %sale.id, error = %e, "Failed to mirror settled sale in local ledger");
        }

        info!(sale_id = %sale.id, store_id = %sale.store_id, "Sale settled");
        self.services.emitter.sale_settled(&sale);
        Ok(CommitOutcome::Settled(sale))
    }

    async fn queue(&self, mut sale: Sale, reason: &str) -> SyncResult<CommitOutcome> {
        sale.status = SaleStatus::Queued;

        // Durable first: the sale must exist in the outbox before the
        // optimistic ledger update.
        self.services.outbox.append(&sale).await?;
        self.services.ledger.apply(&sale.ledger_delta()).await?;

        info!(
            sale_id = %sale.id,
            store_id = %sale.store_id,
            reason = %reason,
            "Sale queued for replay"
        );
        self.services.emitter.sale_queued(&sale);
        Ok(CommitOutcome::Queued(sale))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, SyncError};
    use crate::events::recording::RecordingEmitter;
    use crate::remote::InMemoryRemote;
    use crate::test_support::{customer, product, services_backends};
    use loyalty_core::{CoreError, Money, PaymentMethod};

    fn card_request(points: i64) -> CheckoutRequest {
        CheckoutRequest {
            store_id: "store-1".into(),
            cashier_id: "cashier-1".into(),
            customer_id: Some("c-1".into()),
            points_to_redeem: points,
            payment_method: PaymentMethod::Card,
            cash_received: None,
        }
    }

    fn cart_of(price_major: i64) -> Cart {
        let mut cart = Cart::new();
        cart.add_product(&product("600", price_major), 1).unwrap();
        cart
    }

    async fn committer_with(
        remote: Arc<InMemoryRemote>,
    ) -> Vec<(&'static str, TransactionCommitter)> {
        remote.add_customer(customer(150)).await;
        let mut out = Vec::new();
        for (name, services) in services_backends(remote.clone()).await {
            services.ledger.rebase_account(&customer(150), &[]).await.unwrap();
            out.push((
                name,
                TransactionCommitter::new(services, PointsConfig::default(), Duration::from_secs(5)),
            ));
        }
        out
    }

    #[tokio::test]
    async fn test_online_checkout_settles() {
        for (name, committer) in committer_with(Arc::new(InMemoryRemote::new())).await {
            let outcome = committer
                .checkout(&cart_of(1_050), &card_request(0))
                .await
                .unwrap();

            assert!(outcome.is_settled(), "{}", name);
            let sale = outcome.sale();
            assert_eq!(sale.points_earned, 10, "{}", name);
            assert_eq!(sale.status, SaleStatus::Settled, "{}", name);

            let services = committer.services();
            assert_eq!(services.outbox.count_pending().await.unwrap(), 0, "{}", name);
            assert_eq!(services.ledger.balance("c-1", "store-1").await.unwrap(), 160, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_redemption_settles_on_both_ledgers() {
        let remote = Arc::new(InMemoryRemote::new());
        for (name, committer) in committer_with(remote.clone()).await {
            let outcome = committer
                .checkout(&cart_of(300), &card_request(50))
                .await
                .unwrap();

            let sale = outcome.sale();
            assert_eq!(sale.discount, Money::from_major(50), "{}", name);
            assert_eq!(sale.total, Money::from_major(250), "{}", name);
            assert_eq!(
                committer.services().ledger.balance("c-1", "store-1").await.unwrap(),
                100,
                "{}",
                name
            );
            assert_eq!(remote.sale(&sale.id).await.unwrap().total, sale.total, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_remote_failure_queues_with_optimistic_ledger() {
        let remote = Arc::new(InMemoryRemote::new());
        for (name, committer) in committer_with(remote.clone()).await {
            remote.fail_next_commits(1);
            let outcome = committer
                .checkout(&cart_of(1_050), &card_request(0))
                .await
                .unwrap();

            assert!(!outcome.is_settled(), "{}", name);
            let services = committer.services();
            let pending = services.outbox.list_pending().await.unwrap();
            assert_eq!(pending.len(), 1, "{}", name);
            assert_eq!(&pending[0].sale, outcome.sale(), "{}", name);
            assert_eq!(services.ledger.balance("c-1", "store-1").await.unwrap(), 160, "{}", name);
            assert!(services.monitor.is_known_offline(), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_known_offline_skips_remote() {
        let remote = Arc::new(InMemoryRemote::new());
        for (name, committer) in committer_with(remote.clone()).await {
            committer.services().monitor.set(Connectivity::Offline);

            let outcome = committer
                .checkout(&cart_of(1_050), &card_request(0))
                .await
                .unwrap();

            assert!(!outcome.is_settled(), "{}", name);
            assert_eq!(remote.committed_count().await, 0, "{}", name);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_timeout_queues() {
        let remote = Arc::new(InMemoryRemote::new());
        remote.add_customer(customer(150)).await;
        remote.set_delay(Duration::from_secs(30));

        // Memory backends only: the paused clock would also race SQLite pool timeouts
        let services = TerminalServices::in_memory(remote.clone());
        services.ledger.rebase_account(&customer(150), &[]).await.unwrap();
        let committer =
            TransactionCommitter::new(services, PointsConfig::default(), Duration::from_secs(5));

        let outcome = committer
            .checkout(&cart_of(1_050), &card_request(0))
            .await
            .unwrap();
        assert!(!outcome.is_settled());
        assert_eq!(committer.services().outbox.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejections_persist_nothing() {
        for (name, committer) in committer_with(Arc::new(InMemoryRemote::new())).await {
            let err = committer
                .checkout(&cart_of(300), &card_request(500))
                .await
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    SyncError::Checkout(CoreError::InsufficientPoints {
                        requested: 500,
                        available: 150
                    })
                ),
                "{}",
                name
            );
            assert_eq!(err.kind(), ErrorKind::Validation, "{}", name);

            let mut cash = card_request(0);
            cash.payment_method = PaymentMethod::Cash;
            cash.cash_received = Some(Money::from_major(200));
            let err = committer.checkout(&cart_of(300), &cash).await.unwrap_err();
            assert!(
                matches!(err, SyncError::Checkout(CoreError::InsufficientCash { .. })),
                "{}",
                name
            );

            let services = committer.services();
            assert_eq!(services.outbox.count_pending().await.unwrap(), 0, "{}", name);
            assert_eq!(services.ledger.balance("c-1", "store-1").await.unwrap(), 150, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let remote = Arc::new(InMemoryRemote::new());
        remote.add_customer(customer(150)).await;
        let emitter = Arc::new(RecordingEmitter::default());
        let services = TerminalServices::in_memory(remote.clone()).with_emitter(emitter.clone());
        services.ledger.rebase_account(&customer(150), &[]).await.unwrap();
        let committer =
            TransactionCommitter::new(services, PointsConfig::default(), Duration::from_secs(5));

        let settled = committer
            .checkout(&cart_of(1_050), &card_request(0))
            .await
            .unwrap();
        remote.set_offline(true);
        let queued = committer
            .checkout(&cart_of(1_050), &card_request(0))
            .await
            .unwrap();

        assert_eq!(
            emitter.events(),
            vec![
                "connectivity:online".to_string(),
                format!("settled:{}", settled.sale().id),
                "connectivity:offline".to_string(),
                format!("queued:{}", queued.sale().id),
            ]
        );
    }
}
