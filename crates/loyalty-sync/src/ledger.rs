//! Storage seam for the terminal's local points ledger.
//!
//! The local ledger is what the committer checks redemptions against and
//! what it updates optimistically when a sale is queued. Between lookups
//! deltas are the only write path. A successful lookup rebases the account
//! on the remote record plus the deltas still queued in the outbox, and
//! records the contact details used to identify the customer offline.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use loyalty_core::{
    ApplyOutcome, Customer, CustomerKey, Ledger, LedgerDelta, PointsTransaction,
};
use loyalty_db::LedgerRepository;

use crate::error::SyncResult;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Applies a sale's delta at most once.
    async fn apply(&self, delta: &LedgerDelta) -> SyncResult<ApplyOutcome>;

    /// Balance at one store, 0 if unknown.
    async fn balance(&self, customer_id: &str, store_id: &str) -> SyncResult<i64>;

    async fn balances(&self, customer_id: &str) -> SyncResult<BTreeMap<String, i64>>;

    /// Resets the account to `customer` plus `queued`, which must be every
    /// delta for this customer not yet settled remotely.
    async fn rebase_account(
        &self,
        customer: &Customer,
        queued: &[LedgerDelta],
    ) -> SyncResult<Customer>;

    /// A customer recorded by an earlier rebase, with current balances.
    async fn find_customer(&self, key: &CustomerKey) -> SyncResult<Option<Customer>>;

    /// The customer record with the ledger's balances and totals.
    async fn customer_view(&self, customer: &Customer) -> SyncResult<Customer>;

    async fn history(&self, customer_id: &str) -> SyncResult<Vec<PointsTransaction>>;
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    async fn apply(&self, delta: &LedgerDelta) -> SyncResult<ApplyOutcome> {
        Ok(LedgerRepository::apply(self, delta).await?)
    }

    async fn balance(&self, customer_id: &str, store_id: &str) -> SyncResult<i64> {
        Ok(LedgerRepository::balance(self, customer_id, store_id).await?)
    }

    async fn balances(&self, customer_id: &str) -> SyncResult<BTreeMap<String, i64>> {
        Ok(LedgerRepository::balances(self, customer_id).await?)
    }

    async fn rebase_account(
        &self,
        customer: &Customer,
        queued: &[LedgerDelta],
    ) -> SyncResult<Customer> {
        Ok(LedgerRepository::rebase_account(self, customer, queued).await?)
    }

    async fn find_customer(&self, key: &CustomerKey) -> SyncResult<Option<Customer>> {
        Ok(LedgerRepository::find_customer(self, key).await?)
    }

    async fn customer_view(&self, customer: &Customer) -> SyncResult<Customer> {
        Ok(LedgerRepository::customer_view(self, customer).await?)
    }

    async fn history(&self, customer_id: &str) -> SyncResult<Vec<PointsTransaction>> {
        Ok(LedgerRepository::history(self, customer_id).await?)
    }
}

/// [`LedgerStore`] over the in-memory core [`Ledger`].
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<Ledger>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn apply(&self, delta: &LedgerDelta) -> SyncResult<ApplyOutcome> {
        let mut ledger = self.inner.lock().await;
        Ok(ledger.apply(delta).map_err(loyalty_core::CoreError::from)?)
    }

    async fn balance(&self, customer_id: &str, store_id: &str) -> SyncResult<i64> {
        Ok(self.inner.lock().await.balance(customer_id, store_id))
    }

    async fn balances(&self, customer_id: &str) -> SyncResult<BTreeMap<String, i64>> {
        Ok(self.inner.lock().await.balances(customer_id))
    }

    async fn rebase_account(
        &self,
        customer: &Customer,
        queued: &[LedgerDelta],
    ) -> SyncResult<Customer> {
        Ok(self.inner.lock().await.rebase_account(customer, queued))
    }

    async fn find_customer(&self, key: &CustomerKey) -> SyncResult<Option<Customer>> {
        Ok(self.inner.lock().await.find_customer(key))
    }

    async fn customer_view(&self, customer: &Customer) -> SyncResult<Customer> {
        Ok(self.inner.lock().await.customer_view(customer))
    }

    async fn history(&self, customer_id: &str) -> SyncResult<Vec<PointsTransaction>> {
        Ok(self.inner.lock().await.history(customer_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{customer, ledger_backends, sale_for};

    #[tokio::test]
    async fn test_apply_once_on_every_backend() {
        for (name, ledger) in ledger_backends().await {
            ledger.rebase_account(&customer(150), &[]).await.unwrap();
            let delta = sale_for("s1", 10, 50).ledger_delta();

            assert!(ledger.apply(&delta).await.unwrap().was_applied(), "{}", name);
            assert_eq!(
                ledger.apply(&delta).await.unwrap(),
                ApplyOutcome::AlreadyApplied,
                "{}",
                name
            );
            assert_eq!(ledger.balance("c-1", "store-1").await.unwrap(), 110, "{}", name);
            assert_eq!(ledger.history("c-1").await.unwrap().len(), 2, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_negative_balance_rejected_on_every_backend() {
        for (name, ledger) in ledger_backends().await {
            ledger.rebase_account(&customer(20), &[]).await.unwrap();
            let delta = sale_for("s1", 0, 50).ledger_delta();

            assert!(ledger.apply(&delta).await.is_err(), "{}", name);
            assert_eq!(ledger.balance("c-1", "store-1").await.unwrap(), 20, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_rebase_and_find_on_every_backend() {
        for (name, ledger) in ledger_backends().await {
            ledger.rebase_account(&customer(150), &[]).await.unwrap();
            let queued = sale_for("s1", 10, 0).ledger_delta();
            ledger.apply(&queued).await.unwrap();

            // Another terminal redeemed 100 since the last lookup
            let view = ledger
                .rebase_account(&customer(50), &[queued])
                .await
                .unwrap();
            assert_eq!(view.balance_at("store-1"), 60, "{}", name);
            assert_eq!(ledger.balance("c-1", "store-1").await.unwrap(), 60, "{}", name);

            let found = ledger
                .find_customer(&CustomerKey::Phone("841234567".into()))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(found.id, "c-1", "{}", name);
            assert_eq!(found.balance_at("store-1"), 60, "{}", name);
            assert!(
                ledger
                    .find_customer(&CustomerKey::Email("nobody@example.com".into()))
                    .await
                    .unwrap()
                    .is_none(),
                "{}",
                name
            );
        }
    }
}
