//! In-memory [`RemoteStore`] backed by the core [`Ledger`].
//!
//! Used by tests and demos. Faults are injected with [`InMemoryRemote::set_offline`],
//! [`InMemoryRemote::fail_next_commits`] and [`InMemoryRemote::set_delay`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use loyalty_core::{ApplyOutcome, Customer, CustomerKey, Ledger, LedgerDelta, Product, Sale};

use super::{RemoteError, RemoteResult, RemoteStore};

#[derive(Debug, Default)]
struct State {
    customers: HashMap<String, Customer>,
    products: HashMap<(String, String), Product>,
    sales: HashMap<String, Sale>,
    /// Sale ids in the order their first commit arrived.
    commit_order: Vec<String>,
    ledger: Ledger,
}

#[derive(Debug, Default)]
pub struct InMemoryRemote {
    state: Mutex<State>,
    offline: AtomicBool,
    failures_left: AtomicU32,
    delay_ms: AtomicU32,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a customer and seeds the remote ledger with its balances.
    pub async fn add_customer(&self, customer: Customer) {
        let mut state = self.state.lock().await;
        state.ledger.open_account(&customer);
        state.customers.insert(customer.id.clone(), customer);
    }

    pub async fn add_product(&self, store_id: &str, product: Product) {
        let mut state = self.state.lock().await;
        state
            .products
            .insert((store_id.to_string(), product.barcode.clone()), product);
    }

    // =========================================================================
    // Fault Injection
    // =========================================================================

    /// While offline every call fails with [`RemoteError::Unreachable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Makes the next `count` sale commits fail with a 503.
    pub fn fail_next_commits(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Delays every call, for exercising commit timeouts.
    pub fn set_delay(&self, delay: Duration) {
        let ms = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        self.delay_ms.store(ms, Ordering::SeqCst);
    }

    async fn gate(&self) -> RemoteResult<()> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(u64::from(delay))).await;
        }
        if self.is_offline() {
            return Err(RemoteError::Unreachable("in-memory remote is offline".into()));
        }
        Ok(())
    }

    fn take_injected_failure(&self) -> bool {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub async fn balance(&self, customer_id: &str, store_id: &str) -> i64 {
        self.state.lock().await.ledger.balance(customer_id, store_id)
    }

    pub async fn sale(&self, sale_id: &str) -> Option<Sale> {
        self.state.lock().await.sales.get(sale_id).cloned()
    }

    /// Sale ids in the order they were first committed.
    pub async fn commit_order(&self) -> Vec<String> {
        self.state.lock().await.commit_order.clone()
    }

    pub async fn committed_count(&self) -> usize {
        self.state.lock().await.sales.len()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn lookup_customer(&self, key: &CustomerKey) -> RemoteResult<Option<Customer>> {
        self.gate().await?;
        let state = self.state.lock().await;

        let found = match key {
            CustomerKey::Id(id) => state.customers.get(id),
            _ => state.customers.values().find(|c| key.matches(c)),
        };

        Ok(found.map(|customer| state.ledger.customer_view(customer)))
    }

    async fn lookup_product_by_barcode(
        &self,
        code: &str,
        store_id: &str,
    ) -> RemoteResult<Option<Product>> {
        self.gate().await?;
        let state = self.state.lock().await;
        Ok(state
            .products
            .get(&(store_id.to_string(), code.to_string()))
            .cloned())
    }

    async fn commit_sale(&self, sale: &Sale) -> RemoteResult<()> {
        self.gate().await?;
        if self.take_injected_failure() {
            return Err(RemoteError::Server {
                status: 503,
                message: "injected failure".into(),
            });
        }

        let mut state = self.state.lock().await;
        if state.sales.contains_key(&sale.id) {
            debug!(sale_id = %sale.id, "Duplicate sale commit ignored");
            return Ok(());
        }
        state.commit_order.push(sale.id.clone());
        state.sales.insert(sale.id.clone(), sale.clone());
        Ok(())
    }

    async fn commit_ledger_delta(&self, delta: &LedgerDelta) -> RemoteResult<()> {
        self.gate().await?;
        let mut state = self.state.lock().await;
        match state.ledger.apply(delta) {
            Ok(ApplyOutcome::Applied { .. }) | Ok(ApplyOutcome::AlreadyApplied) => Ok(()),
            Err(e) => Err(RemoteError::Rejected {
                status: 422,
                message: e.to_string(),
            }),
        }
    }

    async fn ping(&self) -> RemoteResult<()> {
        self.gate().await
    }
}
