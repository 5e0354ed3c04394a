//! # Terminal
//!
//! The cashier-facing facade: one cart, one identified customer, one
//! committer.
//!
//! ## Cashier Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  identify_customer(email / phone / id)                                  │
//! │       │   remote lookup → ledger rebased on remote + queued deltas      │
//! │       │   unreachable   → local customer directory                      │
//! │       ▼                                                                 │
//! │  scan_barcode(code) ──► remote lookup ──ok──► cache + add to cart       │
//! │       │                      │                                          │
//! │       │                      └─ unreachable ──► product cache           │
//! │       ▼                                                                 │
//! │  preview(points) ──► live subtotal / discount / total / points          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  checkout(payment) ──► Settled | Queued   (cart cleared)                │
//! │                   └──► rejected           (cart kept for correction)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use loyalty_core::validation::validate_barcode;
use loyalty_core::{
    preview, Cart, CartSnapshot, CheckoutPreview, CheckoutRequest, CoreError, Customer,
    CustomerKey, LedgerDelta, Money, PaymentMethod, PointsTransaction, Product, ValidationError,
};

use crate::committer::{CommitOutcome, TransactionCommitter};
use crate::config::TerminalConfig;
use crate::connectivity::Connectivity;
use crate::engine::{SyncEngine, SyncEngineHandle};
use crate::error::{SyncError, SyncResult};
use crate::services::TerminalServices;

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tender {
    pub method: PaymentMethod,
    /// Cash handed over; required for cash payments only.
    pub cash_received: Option<Money>,
}

impl Tender {
    pub fn cash(received: Money) -> Self {
        Tender {
            method: PaymentMethod::Cash,
            cash_received: Some(received),
        }
    }

    pub fn card() -> Self {
        Tender {
            method: PaymentMethod::Card,
            cash_received: None,
        }
    }

    pub fn mobile() -> Self {
        Tender {
            method: PaymentMethod::Mobile,
            cash_received: None,
        }
    }
}

pub struct Terminal {
    store_id: String,
    cashier_id: String,
    retry_interval: Option<Duration>,
    committer: Arc<TransactionCommitter>,
    cart: Mutex<Cart>,
    customer: Mutex<Option<Customer>>,
    /// One checkout at a time; cart and customer stay readable meanwhile.
    checkout_gate: Mutex<()>,
}

impl Terminal {
    pub fn new(config: &TerminalConfig, services: TerminalServices) -> Self {
        let committer = TransactionCommitter::new(
            services,
            config.points.clone(),
            Duration::from_secs(config.remote.commit_timeout_secs),
        );

        let retry_interval = match config.sync.retry_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Terminal {
            store_id: config.store_id().to_string(),
            cashier_id: config.cashier_id().to_string(),
            retry_interval,
            committer: Arc::new(committer),
            cart: Mutex::new(Cart::new()),
            customer: Mutex::new(None),
            checkout_gate: Mutex::new(()),
        }
    }

    /// Builds the replay engine for this terminal's outbox.
    pub fn sync_engine(&self) -> (SyncEngine, SyncEngineHandle) {
        SyncEngine::new(self.committer.clone(), self.retry_interval)
    }

    pub fn services(&self) -> &TerminalServices {
        self.committer.services()
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn connectivity(&self) -> Connectivity {
        self.services().monitor.current()
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Resolves a barcode, falling back to the product cache when the remote
    /// cannot be reached.
    pub async fn lookup_product(&self, barcode: &str) -> SyncResult<Product> {
        let barcode = validate_barcode(barcode).map_err(CoreError::from)?;
        let services = self.services();

        if !services.monitor.is_known_offline() {
            match services
                .remote
                .lookup_product_by_barcode(&barcode, &self.store_id)
                .await
            {
                Ok(Some(product)) => {
                    services.products.put(&self.store_id, &product).await?;
                    return Ok(product);
                }
                Ok(None) => return Err(SyncError::not_found("Product", barcode)),
                Err(e) if e.is_transient() => {
                    warn!(barcode = %barcode, error = %e, "Product lookup failed, using cache");
                    services.monitor.set(Connectivity::Offline);
                }
                Err(e) => return Err(e.into()),
            }
        }

        match services.products.get(&self.store_id, &barcode).await? {
            Some(product) => {
                debug!(barcode = %barcode, "Product served from cache");
                Ok(product)
            }
            None => Err(SyncError::not_found("Product", barcode)),
        }
    }

    /// Looks up a barcode and adds it to the cart.
    pub async fn scan_barcode(&self, barcode: &str, quantity: i64) -> SyncResult<CartSnapshot> {
        let product = self.lookup_product(barcode).await?;
        let mut cart = self.cart.lock().await;
        cart.add_product(&product, quantity)?;
        Ok(cart.snapshot())
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Sets a line's quantity; zero or less removes the line.
    pub async fn set_quantity(&self, product_id: &str, quantity: i64) -> SyncResult<CartSnapshot> {
        let mut cart = self.cart.lock().await;
        cart.update_quantity(product_id, quantity)?;
        Ok(cart.snapshot())
    }

    pub async fn remove_line(&self, product_id: &str) -> SyncResult<CartSnapshot> {
        let mut cart = self.cart.lock().await;
        if !cart.remove_line(product_id) {
            return Err(CoreError::LineNotInCart(product_id.to_string()).into());
        }
        Ok(cart.snapshot())
    }

    /// Abandons the sale in progress. Nothing was persisted for it.
    pub async fn clear_cart(&self) {
        self.cart.lock().await.clear();
        *self.customer.lock().await = None;
    }

    pub async fn cart(&self) -> CartSnapshot {
        self.cart.lock().await.snapshot()
    }

    // =========================================================================
    // Customer
    // =========================================================================

    /// Identifies the customer for the current sale.
    ///
    /// Online, the local ledger is rebased on the remote record plus every
    /// sale of this customer still in the outbox. When the remote cannot be
    /// reached the customer is resolved from the local directory of earlier
    /// lookups; a customer never seen here is then reported as a transient
    /// failure, not as unknown.
    pub async fn identify_customer(&self, key: &CustomerKey) -> SyncResult<Customer> {
        let value = match key {
            CustomerKey::Id(v) | CustomerKey::Email(v) | CustomerKey::Phone(v) => v,
        };
        if value.trim().is_empty() {
            return Err(CoreError::from(ValidationError::Required {
                field: "customer".to_string(),
            })
            .into());
        }

        let view = {
            // Nothing settles or queues between the lookup and the rebase
            let _gate = self.committer.lock().await;
            self.resolve_customer(key).await?
        };

        info!(customer_id = %view.id, store_id = %self.store_id, "Customer identified");
        *self.customer.lock().await = Some(view.clone());
        Ok(view)
    }

    async fn resolve_customer(&self, key: &CustomerKey) -> SyncResult<Customer> {
        let services = self.services();

        if !services.monitor.is_known_offline() {
            match services.remote.lookup_customer(key).await {
                Ok(Some(customer)) => {
                    let queued: Vec<LedgerDelta> = services
                        .outbox
                        .list_pending()
                        .await?
                        .into_iter()
                        .filter(|entry| entry.sale.customer_id == customer.id)
                        .map(|entry| entry.sale.ledger_delta())
                        .collect();
                    return services.ledger.rebase_account(&customer, &queued).await;
                }
                Ok(None) => return Err(SyncError::not_found("Customer", key.to_string())),
                Err(e) if e.is_transient() => {
                    warn!(customer = %key, error = %e, "Customer lookup failed, using local directory");
                    services.monitor.set(Connectivity::Offline);
                }
                Err(e) => return Err(e.into()),
            }
        }

        match services.ledger.find_customer(key).await? {
            Some(customer) => {
                debug!(customer_id = %customer.id, "Customer served from local directory");
                Ok(customer)
            }
            None => Err(SyncError::not_found("Customer", key.to_string())),
        }
    }

    pub async fn current_customer(&self) -> Option<Customer> {
        self.customer.lock().await.clone()
    }

    /// Points the current customer can spend at this store.
    pub async fn available_points(&self) -> SyncResult<i64> {
        match self.customer.lock().await.as_ref() {
            Some(customer) => self
                .services()
                .ledger
                .balance(&customer.id, &self.store_id)
                .await,
            None => Ok(0),
        }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Live totals for the cart with `points_requested` clamped to the
    /// customer's balance.
    pub async fn preview(&self, points_requested: i64) -> SyncResult<CheckoutPreview> {
        let available = self.available_points().await?;
        let snapshot = self.cart().await;
        Ok(preview(
            &snapshot,
            points_requested,
            available,
            self.committer.points_config(),
        ))
    }

    /// Confirms the sale. The cart and customer are cleared unless the
    /// checkout was rejected.
    ///
    /// The cart is frozen from a snapshot, so the cart and customer can be
    /// read while the remote commit is in flight. Edits made during that
    /// window are cleared with the sold cart.
    pub async fn checkout(&self, tender: Tender, points_to_redeem: i64) -> SyncResult<CommitOutcome> {
        let _checkout = self.checkout_gate.lock().await;

        let cart = self.cart.lock().await.clone();
        let customer_id = self.customer.lock().await.as_ref().map(|c| c.id.clone());

        let request = CheckoutRequest {
            store_id: self.store_id.clone(),
            cashier_id: self.cashier_id.clone(),
            customer_id,
            points_to_redeem,
            payment_method: tender.method,
            cash_received: tender.cash_received,
        };

        let outcome = self.committer.checkout(&cart, &request).await?;

        self.cart.lock().await.clear();
        *self.customer.lock().await = None;
        Ok(outcome)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Sales saved offline and not yet settled.
    pub async fn pending_count(&self) -> SyncResult<i64> {
        self.services().outbox.count_pending().await
    }

    pub async fn history(&self, customer_id: &str) -> SyncResult<Vec<PointsTransaction>> {
        self.services().ledger.history(customer_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
