//! Fixtures shared by the unit tests. Every storage-facing test runs once
//! per backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use loyalty_core::{Customer, Money, PaymentMethod, Product, Sale, SaleLine, SaleStatus};
use loyalty_db::{Database, DbConfig};

use crate::ledger::{LedgerStore, MemoryLedger};
use crate::outbox::{MemoryOutbox, Outbox};
use crate::remote::InMemoryRemote;
use crate::services::TerminalServices;

pub(crate) fn customer(balance: i64) -> Customer {
    let mut points_balance = BTreeMap::new();
    points_balance.insert("store-1".to_string(), balance);

    Customer {
        id: "c-1".into(),
        name: "Ana Machava".into(),
        email: Some("ana@example.com".into()),
        phone: Some("841234567".into()),
        points_balance,
        total_purchases: Money::zero(),
    }
}

pub(crate) fn product(barcode: &str, price_major: i64) -> Product {
    Product {
        id: format!("p-{}", barcode),
        barcode: barcode.to_string(),
        name: format!("Produto {}", barcode),
        price: Money::from_major(price_major),
        currency: "MZN".into(),
    }
}

/// A frozen card sale for `c-1` at `store-1`.
pub(crate) fn sale_for(id: &str, points_earned: i64, points_used: i64) -> Sale {
    let subtotal = Money::from_major(1_000);
    let discount = Money::from_major(points_used);

    Sale {
        id: id.to_string(),
        store_id: "store-1".into(),
        cashier_id: "cashier-1".into(),
        customer_id: "c-1".into(),
        items: vec![SaleLine {
            product_id: "p-1".into(),
            name_snapshot: "Arroz 5kg".into(),
            quantity: 1,
            unit_price: subtotal,
            line_total: subtotal,
        }],
        subtotal,
        discount,
        points_used,
        points_earned,
        total: subtotal.saturating_sub_to_zero(discount),
        payment_method: PaymentMethod::Card,
        cash_received: None,
        currency: "MZN".into(),
        status: SaleStatus::Queued,
        created_at: Utc::now(),
    }
}

async fn sqlite() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub(crate) async fn outbox_backends() -> Vec<(&'static str, Arc<dyn Outbox>)> {
    vec![
        ("memory", Arc::new(MemoryOutbox::new()) as Arc<dyn Outbox>),
        ("sqlite", Arc::new(sqlite().await.outbox()) as Arc<dyn Outbox>),
    ]
}

pub(crate) async fn ledger_backends() -> Vec<(&'static str, Arc<dyn LedgerStore>)> {
    vec![
        ("memory", Arc::new(MemoryLedger::new()) as Arc<dyn LedgerStore>),
        ("sqlite", Arc::new(sqlite().await.ledger()) as Arc<dyn LedgerStore>),
    ]
}

/// In-memory and SQLite services sharing one remote.
pub(crate) async fn services_backends(
    remote: Arc<InMemoryRemote>,
) -> Vec<(&'static str, TerminalServices)> {
    let db = sqlite().await;
    vec![
        ("memory", TerminalServices::in_memory(remote.clone())),
        ("sqlite", TerminalServices::sqlite(&db, remote)),
    ]
}
