//! # Domain Types
//!
//! Core domain types used throughout the loyalty terminal.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │   Customer      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id (UUID)      │   │  id             │       │
//! │  │  barcode        │   │  items          │   │  email / phone  │       │
//! │  │  name           │   │  subtotal       │   │  points_balance │       │
//! │  │  price          │   │  discount       │   │   store → pts   │       │
//! │  └─────────────────┘   │  points ±       │   └─────────────────┘       │
//! │                        │  total, status  │                              │
//! │                        └────────┬────────┘                              │
//! │                                 │ ledger_delta()                        │
//! │                                 ▼                                       │
//! │                        ┌─────────────────┐   ┌─────────────────┐       │
//! │                        │  LedgerDelta    │──►│PointsTransaction│       │
//! │                        │  sale_id (key)  │   │  earn / redeem  │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Wire and outbox payloads use camelCase field names (`storeId`,
//! `pointsEarned`, `createdAt`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A catalog product as returned by a barcode lookup.
///
/// Owned by the external catalog; the terminal never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub barcode: String,
    pub name: String,
    /// Unit price in minor units.
    pub price: Money,
    pub currency: String,
}

// =============================================================================
// Customer
// =============================================================================

/// How the cashier identifies a customer at the till.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum CustomerKey {
    Id(String),
    Email(String),
    Phone(String),
}

impl CustomerKey {
    /// Whether `customer` is the one this key identifies.
    pub fn matches(&self, customer: &Customer) -> bool {
        match self {
            CustomerKey::Id(id) => customer.id == *id,
            CustomerKey::Email(email) => customer.email.as_deref() == Some(email.as_str()),
            CustomerKey::Phone(phone) => customer.phone.as_deref() == Some(phone.as_str()),
        }
    }
}

impl std::fmt::Display for CustomerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CustomerKey::Id(v) => write!(f, "id:{}", v),
            CustomerKey::Email(v) => write!(f, "email:{}", v),
            CustomerKey::Phone(v) => write!(f, "phone:{}", v),
        }
    }
}

/// A loyalty program member.
///
/// `points_balance` is only ever changed through ledger deltas, never by
/// overwriting the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Store id → non-negative points balance.
    #[serde(default)]
    pub points_balance: BTreeMap<String, i64>,
    /// Lifetime spend across all stores.
    #[serde(default)]
    pub total_purchases: Money,
}

impl Customer {
    /// Balance at a single store, zero if the customer never bought there.
    pub fn balance_at(&self, store_id: &str) -> i64 {
        self.points_balance.get(store_id).copied().unwrap_or(0)
    }

    /// Balance summed across every store.
    pub fn total_points(&self) -> i64 {
        self.points_balance.values().sum()
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// Lifecycle of a frozen sale.
///
/// ```text
/// checkout confirmed ──► Queued ──(remote commit ok)──► Settled
/// ```
///
/// A settled sale never goes back to queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Frozen, waiting for a successful remote commit.
    Queued,
    /// Remote commit succeeded.
    Settled,
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Queued
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaleStatus::Queued => write!(f, "queued"),
            SaleStatus::Settled => write!(f, "settled"),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash; the only method that yields change.
    Cash,
    /// Card on an external terminal.
    Card,
    /// Mobile money.
    Mobile,
}

impl PaymentMethod {
    pub fn is_cash(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A committed line item with product data frozen at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

/// The core transactional record.
///
/// Every monetary and points field is frozen at checkout. Only `status`
/// changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    /// Client-generated UUID v4; the idempotency key everywhere.
    pub id: String,
    pub store_id: String,
    pub cashier_id: String,
    pub customer_id: String,
    pub items: Vec<SaleLine>,
    pub subtotal: Money,
    pub discount: Money,
    pub points_used: i64,
    pub points_earned: i64,
    /// `max(0, subtotal − discount)`.
    pub total: Money,
    pub payment_method: PaymentMethod,
    /// Cash handed over; only set for cash payments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_received: Option<Money>,
    pub currency: String,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Net points change for the customer at this store.
    #[inline]
    pub fn net_points(&self) -> i64 {
        self.points_earned - self.points_used
    }

    /// Change owed to the customer for cash payments.
    pub fn change_due(&self) -> Option<Money> {
        self.cash_received.map(|received| received - self.total)
    }

    pub fn is_settled(&self) -> bool {
        self.status == SaleStatus::Settled
    }

    /// The ledger effect of this sale, keyed by its id.
    pub fn ledger_delta(&self) -> LedgerDelta {
        LedgerDelta {
            sale_id: self.id.clone(),
            customer_id: self.customer_id.clone(),
            store_id: self.store_id.clone(),
            points_earned: self.points_earned,
            points_used: self.points_used,
            purchase_total: self.total,
        }
    }
}

// =============================================================================
// Outbox Entry
// =============================================================================

/// A queued sale plus its outbox bookkeeping.
///
/// `seq` is the enqueue order; replay walks entries by ascending `seq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub seq: i64,
    pub sale: Sale,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

// =============================================================================
// Ledger Delta
// =============================================================================

/// One sale's effect on a customer's points at one store.
///
/// `sale_id` makes application idempotent: a ledger that has already seen
/// the id treats a second application as a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDelta {
    pub sale_id: String,
    pub customer_id: String,
    pub store_id: String,
    pub points_earned: i64,
    pub points_used: i64,
    /// Amount the customer paid, accumulated into lifetime purchases.
    pub purchase_total: Money,
}

impl LedgerDelta {
    /// `+points_earned − points_used`.
    #[inline]
    pub fn delta(&self) -> i64 {
        self.points_earned - self.points_used
    }
}

// =============================================================================
// Points Transactions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PointsTransactionKind {
    Earn,
    Redeem,
}

/// A single history entry produced when a delta is applied.
///
/// A sale that both earns and redeems produces two entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsTransaction {
    pub customer_id: String,
    pub store_id: String,
    pub sale_id: String,
    pub kind: PointsTransactionKind,
    /// Always positive; the kind carries the direction.
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

impl PointsTransaction {
    /// Expands a delta into its earn/redeem history entries.
    pub fn from_delta(delta: &LedgerDelta, at: DateTime<Utc>) -> Vec<PointsTransaction> {
        let entry = |kind, points| PointsTransaction {
            customer_id: delta.customer_id.clone(),
            store_id: delta.store_id.clone(),
            sale_id: delta.sale_id.clone(),
            kind,
            points,
            created_at: at,
        };

        let mut entries = Vec::with_capacity(2);
        if delta.points_used > 0 {
            entries.push(entry(PointsTransactionKind::Redeem, delta.points_used));
        }
        if delta.points_earned > 0 {
            entries.push(entry(PointsTransactionKind::Earn, delta.points_earned));
        }
        entries
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sale() -> Sale {
        Sale {
            id: "sale-1".into(),
            store_id: "store-1".into(),
            cashier_id: "cashier-1".into(),
            customer_id: "cust-1".into(),
            items: vec![SaleLine {
                product_id: "p-1".into(),
                name_snapshot: "Arroz Branco 5kg".into(),
                quantity: 2,
                unit_price: Money::from_major(450),
                line_total: Money::from_major(900),
            }],
            subtotal: Money::from_major(900),
            discount: Money::from_major(50),
            points_used: 50,
            points_earned: 10,
            total: Money::from_major(850),
            payment_method: PaymentMethod::Cash,
            cash_received: Some(Money::from_major(1000)),
            currency: "MZN".into(),
            status: SaleStatus::Queued,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sale_status_default() {
        assert_eq!(SaleStatus::default(), SaleStatus::Queued);
    }

    #[test]
    fn test_customer_balances() {
        let mut customer = Customer {
            id: "cust-1".into(),
            name: "Ana".into(),
            email: None,
            phone: Some("+258840000000".into()),
            points_balance: BTreeMap::new(),
            total_purchases: Money::zero(),
        };
        customer.points_balance.insert("store-1".into(), 150);
        customer.points_balance.insert("store-2".into(), 30);

        assert_eq!(customer.balance_at("store-1"), 150);
        assert_eq!(customer.balance_at("store-9"), 0);
        assert_eq!(customer.total_points(), 180);
    }

    #[test]
    fn test_sale_delta_and_change() {
        let sale = test_sale();
        assert_eq!(sale.net_points(), -40);
        assert_eq!(sale.change_due(), Some(Money::from_major(150)));

        let delta = sale.ledger_delta();
        assert_eq!(delta.sale_id, "sale-1");
        assert_eq!(delta.delta(), -40);
        assert_eq!(delta.purchase_total, Money::from_major(850));
    }

    #[test]
    fn test_sale_payload_field_names() {
        let json = serde_json::to_value(test_sale()).unwrap();
        for field in [
            "id",
            "storeId",
            "customerId",
            "items",
            "subtotal",
            "discount",
            "pointsEarned",
            "pointsUsed",
            "total",
            "paymentMethod",
            "status",
            "createdAt",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert_eq!(json["status"], "queued");
        assert_eq!(json["paymentMethod"], "cash");
    }

    #[test]
    fn test_transactions_from_delta() {
        let delta = test_sale().ledger_delta();
        let entries = PointsTransaction::from_delta(&delta, Utc::now());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, PointsTransactionKind::Redeem);
        assert_eq!(entries[0].points, 50);
        assert_eq!(entries[1].kind, PointsTransactionKind::Earn);
        assert_eq!(entries[1].points, 10);
    }

    #[test]
    fn test_customer_key_serialization() {
        let key = CustomerKey::Email("ana@example.com".into());
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"{"by":"email","value":"ana@example.com"}"#);
        assert_eq!(key.to_string(), "email:ana@example.com");
    }
}
