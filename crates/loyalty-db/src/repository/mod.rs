//! # Repository Module
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Database                                                               │
//! │  ├── outbox()   → SaleOutboxRepository    (sale_outbox)                 │
//! │  ├── ledger()   → LedgerRepository        (points_balances,             │
//! │  │                                         customer_totals,             │
//! │  │                                         ledger_applied_sales,        │
//! │  │                                         points_transactions)         │
//! │  └── products() → ProductCacheRepository  (product_cache)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQL stays in this module; loyalty-sync sees only the storage traits it
//! implements on top of these repositories.

pub mod ledger;
pub mod outbox;
pub mod product;
