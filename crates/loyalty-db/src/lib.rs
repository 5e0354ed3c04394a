//! # loyalty-db: Local Storage for the Loyalty Terminal
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Terminal Data Flow                               │
//! │                                                                         │
//! │  TransactionCommitter / SyncEngine (loyalty-sync)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    loyalty-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│  SaleOutbox    │   │  (embedded)  │  │   │
//! │  │   │  SqlitePool   │    │  Ledger        │   │  001..004    │  │   │
//! │  │   │               │    │  ProductCache  │   │              │  │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  terminal.db (WAL)                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loyalty_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("terminal.db")).await?;
//! db.outbox().append(&sale).await?;
//! let pending = db.outbox().list_pending().await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig};

pub use repository::ledger::LedgerRepository;
pub use repository::outbox::SaleOutboxRepository;
pub use repository::product::ProductCacheRepository;
