//! # loyalty-sync: Commit, Queue and Replay for the Loyalty Terminal
//!
//! This crate turns a frozen sale into a durable fact. Online, a sale is
//! committed to the remote store straight away; offline, it lands in the
//! local outbox and the sync engine replays it once the remote is back.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Terminal Sync Architecture                       │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 Terminal (cashier-facing facade)                 │  │
//! │  │     scan ──► cart ──► identify ──► preview ──► checkout          │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │  ┌────────────────────────────▼─────────────────────────────────────┐  │
//! │  │                    TransactionCommitter                          │  │
//! │  │                                                                  │  │
//! │  │  freeze ──► remote commit ──ok──► Settled + local ledger mirror  │  │
//! │  │                   │                                              │  │
//! │  │                   └──fail──► outbox append + optimistic ledger   │  │
//! │  └──────────┬──────────────────────────────────────┬────────────────┘  │
//! │             │                                      │                    │
//! │  ┌──────────▼─────────┐  ┌─────────────────┐  ┌────▼───────────────┐   │
//! │  │ ConnectivityProbe  │  │   SyncEngine    │  │  Outbox / Ledger   │   │
//! │  │                    │  │                 │  │  / ProductCache    │   │
//! │  │ pings the remote,  │─►│ replays queued  │─►│                    │   │
//! │  │ backs off while    │  │ sales FIFO on   │  │ SQLite (loyalty-db)│   │
//! │  │ offline            │  │ reconnect/timer │  │ or in-memory       │   │
//! │  └────────────────────┘  └─────────────────┘  └────────────────────┘   │
//! │                                                                         │
//! │  EVENTS (TerminalEventEmitter):                                         │
//! │  • sale settled / sale queued                                           │
//! │  • sync progress (pending, settled)                                     │
//! │  • connectivity changed                                                 │
//! │  • replay failed                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`terminal`] - Cashier workflow: cart, customer, preview, checkout
//! - [`committer`] - Online-first commit with offline fallback
//! - [`engine`] - Outbox replay loop
//! - [`connectivity`] - Connectivity state and the background probe
//! - [`remote`] - Remote store trait plus HTTP and in-memory clients
//! - [`outbox`], [`ledger`], [`products`] - Local storage seams
//! - [`services`] - Wiring bundle for the above
//! - [`config`] - Terminal configuration (TOML + env)
//! - [`events`] - Event emitter trait
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loyalty_sync::{HttpRemote, Terminal, TerminalConfig, TerminalServices, Tender};
//!
//! let config = TerminalConfig::load_or_default(None);
//! let remote = Arc::new(HttpRemote::new(&config.remote)?);
//! let terminal = Terminal::new(&config, TerminalServices::sqlite(&db, remote));
//!
//! let (engine, engine_handle) = terminal.sync_engine();
//! tokio::spawn(engine.run());
//!
//! terminal.identify_customer(&CustomerKey::Email("ana@example.com".into())).await?;
//! terminal.scan_barcode("6001234567890", 1).await?;
//! let outcome = terminal.checkout(Tender::card(), 0).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod committer;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod outbox;
pub mod products;
pub mod remote;
pub mod services;
pub mod terminal;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use committer::{CommitOutcome, TransactionCommitter};
pub use config::{RemoteSettings, SyncSettings, TerminalConfig};
pub use connectivity::{Connectivity, ConnectivityMonitor, ConnectivityProbe, ProbeConfig, ProbeHandle};
pub use engine::{SyncEngine, SyncEngineHandle, SyncReport};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use events::{NoOpEmitter, TerminalEventEmitter};
pub use ledger::{LedgerStore, MemoryLedger};
pub use outbox::{MemoryOutbox, Outbox};
pub use products::{MemoryProductCache, ProductCache};
pub use remote::{HttpRemote, InMemoryRemote, RemoteError, RemoteStore};
pub use services::TerminalServices;
pub use terminal::{Tender, Terminal};
