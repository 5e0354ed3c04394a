//! Wiring bundle shared by the committer, the sync engine and the terminal.

use std::sync::Arc;

use loyalty_db::Database;

use crate::connectivity::ConnectivityMonitor;
use crate::events::{NoOpEmitter, TerminalEventEmitter};
use crate::ledger::{LedgerStore, MemoryLedger};
use crate::outbox::{MemoryOutbox, Outbox};
use crate::products::{MemoryProductCache, ProductCache};
use crate::remote::RemoteStore;

/// Collaborators of a terminal. Cloning shares every collaborator.
#[derive(Clone)]
pub struct TerminalServices {
    pub remote: Arc<dyn RemoteStore>,
    pub outbox: Arc<dyn Outbox>,
    pub ledger: Arc<dyn LedgerStore>,
    pub products: Arc<dyn ProductCache>,
    pub monitor: ConnectivityMonitor,
    pub emitter: Arc<dyn TerminalEventEmitter>,
}

impl TerminalServices {
    /// Durable services backed by the terminal database.
    pub fn sqlite(db: &Database, remote: Arc<dyn RemoteStore>) -> Self {
        TerminalServices {
            remote,
            outbox: Arc::new(db.outbox()),
            ledger: Arc::new(db.ledger()),
            products: Arc::new(db.products()),
            monitor: ConnectivityMonitor::new(),
            emitter: Arc::new(NoOpEmitter),
        }
    }

    /// Volatile services; queued sales are lost on restart.
    pub fn in_memory(remote: Arc<dyn RemoteStore>) -> Self {
        TerminalServices {
            remote,
            outbox: Arc::new(MemoryOutbox::new()),
            ledger: Arc::new(MemoryLedger::new()),
            products: Arc::new(MemoryProductCache::new()),
            monitor: ConnectivityMonitor::new(),
            emitter: Arc::new(NoOpEmitter),
        }
    }

    /// Routes events to `emitter`, including connectivity transitions.
    pub fn with_emitter(mut self, emitter: Arc<dyn TerminalEventEmitter>) -> Self {
        self.monitor = ConnectivityMonitor::with_emitter(emitter.clone());
        self.emitter = emitter;
        self
    }
}
