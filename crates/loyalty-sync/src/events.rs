//! Terminal notifications for the host UI.
//!
//! ```text
//! committer ──► sale_settled / sale_queued ("saved offline" banner)
//! engine    ──► sync_progress ("N sales synchronized") / replay_failed
//! monitor   ──► connectivity_changed
//! ```

use loyalty_core::Sale;

use crate::connectivity::Connectivity;

/// Receives terminal events. Implemented by the host UI integration.
pub trait TerminalEventEmitter: Send + Sync {
    fn sale_settled(&self, sale: &Sale);

    /// The sale was saved offline and will be replayed later.
    fn sale_queued(&self, sale: &Sale);

    /// Emitted after each replay pass.
    fn sync_progress(&self, pending: i64, settled: usize);

    fn connectivity_changed(&self, state: Connectivity);

    fn replay_failed(&self, sale_id: &str, reason: &str);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl TerminalEventEmitter for NoOpEmitter {
    fn sale_settled(&self, _sale: &Sale) {}
    fn sale_queued(&self, _sale: &Sale) {}
    fn sync_progress(&self, _pending: i64, _settled: usize) {}
    fn connectivity_changed(&self, _state: Connectivity) {}
    fn replay_failed(&self, _sale_id: &str, _reason: &str) {}
}
