//! # Sale Outbox
//!
//! Storage seam for queued sales.
//!
//! ## Backends
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Outbox Trait                                     │
//! │                                                                         │
//! │  append(sale)          idempotent by sale id                            │
//! │  list_pending()        queued entries, enqueue order                    │
//! │  mark_settled(id)      queued → settled, never back                     │
//! │  record_failure(id)    attempts += 1, entry stays queued                │
//! │  count_pending()                                                        │
//! │                                                                         │
//! │  ┌──────────────────────────────┐  ┌──────────────────────────────┐    │
//! │  │ SaleOutboxRepository         │  │ MemoryOutbox                 │    │
//! │  │ (loyalty-db, SQLite)         │  │ (tests, volatile terminals)  │    │
//! │  │ survives restarts            │  │                              │    │
//! │  └──────────────────────────────┘  └──────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use loyalty_core::{OutboxEntry, Sale, SaleStatus};
use loyalty_db::SaleOutboxRepository;

use crate::error::{SyncError, SyncResult};

/// Ordered, idempotent store of queued sales.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Queues a sale. Returns `false` if the id was already present.
    async fn append(&self, sale: &Sale) -> SyncResult<bool>;

    /// Queued entries, oldest first.
    async fn list_pending(&self) -> SyncResult<Vec<OutboxEntry>>;

    /// Returns `false` if the sale was not queued.
    async fn mark_settled(&self, sale_id: &str) -> SyncResult<bool>;

    async fn record_failure(&self, sale_id: &str, error: &str) -> SyncResult<()>;

    async fn count_pending(&self) -> SyncResult<i64>;
}

#[async_trait]
impl Outbox for SaleOutboxRepository {
    async fn append(&self, sale: &Sale) -> SyncResult<bool> {
        Ok(SaleOutboxRepository::append(self, sale).await?)
    }

    async fn list_pending(&self) -> SyncResult<Vec<OutboxEntry>> {
        Ok(SaleOutboxRepository::list_pending(self).await?)
    }

    async fn mark_settled(&self, sale_id: &str) -> SyncResult<bool> {
        Ok(SaleOutboxRepository::mark_settled(self, sale_id).await?)
    }

    async fn record_failure(&self, sale_id: &str, error: &str) -> SyncResult<()> {
        Ok(SaleOutboxRepository::record_failure(self, sale_id, error).await?)
    }

    async fn count_pending(&self) -> SyncResult<i64> {
        Ok(SaleOutboxRepository::count_pending(self).await?)
    }
}

// =============================================================================
// Memory Outbox
// =============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    next_seq: i64,
    /// Every entry ever appended, settled ones included, in seq order.
    entries: Vec<OutboxEntry>,
}

/// Volatile outbox with the same semantics as the SQLite one.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    state: Mutex<MemoryState>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an entry in any status.
    pub async fn get(&self, sale_id: &str) -> Option<OutboxEntry> {
        let state = self.state.lock().await;
        state.entries.iter().find(|e| e.sale.id == sale_id).cloned()
    }
}

#[async_trait]
impl Outbox for MemoryOutbox {
    async fn append(&self, sale: &Sale) -> SyncResult<bool> {
        let mut state = self.state.lock().await;
        if state.entries.iter().any(|e| e.sale.id == sale.id) {
            return Ok(false);
        }

        state.next_seq += 1;
        let mut queued = sale.clone();
        queued.status = SaleStatus::Queued;
        let entry = OutboxEntry {
            seq: state.next_seq,
            sale: queued,
            attempts: 0,
            last_error: None,
            enqueued_at: Utc::now(),
        };
        state.entries.push(entry);
        Ok(true)
    }

    async fn list_pending(&self) -> SyncResult<Vec<OutboxEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.sale.status == SaleStatus::Queued)
            .cloned()
            .collect())
    }

    async fn mark_settled(&self, sale_id: &str) -> SyncResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .entries
            .iter_mut()
            .find(|e| e.sale.id == sale_id && e.sale.status == SaleStatus::Queued)
        {
            Some(entry) => {
                entry.sale.status = SaleStatus::Settled;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_failure(&self, sale_id: &str, error: &str) -> SyncResult<()> {
        let mut state = self.state.lock().await;
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.sale.id == sale_id && e.sale.status == SaleStatus::Queued)
            .ok_or_else(|| SyncError::not_found("Queued sale", sale_id))?;

        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        Ok(())
    }

    async fn count_pending(&self) -> SyncResult<i64> {
        let state = self.state.lock().await;
        let pending = state
            .entries
            .iter()
            .filter(|e| e.sale.status == SaleStatus::Queued)
            .count();
        Ok(i64::try_from(pending).unwrap_or(i64::MAX))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{outbox_backends, sale_for};

    #[tokio::test]
    async fn test_append_is_idempotent_on_every_backend() {
        for (name, outbox) in outbox_backends().await {
            let sale = sale_for("s1", 10, 0);
            assert!(outbox.append(&sale).await.unwrap(), "{}", name);
            assert!(!outbox.append(&sale).await.unwrap(), "{}", name);
            assert_eq!(outbox.count_pending().await.unwrap(), 1, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_pending_is_fifo_on_every_backend() {
        for (name, outbox) in outbox_backends().await {
            for id in ["s-3", "s-1", "s-2"] {
                outbox.append(&sale_for(id, 10, 0)).await.unwrap();
            }
            outbox.mark_settled("s-1").await.unwrap();

            let ids: Vec<String> = outbox
                .list_pending()
                .await
                .unwrap()
                .into_iter()
                .map(|e| e.sale.id)
                .collect();
            assert_eq!(ids, vec!["s-3", "s-2"], "{}", name);
        }
    }

    #[tokio::test]
    async fn test_settled_is_terminal_on_every_backend() {
        for (name, outbox) in outbox_backends().await {
            outbox.append(&sale_for("s1", 10, 0)).await.unwrap();
            assert!(outbox.mark_settled("s1").await.unwrap(), "{}", name);
            assert!(!outbox.mark_settled("s1").await.unwrap(), "{}", name);
            assert!(!outbox.append(&sale_for("s1", 10, 0)).await.unwrap(), "{}", name);
            assert!(outbox.record_failure("s1", "late").await.is_err(), "{}", name);
            assert_eq!(outbox.count_pending().await.unwrap(), 0, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_memory_failure_bookkeeping() {
        let outbox = MemoryOutbox::new();
        outbox.append(&sale_for("s1", 10, 0)).await.unwrap();
        outbox.record_failure("s1", "timeout").await.unwrap();

        let entry = outbox.get("s1").await.unwrap();
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.last_error.as_deref(), Some("timeout"));
        assert_eq!(entry.sale.status, SaleStatus::Queued);
    }
}
