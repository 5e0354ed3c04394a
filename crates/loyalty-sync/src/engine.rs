//! # Sync Engine
//!
//! Replays queued sales once the remote store is reachable again.
//!
//! ## Replay Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sync Engine Loop                                │
//! │                                                                         │
//! │  Triggers:                                                              │
//! │  • connectivity → Online (watch channel)                                │
//! │  • retry interval tick while online (if enabled)                        │
//! │  • SyncEngineHandle::sync_now()                                         │
//! │                                                                         │
//! │  replay():                                                              │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │ for entry in outbox.list_pending()     (ascending seq = FIFO)     │ │
//! │  │     commit_remote(entry.sale)          (frozen totals, verbatim)  │ │
//! │  │       ok  ──► outbox.mark_settled()    ledger NOT touched again   │ │
//! │  │       err ──► outbox.record_failure()  stays queued, continue     │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! │                                                                         │
//! │  A queued sale never expires: it stays eligible until it settles.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use loyalty_core::{OutboxEntry, SaleStatus};

use crate::committer::{commit_remote, TransactionCommitter};
use crate::connectivity::Connectivity;
use crate::error::{SyncError, SyncResult};

/// Outcome of one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub attempted: usize,
    pub settled: usize,
    pub failed: usize,
    /// Queued sales left after the pass.
    pub remaining: i64,
}

/// Handle for triggering and stopping a running engine.
#[derive(Clone)]
pub struct SyncEngineHandle {
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl SyncEngineHandle {
    /// Requests a replay pass. Coalesces with a pass already requested.
    pub fn sync_now(&self) {
        if self.trigger_tx.try_send(()).is_err() {
            debug!("Replay already requested");
        }
    }

    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Sync engine shutdown channel closed".into()))
    }
}

pub struct SyncEngine {
    committer: Arc<TransactionCommitter>,
    retry_interval: Option<Duration>,
    connectivity: watch::Receiver<Connectivity>,
    trigger_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
    /// One replay pass at a time.
    pass: Mutex<()>,
}

impl SyncEngine {
    /// `retry_interval` of `None` replays only on connectivity restored or
    /// explicit triggers.
    pub fn new(
        committer: Arc<TransactionCommitter>,
        retry_interval: Option<Duration>,
    ) -> (Self, SyncEngineHandle) {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let connectivity = committer.services().monitor.subscribe();

        let engine = SyncEngine {
            committer,
            retry_interval,
            connectivity,
            trigger_rx,
            shutdown_rx,
            pass: Mutex::new(()),
        };

        (
            engine,
            SyncEngineHandle {
                trigger_tx,
                shutdown_tx,
            },
        )
    }

    /// Replays every queued sale once, oldest first.
    pub async fn replay(&self) -> SyncResult<SyncReport> {
        let _pass = self.pass.lock().await;
        let services = self.committer.services();

        let pending = services.outbox.list_pending().await?;
        let mut report = SyncReport::default();

        if !pending.is_empty() {
            info!(pending = pending.len(), "Replaying queued sales");
        }

        for entry in pending {
            report.attempted += 1;
            if self.replay_entry(&entry).await {
                report.settled += 1;
            } else {
                report.failed += 1;
            }
        }

        report.remaining = services.outbox.count_pending().await?;

        if report.attempted > 0 {
            info!(
                attempted = report.attempted,
                settled = report.settled,
                failed = report.failed,
                pending = report.remaining,
                "Replay pass complete"
            );
            services
                .emitter
                .sync_progress(report.remaining, report.settled);
        }

        Ok(report)
    }

    /// Returns whether the entry settled and left the outbox.
    async fn replay_entry(&self, entry: &OutboxEntry) -> bool {
        let services = self.committer.services();
        let sale = &entry.sale;
        let _gate = self.committer.lock().await;

        match commit_remote(services.remote.as_ref(), sale, self.committer.commit_timeout()).await {
            Ok(()) => {
                services.monitor.set(Connectivity::Online);
                match services.outbox.mark_settled(&sale.id).await {
                    Ok(_) => {
                        info!(sale_id = %sale.id, attempts = entry.attempts + 1, "Queued sale settled");
                        let mut settled = sale.clone();
                        settled.status = SaleStatus::Settled;
                        services.emitter.sale_settled(&settled);
                        true
                    }
                    // The remote holds the sale but it is still queued here;
                    // the next pass resubmits it idempotently and retries the mark.
                    Err(e) => {
                        error!(sale_id = %sale.id, error = %e, "Failed to mark sale settled");
                        false
                    }
                }
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(
                    sale_id = %sale.id,
                    attempts = entry.attempts + 1,
                    error = %reason,
                    "Replay failed, sale stays queued"
                );
                if let Err(store_err) = services.outbox.record_failure(&sale.id, &reason).await {
                    error!(sale_id = %sale.id, error = %store_err, "Failed to record replay failure");
                }
                services.emitter.replay_failed(&sale.id, &reason);
                false
            }
        }
    }

    async fn replay_logged(&self) {
        if let Err(e) = self.replay().await {
            error!(error = %e, "Replay pass failed");
        }
    }

    /// Engine loop. Runs until [`SyncEngineHandle::shutdown`].
    pub async fn run(mut self) {
        info!(retry_interval = ?self.retry_interval, "Sync engine starting");

        let mut retry = self.retry_interval.map(|period| {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let mut watching = true;

        // Sales queued before a restart are eligible as soon as we are online
        if *self.connectivity.borrow_and_update() == Connectivity::Online {
            self.replay_logged().await;
        }

        loop {
            tokio::select! {
                changed = self.connectivity.changed(), if watching => {
                    match changed {
                        Ok(()) => {
                            let state = *self.connectivity.borrow_and_update();
                            if state == Connectivity::Online {
                                info!("Connectivity restored, replaying outbox");
                                self.replay_logged().await;
                            }
                        }
                        Err(_) => {
                            warn!("Connectivity monitor dropped");
                            watching = false;
                        }
                    }
                }

                _ = tick(&mut retry) => {
                    if *self.connectivity.borrow() == Connectivity::Online {
                        self.replay_logged().await;
                    }
                }

                Some(()) = self.trigger_rx.recv() => {
                    debug!("Replay requested");
                    self.replay_logged().await;
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Sync engine received shutdown signal");
                    break;
                }
            }
        }

        info!("Sync engine stopped");
    }
}

/// Ticks the interval, or never completes when retries are disabled.
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
