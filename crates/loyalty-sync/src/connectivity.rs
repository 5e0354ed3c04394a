//! # Connectivity
//!
//! Tracks whether the remote store is reachable and broadcasts transitions.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌─────────┐   ping ok    ┌──────────┐                                 │
//! │   │ UNKNOWN │─────────────►│  ONLINE  │◄────────────┐                   │
//! │   └────┬────┘              └────┬─────┘             │                   │
//! │        │ ping failed            │ ping failed /     │ ping ok           │
//! │        │                        │ commit failed     │ (→ replay)        │
//! │        ▼                        ▼                   │                   │
//! │   ┌─────────────────────────────────────┐           │                   │
//! │   │              OFFLINE                │───────────┘                   │
//! │   │  probe with exponential backoff     │                               │
//! │   │  committer queues without trying    │                               │
//! │   └─────────────────────────────────────┘                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The host may also push transitions directly with
//! [`ConnectivityMonitor::set`], e.g. from an OS network-change event.

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};
use crate::events::{NoOpEmitter, TerminalEventEmitter};
use crate::remote::RemoteStore;

// =============================================================================
// Connectivity State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// No probe has completed yet.
    Unknown,
    Online,
    Offline,
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connectivity::Unknown => write!(f, "unknown"),
            Connectivity::Online => write!(f, "online"),
            Connectivity::Offline => write!(f, "offline"),
        }
    }
}

// =============================================================================
// Monitor
// =============================================================================

/// Shared connectivity state. Clones observe and update the same state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<Connectivity>>,
    emitter: Arc<dyn TerminalEventEmitter>,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self::with_emitter(Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(emitter: Arc<dyn TerminalEventEmitter>) -> Self {
        let (tx, _rx) = watch::channel(Connectivity::Unknown);
        ConnectivityMonitor {
            tx: Arc::new(tx),
            emitter,
        }
    }

    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    /// True only once a probe or commit has actually failed.
    pub fn is_known_offline(&self) -> bool {
        self.current() == Connectivity::Offline
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }

    /// Records the latest state. Returns true on a transition.
    pub fn set(&self, state: Connectivity) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        if changed {
            info!(state = %state, "Connectivity changed");
            self.emitter.connectivity_changed(state);
        }
        changed
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Probe
// =============================================================================

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Interval between pings while online.
    pub interval: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for ProbeConfig {
    fn from(settings: &SyncSettings) -> Self {
        ProbeConfig {
            interval: Duration::from_secs(settings.probe_interval_secs),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_secs(settings.max_backoff_secs),
        }
    }
}

/// Handle for stopping a running probe.
#[derive(Clone)]
pub struct ProbeHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ProbeHandle {
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Probe shutdown channel closed".into()))
    }
}

/// Derives connectivity from periodic remote health checks.
pub struct ConnectivityProbe {
    remote: Arc<dyn RemoteStore>,
    monitor: ConnectivityMonitor,
    config: ProbeConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

impl ConnectivityProbe {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        monitor: ConnectivityMonitor,
        config: ProbeConfig,
    ) -> (Self, ProbeHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let probe = ConnectivityProbe {
            remote,
            monitor,
            config,
            shutdown_rx,
        };

        (probe, ProbeHandle { shutdown_tx })
    }

    /// Pings once and records the result.
    pub async fn probe_once(&self) -> Connectivity {
        let state = match self.remote.ping().await {
            Ok(()) => Connectivity::Online,
            Err(e) => {
                debug!(error = %e, "Health probe failed");
                Connectivity::Offline
            }
        };
        self.monitor.set(state);
        state
    }

    /// Probe loop. Pings at the configured interval while online and backs
    /// off exponentially while offline.
    pub async fn run(mut self) {
        info!(interval = ?self.config.interval, "Connectivity probe starting");

        let mut backoff = self.create_backoff();

        loop {
            let wait = match self.probe_once().await {
                Connectivity::Online => {
                    backoff.reset();
                    self.config.interval
                }
                _ => backoff.next_backoff().unwrap_or(self.config.max_backoff),
            };

            debug!(?wait, "Next health probe scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.shutdown_rx.recv() => {
                    info!("Connectivity probe received shutdown signal");
                    break;
                }
            }
        }

        info!("Connectivity probe stopped");
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_backoff,
            max_interval: self.config.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}
