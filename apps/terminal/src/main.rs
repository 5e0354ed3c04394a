//! # Loyalty Terminal
//!
//! Headless daemon for a cashier terminal: keeps the outbox draining and
//! the connectivity state current while the till UI drives [`Terminal`].
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. init_tracing()            RUST_LOG or "info,loyalty=debug,sqlx=warn"│
//! │  2. TerminalConfig            defaults → terminal.toml → LOYALTY_* env  │
//! │  3. Database                  open SQLite, run migrations               │
//! │  4. purge_settled()           drop settled outbox rows past retention   │
//! │  5. ConnectivityProbe         pings the remote, backs off while offline │
//! │  6. SyncEngine                replays queued sales on reconnect / timer │
//! │  7. wait for Ctrl+C / SIGTERM, then shut both tasks down                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `loyalty-terminal [path/to/terminal.toml]`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use loyalty_core::Sale;
use loyalty_db::{Database, DbConfig};
use loyalty_sync::{
    Connectivity, ConnectivityProbe, HttpRemote, ProbeConfig, Terminal, TerminalConfig,
    TerminalEventEmitter, TerminalServices,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = TerminalConfig::load_or_default(config_path);
    config
        .validate()
        .context("terminal configuration is invalid")?;

    info!(
        terminal_id = %config.terminal_id(),
        store_id = %config.store_id(),
        remote = %config.remote.base_url,
        "Starting loyalty terminal"
    );

    let db_path = config
        .database_path()
        .context("no data directory available for the terminal database")?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let db = Database::new(DbConfig::new(db_path.clone()))
        .await
        .with_context(|| format!("opening {}", db_path.display()))?;

    let status = db.migration_status().await?;
    info!(
        path = %db_path.display(),
        applied = status.applied,
        embedded = status.embedded,
        "Database ready"
    );

    let purged = db
        .outbox()
        .purge_settled(config.sync.settled_retention_days)
        .await?;
    if purged > 0 {
        info!(purged, "Purged settled outbox entries");
    }

    let remote = Arc::new(HttpRemote::new(&config.remote)?);
    let services = TerminalServices::sqlite(&db, remote.clone()).with_emitter(Arc::new(LogEmitter));
    let terminal = Terminal::new(&config, services);

    let pending = terminal.pending_count().await?;
    if pending > 0 {
        warn!(pending, "Queued sales waiting for replay");
    }

    let (probe, probe_handle) = ConnectivityProbe::new(
        remote,
        terminal.services().monitor.clone(),
        ProbeConfig::from(&config.sync),
    );
    let (engine, engine_handle) = terminal.sync_engine();

    let probe_task = tokio::spawn(probe.run());
    let engine_task = tokio::spawn(engine.run());

    shutdown_signal().await;

    if let Err(e) = engine_handle.shutdown().await {
        warn!(error = %e, "Sync engine already stopped");
    }
    if let Err(e) = probe_handle.shutdown().await {
        warn!(error = %e, "Connectivity probe already stopped");
    }
    let _ = tokio::join!(engine_task, probe_task);

    db.close().await;
    info!("Terminal shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - everything at debug
/// - `RUST_LOG=loyalty=trace` - trace for the loyalty crates only
/// - Default: INFO, DEBUG for loyalty crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,loyalty=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .init();
}

/// Terminal events go to the log until a till UI is attached.
struct LogEmitter;

impl TerminalEventEmitter for LogEmitter {
    fn sale_settled(&self, sale: &Sale) {
        info!(sale_id = %sale.id, total = %sale.total, "Sale settled");
    }

    fn sale_queued(&self, sale: &Sale) {
        warn!(sale_id = %sale.id, total = %sale.total, "Sale saved offline");
    }

    fn sync_progress(&self, pending: i64, settled: usize) {
        info!(pending, settled, "Sync progress");
    }

    fn connectivity_changed(&self, state: Connectivity) {
        info!(%state, "Connectivity changed");
    }

    fn replay_failed(&self, sale_id: &str, reason: &str) {
        error!(sale_id, reason, "Replay failed");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
