//! # Database Migrations
//!
//! ```text
//! migrations/sqlite/
//! ├── 001_sale_outbox.sql     # durable FIFO of frozen sales
//! ├── 002_points_ledger.sql   # balances, totals, applied sale ids, history
//! ├── 003_product_cache.sql   # offline barcode lookups
//! └── 004_customer_directory.sql  # offline customer identification
//! ```
//!
//! Never edit an applied migration; add the next `NNN_name.sql` instead.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Migrations embedded at compile time from `migrations/sqlite`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending migrations. Safe to call repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Embedded vs applied migration counts, logged at daemon startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub embedded: usize,
    pub applied: usize,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.embedded
    }
}

pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    // Missing _sqlx_migrations table means nothing has been applied yet
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    Ok(MigrationStatus {
        embedded: MIGRATOR.migrations.len(),
        applied: applied.max(0) as usize,
    })
}
