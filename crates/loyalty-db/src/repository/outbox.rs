//! # Sale Outbox Repository
//!
//! Durable, ordered queue of sales that could not be committed remotely.
//!
//! ## Row Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  append(sale) ──► INSERT OR IGNORE (sale_id UNIQUE)                     │
//! │                        │                                                │
//! │                        ▼                                                │
//! │                   status = queued ◄──────────────┐                      │
//! │                        │                         │                      │
//! │        replay ok       │      replay failed      │                      │
//! │        ────────        │      ─────────────      │                      │
//! │  mark_settled()        └──► record_failure() ────┘                      │
//! │        │                    attempts += 1, last_error                   │
//! │        ▼                                                                │
//! │  status = settled, settled_at ──► purge_settled(days) deletes later     │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                        │
//! │  • A queued row is never deleted                                        │
//! │  • A settled row never returns to queued                                │
//! │  • list_pending() is ordered by seq (enqueue order)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use loyalty_core::{OutboxEntry, Sale, SaleStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Repository for the `sale_outbox` table.
#[derive(Debug, Clone)]
pub struct SaleOutboxRepository {
    pool: SqlitePool,
}

impl SaleOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleOutboxRepository { pool }
    }

    /// Appends a sale as queued.
    ///
    /// Returns `false` when the sale id is already present (queued or
    /// settled); the existing row is left untouched.
    pub async fn append(&self, sale: &Sale) -> DbResult<bool> {
        let mut queued = sale.clone();
        queued.status = SaleStatus::Queued;
        let payload = serde_json::to_string(&queued)?;

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO sale_outbox (
                sale_id, store_id, customer_id, payload, status, attempts, enqueued_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.store_id)
        .bind(&sale.customer_id)
        .bind(payload)
        .bind(SaleStatus::Queued)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        debug!(sale_id = %sale.id, inserted, "Outbox append");
        Ok(inserted)
    }

    /// Queued entries, oldest first.
    pub async fn list_pending(&self) -> DbResult<Vec<OutboxEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT seq, payload, status, attempts, last_error, enqueued_at
            FROM sale_outbox
            WHERE status = 'queued'
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    /// Looks up an entry in any status.
    pub async fn get(&self, sale_id: &str) -> DbResult<Option<OutboxEntry>> {
        let row = sqlx::query(
            r#"
            SELECT seq, payload, status, attempts, last_error, enqueued_at
            FROM sale_outbox
            WHERE sale_id = ?1
            "#,
        )
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    /// Transitions a queued entry to settled.
    ///
    /// Returns `false` if the sale is unknown or already settled.
    pub async fn mark_settled(&self, sale_id: &str) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sale_outbox SET
                status = 'settled',
                settled_at = ?2,
                attempted_at = ?2
            WHERE sale_id = ?1 AND status = 'queued'
            "#,
        )
        .bind(sale_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Records a failed replay attempt. The entry stays queued.
    pub async fn record_failure(&self, sale_id: &str, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sale_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE sale_id = ?1 AND status = 'queued'
            "#,
        )
        .bind(sale_id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Queued sale", sale_id));
        }
        Ok(())
    }

    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sale_outbox WHERE status = 'queued'")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Deletes settled rows older than the retention period.
    pub async fn purge_settled(&self, older_than_days: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));

        let result = sqlx::query(
            r#"
            DELETE FROM sale_outbox
            WHERE status = 'settled'
            AND settled_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn row_to_entry(row: &SqliteRow) -> DbResult<OutboxEntry> {
    let payload: String = row.try_get("payload")?;
    let mut sale: Sale = serde_json::from_str(&payload)?;
    sale.status = row.try_get::<SaleStatus, _>("status")?;

    Ok(OutboxEntry {
        seq: row.try_get("seq")?,
        sale,
        attempts: row.try_get("attempts")?,
        last_error: row.try_get("last_error")?,
        enqueued_at: row.try_get::<DateTime<Utc>, _>("enqueued_at")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
