//! # Ledger Repository
//!
//! The terminal's durable mirror of the points ledger.
//!
//! ## Apply Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  1. SELECT 1 FROM ledger_applied_sales WHERE sale_id = ?                │
//! │        └── found → ROLLBACK, AlreadyApplied                             │
//! │  2. SELECT balance FROM points_balances (0 if no row)                   │
//! │        └── balance + delta < 0 → ROLLBACK, NegativeBalance              │
//! │  3. UPSERT points_balances, customer_totals                             │
//! │  4. INSERT ledger_applied_sales, points_transactions                    │
//! │                                                                         │
//! │  COMMIT ← balance and applied-set move together                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A successful customer lookup rebases the mirror with
//! [`LedgerRepository::rebase_account`] and refreshes `customer_directory`,
//! which [`LedgerRepository::find_customer`] reads while offline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use loyalty_core::ledger::overlay_queued;
use loyalty_core::{
    ApplyOutcome, Customer, CustomerKey, LedgerDelta, LedgerError, Money, PointsTransaction,
    PointsTransactionKind,
};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Applies a delta at most once per sale id.
    pub async fn apply(&self, delta: &LedgerDelta) -> DbResult<ApplyOutcome> {
        if delta.sale_id.trim().is_empty() {
            return Err(LedgerError::MissingSaleId.into());
        }

        let mut tx = self.pool.begin().await?;

        let seen: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM ledger_applied_sales WHERE sale_id = ?1")
                .bind(&delta.sale_id)
                .fetch_optional(&mut *tx)
                .await?;
        if seen.is_some() {
            tx.rollback().await?;
            debug!(sale_id = %delta.sale_id, "Delta already applied");
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        let current: i64 = sqlx::query_scalar(
            "SELECT balance FROM points_balances WHERE customer_id = ?1 AND store_id = ?2",
        )
        .bind(&delta.customer_id)
        .bind(&delta.store_id)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(0);

        let next = current + delta.delta();
        if next < 0 {
            tx.rollback().await?;
            return Err(LedgerError::NegativeBalance {
                customer_id: delta.customer_id.clone(),
                store_id: delta.store_id.clone(),
                balance: current,
                delta: delta.delta(),
            }
            .into());
        }

        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO points_balances (customer_id, store_id, balance, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (customer_id, store_id) DO UPDATE SET
                balance = excluded.balance,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&delta.customer_id)
        .bind(&delta.store_id)
        .bind(next)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO customer_totals (customer_id, total_purchases, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (customer_id) DO UPDATE SET
                total_purchases = total_purchases + excluded.total_purchases,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&delta.customer_id)
        .bind(delta.purchase_total.minor_units())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO ledger_applied_sales (sale_id, customer_id, store_id, delta, applied_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&delta.sale_id)
        .bind(&delta.customer_id)
        .bind(&delta.store_id)
        .bind(delta.delta())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for entry in PointsTransaction::from_delta(delta, now) {
            sqlx::query(
                r#"
                INSERT INTO points_transactions
                    (customer_id, store_id, sale_id, kind, points, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&entry.customer_id)
            .bind(&entry.store_id)
            .bind(&entry.sale_id)
            .bind(entry.kind)
            .bind(entry.points)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            sale_id = %delta.sale_id,
            customer_id = %delta.customer_id,
            store_id = %delta.store_id,
            balance = next,
            "Delta applied to local ledger"
        );

        Ok(ApplyOutcome::Applied { balance: next })
    }

    /// Balance at one store, 0 if unknown.
    pub async fn balance(&self, customer_id: &str, store_id: &str) -> DbResult<i64> {
        let balance: Option<i64> = sqlx::query_scalar(
            "SELECT balance FROM points_balances WHERE customer_id = ?1 AND store_id = ?2",
        )
        .bind(customer_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance.unwrap_or(0))
    }

    pub async fn balances(&self, customer_id: &str) -> DbResult<BTreeMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT store_id, balance FROM points_balances WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> DbResult<(String, i64)> {
                Ok((row.try_get("store_id")?, row.try_get("balance")?))
            })
            .collect()
    }

    pub async fn total_purchases(&self, customer_id: &str) -> DbResult<Money> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT total_purchases FROM customer_totals WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(Money::from_minor(total.unwrap_or(0)))
    }

    /// Replaces the mirror for one customer with a fresh remote record plus
    /// the deltas still queued locally, and refreshes the directory entry.
    ///
    /// `ledger_applied_sales` is left alone, so queued sales stay applied.
    pub async fn rebase_account(
        &self,
        customer: &Customer,
        queued: &[LedgerDelta],
    ) -> DbResult<Customer> {
        let view = overlay_queued(customer, queued);
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM points_balances WHERE customer_id = ?1")
            .bind(&view.id)
            .execute(&mut *tx)
            .await?;

        for (store_id, balance) in &view.points_balance {
            sqlx::query(
                r#"
                INSERT INTO points_balances (customer_id, store_id, balance, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&view.id)
            .bind(store_id)
            .bind(*balance)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO customer_totals (customer_id, total_purchases, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (customer_id) DO UPDATE SET
                total_purchases = excluded.total_purchases,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&view.id)
        .bind(view.total_purchases.minor_units())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO customer_directory (customer_id, name, email, phone, refreshed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (customer_id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                phone = excluded.phone,
                refreshed_at = excluded.refreshed_at
            "#,
        )
        .bind(&view.id)
        .bind(&view.name)
        .bind(&view.email)
        .bind(&view.phone)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(
            customer_id = %view.id,
            queued = queued.len(),
            "Ledger mirror rebased on remote record"
        );
        Ok(view)
    }

    /// Finds a customer recorded by an earlier rebase, with local balances.
    pub async fn find_customer(&self, key: &CustomerKey) -> DbResult<Option<Customer>> {
        let (column, value) = match key {
            CustomerKey::Id(v) => ("customer_id", v),
            CustomerKey::Email(v) => ("email", v),
            CustomerKey::Phone(v) => ("phone", v),
        };
        let sql = format!(
            "SELECT customer_id, name, email, phone FROM customer_directory WHERE {} = ?1 LIMIT 1",
            column
        );

        let row = match sqlx::query(&sql).bind(value).fetch_optional(&self.pool).await? {
            Some(row) => row,
            None => return Ok(None),
        };

        let customer = Customer {
            id: row.try_get("customer_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            points_balance: BTreeMap::new(),
            total_purchases: Money::zero(),
        };
        Ok(Some(self.customer_view(&customer).await?))
    }

    /// The looked-up customer with balances replaced by the local view.
    pub async fn customer_view(&self, customer: &Customer) -> DbResult<Customer> {
        let mut view = customer.clone();
        for (store_id, balance) in self.balances(&customer.id).await? {
            view.points_balance.insert(store_id, balance);
        }
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT total_purchases FROM customer_totals WHERE customer_id = ?1",
        )
        .bind(&customer.id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(total) = total {
            view.total_purchases = Money::from_minor(total);
        }
        Ok(view)
    }

    pub async fn is_applied(&self, sale_id: &str) -> DbResult<bool> {
        let seen: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM ledger_applied_sales WHERE sale_id = ?1")
                .bind(sale_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(seen.is_some())
    }

    /// Points history for a customer, oldest first.
    pub async fn history(&self, customer_id: &str) -> DbResult<Vec<PointsTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT customer_id, store_id, sale_id, kind, points, created_at
            FROM points_transactions
            WHERE customer_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> DbResult<PointsTransaction> {
                Ok(PointsTransaction {
                    customer_id: row.try_get("customer_id")?,
                    store_id: row.try_get("store_id")?,
                    sale_id: row.try_get("sale_id")?,
                    kind: row.try_get::<PointsTransactionKind, _>("kind")?,
                    points: row.try_get("points")?,
                    created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                })
            })
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::{Database, DbConfig};

    fn delta(sale_id: &str, earned: i64, used: i64) -> LedgerDelta {
        LedgerDelta {
            sale_id: sale_id.into(),
            customer_id: "cust-1".into(),
            store_id: "store-1".into(),
            points_earned: earned,
            points_used: used,
            purchase_total: Money::from_major(1_000),
        }
    }

    fn customer(balance: i64) -> Customer {
        let mut points_balance = BTreeMap::new();
        points_balance.insert("store-1".to_string(), balance);
        Customer {
            id: "cust-1".into(),
            name: "Ana".into(),
            email: Some("ana@example.com".into()),
            phone: None,
            points_balance,
            total_purchases: Money::from_major(5_000),
        }
    }

    async fn repo() -> LedgerRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().ledger()
    }

    #[tokio::test]
    async fn test_scenario_b_redeem() {
        let repo = repo().await;
        repo.rebase_account(&customer(150), &[]).await.unwrap();

        let outcome = repo.apply(&delta("s1", 0, 50)).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied { balance: 100 });
        assert_eq!(repo.balance("cust-1", "store-1").await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_apply_twice_is_noop() {
        let repo = repo().await;
        repo.apply(&delta("s1", 10, 0)).await.unwrap();
        let second = repo.apply(&delta("s1", 10, 0)).await.unwrap();

        assert_eq!(second, ApplyOutcome::AlreadyApplied);
        assert_eq!(repo.balance("cust-1", "store-1").await.unwrap(), 10);
        assert_eq!(
            repo.total_purchases("cust-1").await.unwrap(),
            Money::from_major(1_000)
        );
        assert_eq!(repo.history("cust-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_negative_balance_rolls_back() {
        let repo = repo().await;
        repo.rebase_account(&customer(20), &[]).await.unwrap();

        let err = repo.apply(&delta("s1", 0, 50)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(LedgerError::NegativeBalance { balance: 20, .. })
        ));
        assert!(!repo.is_applied("s1").await.unwrap());
        assert_eq!(repo.balance("cust-1", "store-1").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_unknown_balance_is_zero() {
        let repo = repo().await;
        assert_eq!(repo.balance("nobody", "store-1").await.unwrap(), 0);
        assert!(repo.balances("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rebase_replaces_stale_mirror() {
        let repo = repo().await;
        repo.rebase_account(&customer(150), &[]).await.unwrap();
        repo.apply(&delta("s1", 0, 50)).await.unwrap();
        let queued = delta("s2", 10, 0);
        repo.apply(&queued).await.unwrap();

        // Remote saw s1 plus a redemption of 70 elsewhere, not s2
        let mut remote = customer(30);
        remote.points_balance.insert("store-2".to_string(), 5);
        let view = repo.rebase_account(&remote, &[queued]).await.unwrap();

        assert_eq!(view.balance_at("store-1"), 40);
        assert_eq!(repo.balance("cust-1", "store-1").await.unwrap(), 40);
        assert_eq!(repo.balance("cust-1", "store-2").await.unwrap(), 5);
        assert_eq!(
            repo.total_purchases("cust-1").await.unwrap(),
            Money::from_major(6_000)
        );
        assert!(repo.is_applied("s2").await.unwrap());
        assert_eq!(
            repo.apply(&delta("s2", 10, 0)).await.unwrap(),
            ApplyOutcome::AlreadyApplied
        );
    }

    #[tokio::test]
    async fn test_rebase_drops_stores_the_remote_no_longer_reports() {
        let repo = repo().await;
        let mut first = customer(150);
        first.points_balance.insert("store-2".to_string(), 20);
        repo.rebase_account(&first, &[]).await.unwrap();

        repo.rebase_account(&customer(150), &[]).await.unwrap();
        assert_eq!(repo.balances("cust-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_customer_from_directory() {
        let repo = repo().await;
        assert!(repo
            .find_customer(&CustomerKey::Id("cust-1".into()))
            .await
            .unwrap()
            .is_none());

        repo.rebase_account(&customer(150), &[]).await.unwrap();
        repo.apply(&delta("s1", 0, 50)).await.unwrap();

        let found = repo
            .find_customer(&CustomerKey::Email("ana@example.com".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "cust-1");
        assert_eq!(found.name, "Ana");
        assert_eq!(found.balance_at("store-1"), 100);

        assert!(repo
            .find_customer(&CustomerKey::Id("cust-1".into()))
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_customer(&CustomerKey::Phone("841234567".into()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_history_kinds() {
        let repo = repo().await;
        repo.rebase_account(&customer(100), &[]).await.unwrap();
        repo.apply(&delta("s1", 10, 50)).await.unwrap();

        let history = repo.history("cust-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, PointsTransactionKind::Redeem);
        assert_eq!(history[0].points, 50);
        assert_eq!(history[1].kind, PointsTransactionKind::Earn);
    }
}
