//! # Product Cache Repository
//!
//! Last known catalog entry per `(store_id, barcode)`.
//!
//! ```text
//! scan ──► remote lookup ──ok──► upsert() ──► cart
//!               │
//!               └── unreachable ──► get_by_barcode() ──hit──► cart
//!                                          │
//!                                          └── miss ──► "product not found"
//! ```

use chrono::Utc;
use loyalty_core::{Money, Product};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct ProductCacheRepository {
    pool: SqlitePool,
}

impl ProductCacheRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductCacheRepository { pool }
    }

    /// Stores or refreshes a product seen at a store.
    pub async fn upsert(&self, store_id: &str, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product_cache (
                store_id, barcode, product_id, name, price, currency, cached_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (store_id, barcode) DO UPDATE SET
                product_id = excluded.product_id,
                name = excluded.name,
                price = excluded.price,
                currency = excluded.currency,
                cached_at = excluded.cached_at
            "#,
        )
        .bind(store_id)
        .bind(&product.barcode)
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price.minor_units())
        .bind(&product.currency)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(store_id = %store_id, barcode = %product.barcode, "Product cached");
        Ok(())
    }

    pub async fn get_by_barcode(&self, store_id: &str, barcode: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT product_id, barcode, name, price, currency
            FROM product_cache
            WHERE store_id = ?1 AND barcode = ?2
            "#,
        )
        .bind(store_id)
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Product {
                id: row.try_get("product_id")?,
                barcode: row.try_get("barcode")?,
                name: row.try_get("name")?,
                price: Money::from_minor(row.try_get("price")?),
                currency: row.try_get("currency")?,
            })),
            None => Ok(None),
        }
    }

    pub async fn count(&self, store_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_cache WHERE store_id = ?1")
            .bind(store_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
