//! Offline product cache seam.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use loyalty_core::Product;
use loyalty_db::ProductCacheRepository;

use crate::error::SyncResult;

/// Last known product per `(store_id, barcode)`.
#[async_trait]
pub trait ProductCache: Send + Sync {
    async fn put(&self, store_id: &str, product: &Product) -> SyncResult<()>;

    async fn get(&self, store_id: &str, barcode: &str) -> SyncResult<Option<Product>>;
}

#[async_trait]
impl ProductCache for ProductCacheRepository {
    async fn put(&self, store_id: &str, product: &Product) -> SyncResult<()> {
        Ok(self.upsert(store_id, product).await?)
    }

    async fn get(&self, store_id: &str, barcode: &str) -> SyncResult<Option<Product>> {
        Ok(self.get_by_barcode(store_id, barcode).await?)
    }
}

#[derive(Debug, Default)]
pub struct MemoryProductCache {
    entries: Mutex<HashMap<(String, String), Product>>,
}

impl MemoryProductCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductCache for MemoryProductCache {
    async fn put(&self, store_id: &str, product: &Product) -> SyncResult<()> {
        self.entries
            .lock()
            .await
            .insert((store_id.to_string(), product.barcode.clone()), product.clone());
        Ok(())
    }

    async fn get(&self, store_id: &str, barcode: &str) -> SyncResult<Option<Product>> {
        Ok(self
            .entries
            .lock()
            .await
            .get(&(store_id.to_string(), barcode.to_string()))
            .cloned())
    }
}
