//! # Remote Store
//!
//! Contract for the loyalty backend the terminal commits to.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         RemoteStore                                     │
//! │                                                                         │
//! │  ┌──────────────────────────┐     ┌──────────────────────────────────┐ │
//! │  │ HttpRemote (http.rs)     │     │ InMemoryRemote (memory.rs)       │ │
//! │  │                          │     │                                  │ │
//! │  │ reqwest JSON client      │     │ Shared customers/products/ledger │ │
//! │  │ Idempotency-Key header   │     │ Fault injection for tests        │ │
//! │  └──────────────────────────┘     └──────────────────────────────────┘ │
//! │                                                                         │
//! │  CONTRACT:                                                             │
//! │  • commit_sale / commit_ledger_delta are idempotent by sale id         │
//! │  • Any error from a commit routes the sale to the outbox               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod http;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use loyalty_core::{Customer, CustomerKey, LedgerDelta, Product, Sale};

pub use http::HttpRemote;
pub use memory::InMemoryRemote;

// =============================================================================
// Remote Error
// =============================================================================

/// Failure talking to the remote store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    #[error("Remote timed out after {0} seconds")]
    Timeout(u64),

    /// 5xx from the backend.
    #[error("Remote server error {status}: {message}")]
    Server { status: u16, message: String },

    /// 4xx other than not-found; the backend refused the request.
    #[error("Remote rejected request {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    #[error("Invalid response from remote: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// True when retrying later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::Unreachable(_) | RemoteError::Timeout(_) | RemoteError::Server { .. }
        )
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

// =============================================================================
// Remote Store Trait
// =============================================================================

/// Operations the engine consumes from the surrounding system.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// `Ok(None)` when no customer matches.
    async fn lookup_customer(&self, key: &CustomerKey) -> RemoteResult<Option<Customer>>;

    /// `Ok(None)` when the store does not sell the barcode.
    async fn lookup_product_by_barcode(
        &self,
        code: &str,
        store_id: &str,
    ) -> RemoteResult<Option<Product>>;

    /// Records the sale. Resubmitting the same `sale.id` is a no-op.
    async fn commit_sale(&self, sale: &Sale) -> RemoteResult<()>;

    /// Applies the sale's points effect. Resubmitting the same sale id is a
    /// no-op.
    async fn commit_ledger_delta(&self, delta: &LedgerDelta) -> RemoteResult<()>;

    /// Cheap reachability check used by the connectivity probe.
    async fn ping(&self) -> RemoteResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RemoteError::Unreachable("dns".into()).is_transient());
        assert!(RemoteError::Timeout(10).is_transient());
        assert!(RemoteError::Server {
            status: 502,
            message: "bad gateway".into()
        }
        .is_transient());

        assert!(!RemoteError::Rejected {
            status: 422,
            message: "invalid".into()
        }
        .is_transient());
        assert!(!RemoteError::InvalidResponse("eof".into()).is_transient());
    }
}
