//! # Sync Error Types
//!
//! Error types for commit, replay and terminal operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Validation    │  │     Not Found           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Checkout       │  │  NotFound               │ │
//! │  │  MissingStoreId │  │  (cash, points, │  │  (customer, product)    │ │
//! │  │  InvalidUrl     │  │   empty cart)   │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Transient    │  │     Replay      │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Transient      │  │  Replay         │  │  Storage                │ │
//! │  │  (RemoteError)  │  │  (queued sale   │  │  ShuttingDown           │ │
//! │  │                 │  │   failed again) │  │  ChannelError           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transient errors never reach the operator during checkout: the committer
//! turns them into a queued sale. They only surface from lookups.

use thiserror::Error;

use loyalty_core::CoreError;
use loyalty_db::DbError;

use crate::remote::RemoteError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Handling class of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal to the current checkout; the sale goes back to drafting.
    Validation,
    /// Unknown customer or product; the caller runs its "not found" flow.
    NotFound,
    /// Network failure, timeout or remote 5xx.
    Transient,
    /// A queued sale failed again during sync.
    Replay,
    /// Local storage failure.
    Storage,
    Config,
    Internal,
}

/// Sync error type covering everything above the pure core.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid terminal configuration.
    #[error("Invalid terminal configuration: {0}")]
    InvalidConfig(String),

    #[error("Terminal ID not configured. Run initial setup first.")]
    MissingTerminalId,

    #[error("Store ID not configured")]
    MissingStoreId,

    /// Invalid remote URL.
    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Checkout Errors
    // =========================================================================
    /// Cart or checkout validation failed.
    #[error("Checkout rejected: {0}")]
    Checkout(#[from] CoreError),

    /// Customer or product lookup found nothing.
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// Remote store could not be reached or did not answer in time.
    #[error("Remote unavailable: {0}")]
    Transient(RemoteError),

    /// Replaying a queued sale failed; the sale stays queued.
    #[error("Replay of sale {sale_id} failed: {reason}")]
    Replay { sale_id: String, reason: String },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Terminal is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Ledger(e) => SyncError::Checkout(CoreError::Ledger(e)),
            other => SyncError::Storage(other.to_string()),
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound { entity, key } => SyncError::NotFound { entity, key },
            other => SyncError::Transient(other),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Storage(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        SyncError::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    /// Maps the error onto its handling class.
    ///
    /// A `Checkout` error wrapping a ledger rejection is internal: the
    /// balance was checked before freezing, so reaching it means the
    /// ledger and the checkout disagreed.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::InvalidConfig(_)
            | SyncError::MissingTerminalId
            | SyncError::MissingStoreId
            | SyncError::InvalidUrl(_)
            | SyncError::ConfigLoadFailed(_)
            | SyncError::ConfigSaveFailed(_) => ErrorKind::Config,
            SyncError::Checkout(e) if e.is_checkout_rejection() => ErrorKind::Validation,
            SyncError::Checkout(CoreError::LineNotInCart(_)) => ErrorKind::NotFound,
            SyncError::Checkout(CoreError::AmountOverflow)
            | SyncError::Checkout(CoreError::QuantityTooLarge { .. }) => ErrorKind::Validation,
            SyncError::Checkout(_) => ErrorKind::Internal,
            SyncError::NotFound { .. } => ErrorKind::NotFound,
            SyncError::Transient(_) => ErrorKind::Transient,
            SyncError::Replay { .. } => ErrorKind::Replay,
            SyncError::Storage(_) => ErrorKind::Storage,
            SyncError::ShuttingDown | SyncError::ChannelError(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the operation can be retried later.
    ///
    /// ## Retryable Errors
    /// - Remote unreachable, timeouts, 5xx
    /// - Replay failures (retried on the next connectivity signal)
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transient(e) => e.is_transient(),
            SyncError::Replay { .. } => true,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        self.kind() == ErrorKind::Config
    }
}
