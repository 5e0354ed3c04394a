//! # Error Types
//!
//! Domain-specific error types for loyalty-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  loyalty-core errors (this file)                                       │
//! │  ├── CoreError        - Cart and checkout rule violations              │
//! │  ├── LedgerError      - Rejected ledger deltas                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  loyalty-db errors                                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  loyalty-sync errors                                                   │
//! │  ├── RemoteError      - Remote store call failures                     │
//! │  └── SyncError        - What the terminal operator sees                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError::Checkout → operator    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Cart and checkout errors.
///
/// Checkout rejections ([`CoreError::is_checkout_rejection`]) are fatal to
/// the current checkout attempt only: the cart is left untouched so the
/// operator can correct it and try again.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product is not in the cart.
    #[error("Product not in cart: {0}")]
    LineNotInCart(String),

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// A line total or cart subtotal does not fit in a money amount.
    #[error("Amount is too large")]
    AmountOverflow,

    /// Checkout attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Checkout attempted before a customer was identified.
    #[error("A customer must be identified before checkout")]
    MissingCustomer,

    /// Cash handed over does not cover the sale total.
    ///
    /// ## User Workflow
    /// ```text
    /// Total: 950.00 MZN
    ///      │
    ///      ▼
    /// Cash received: 900.00 MZN
    ///      │
    ///      ▼
    /// InsufficientCash { required: 950.00, received: 900.00 }
    ///      │
    ///      ▼
    /// Sale stays in Drafting, cashier asks for more cash
    /// ```
    #[error("Insufficient cash: total is {required}, received {received}")]
    InsufficientCash { required: Money, received: Money },

    /// Redemption request exceeds the customer's balance at this store.
    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: i64, available: i64 },

    /// Ledger rejected a delta.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns true for errors that reject a checkout and send the sale
    /// back to drafting.
    pub fn is_checkout_rejection(&self) -> bool {
        matches!(
            self,
            CoreError::EmptyCart
                | CoreError::MissingCustomer
                | CoreError::InsufficientCash { .. }
                | CoreError::InsufficientPoints { .. }
                | CoreError::Validation(_)
        )
    }
}

// =============================================================================
// Ledger Error
// =============================================================================

/// Errors raised when applying a points delta.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Applying the delta would drive the store balance below zero.
    #[error(
        "Delta {delta} would leave customer {customer_id} at store {store_id} with {balance} points"
    )]
    NegativeBalance {
        customer_id: String,
        store_id: String,
        balance: i64,
        delta: i64,
    },

    /// Delta is missing its sale identifier (idempotency key).
    #[error("Ledger delta has no sale id")]
    MissingSaleId,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, bad tier bounds).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
