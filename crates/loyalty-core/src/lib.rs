//! # loyalty-core: Pure Business Logic for the Loyalty POS Terminal
//!
//! Everything that decides *how many points* and *how much money* lives
//! here, as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Loyalty Terminal Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             loyalty-sync (Committer, Sync Engine)               │   │
//! │  │     scan ──► cart ──► checkout ──► commit / queue ──► replay    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ loyalty-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  points   │  │   cart    │  │   sale    │  │  ledger   │  │   │
//! │  │   │  Tiers    │  │   Cart    │  │  freeze() │  │  Ledger   │  │   │
//! │  │   │ Discount  │  │ CartLine  │  │ Checkout  │  │  deltas   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  loyalty-db (Database Layer)                    │   │
//! │  │          sale outbox, ledger mirror, product cache              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Customer, Sale, LedgerDelta, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`points`] - Tier Resolver and Redemption Calculator
//! - [`cart`] - Cart Aggregator
//! - [`sale`] - Checkout validation and sale freezing
//! - [`ledger`] - In-memory per-customer, per-store points ledger
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use loyalty_core::money::Money;
//! use loyalty_core::points::{discount_for_points, points_for_amount, PointsConfig};
//!
//! let config = PointsConfig::default();
//!
//! // 1,050 MZN falls in the 500–4999 tier
//! let earned = points_for_amount(Money::from_major(1050), &config.tiers);
//! assert_eq!(earned, 10);
//!
//! // 50 points at 1 MZN per point
//! let discount = discount_for_points(50, &config);
//! assert_eq!(discount, Money::from_major(50));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod ledger;
pub mod money;
pub mod points;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, CartSnapshot};
pub use error::{CoreError, CoreResult, LedgerError, ValidationError};
pub use ledger::{ApplyOutcome, Ledger};
pub use money::Money;
pub use points::{PointsConfig, Tier};
pub use sale::{freeze, preview, CheckoutPreview, CheckoutRequest};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Currency used when a product or config does not name one.
pub const DEFAULT_CURRENCY: &str = "MZN";

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-scans (typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
