//! # Sale Freezing
//!
//! Turns a cart plus a checkout request into an immutable [`Sale`].
//!
//! ## Checkout State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Drafting ──preview()──► Drafting       (live totals, clamped points)  │
//! │      │                                                                  │
//! │      │ freeze()                                                         │
//! │      ├── EmptyCart / MissingCustomer ───────────► Drafting (rejected)  │
//! │      ├── points > balance ──► InsufficientPoints ► Drafting (rejected)  │
//! │      ├── cash < total ──────► InsufficientCash ──► Drafting (rejected)  │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │   Frozen (status = queued) ──► committer: Settled | Queued             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tier resolution and redemption run exactly once, here. Nothing
//! downstream recomputes a frozen total.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cart::{Cart, CartSnapshot};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::points::{discount_for_points, points_for_amount, PointsConfig};
use crate::types::{PaymentMethod, Sale, SaleStatus};
use crate::validation::{validate_identifier, validate_points_request};

// =============================================================================
// Checkout Request
// =============================================================================

/// Everything the cashier confirms at checkout besides the cart itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub store_id: String,
    pub cashier_id: String,
    pub customer_id: Option<String>,
    #[serde(default)]
    pub points_to_redeem: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub cash_received: Option<Money>,
}

// =============================================================================
// Preview
// =============================================================================

/// Live totals shown while the sale is still drafting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPreview {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub points_earned: i64,
    /// Points that would actually be consumed (0 below the minimum).
    pub points_used: i64,
    /// Most points worth redeeming against this cart with this balance.
    pub max_redeemable: i64,
}

/// Computes totals for a snapshot without freezing anything.
///
/// The request is clamped to `available_points`, so the preview never
/// fails; [`freeze`] is where over-redemption is rejected.
pub fn preview(
    snapshot: &CartSnapshot,
    points_requested: i64,
    available_points: i64,
    config: &PointsConfig,
) -> CheckoutPreview {
    let available = available_points.max(0);
    let clamped = points_requested.clamp(0, available);
    let totals = compute_totals(snapshot.subtotal, clamped, config);

    CheckoutPreview {
        subtotal: snapshot.subtotal,
        discount: totals.discount,
        total: totals.total,
        points_earned: totals.points_earned,
        points_used: totals.points_used,
        max_redeemable: available.min(points_to_cover(snapshot.subtotal, config)),
    }
}

struct Totals {
    discount: Money,
    total: Money,
    points_earned: i64,
    points_used: i64,
}

fn compute_totals(subtotal: Money, points: i64, config: &PointsConfig) -> Totals {
    let discount = discount_for_points(points, config);
    // Points below the redemption minimum stay on the balance
    let points_used = if discount.is_zero() { 0 } else { points };

    Totals {
        discount,
        total: subtotal.saturating_sub_to_zero(discount),
        points_earned: points_for_amount(subtotal, &config.tiers),
        points_used,
    }
}

/// Smallest point count whose discount covers the whole subtotal.
fn points_to_cover(subtotal: Money, config: &PointsConfig) -> i64 {
    if config.discount_percentage <= 0 {
        return 0;
    }
    let major = (subtotal.minor_units() + 99) / 100;
    let needed = (major * 100 + config.discount_percentage - 1) / config.discount_percentage;
    needed.max(config.minimum_points_to_redeem)
}

// =============================================================================
// Freeze
// =============================================================================

/// Validates the checkout and freezes the sale.
///
/// `available_points` is the customer's balance at `request.store_id` as
/// observed right now. On error the cart is untouched and nothing is
/// persisted.
pub fn freeze(
    cart: &Cart,
    request: &CheckoutRequest,
    config: &PointsConfig,
    available_points: i64,
) -> CoreResult<Sale> {
    if cart.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    let customer_id = match request.customer_id.as_deref() {
        Some(id) if !id.trim().is_empty() => id,
        _ => return Err(CoreError::MissingCustomer),
    };

    validate_identifier("store_id", &request.store_id)?;
    validate_identifier("cashier_id", &request.cashier_id)?;
    validate_points_request(request.points_to_redeem)?;

    if request.points_to_redeem > available_points {
        return Err(CoreError::InsufficientPoints {
            requested: request.points_to_redeem,
            available: available_points.max(0),
        });
    }

    let snapshot = cart.snapshot();
    let totals = compute_totals(snapshot.subtotal, request.points_to_redeem, config);

    let cash_received = if request.payment_method.is_cash() {
        let received = request.cash_received.ok_or_else(|| ValidationError::Required {
            field: "cash_received".to_string(),
        })?;
        if received < totals.total {
            return Err(CoreError::InsufficientCash {
                required: totals.total,
                received,
            });
        }
        Some(received)
    } else {
        None
    };

    Ok(Sale {
        id: Uuid::new_v4().to_string(),
        store_id: request.store_id.clone(),
        cashier_id: request.cashier_id.clone(),
        customer_id: customer_id.to_string(),
        items: snapshot.lines.iter().map(|l| l.to_sale_line()).collect(),
        subtotal: snapshot.subtotal,
        discount: totals.discount,
        points_used: totals.points_used,
        points_earned: totals.points_earned,
        total: totals.total,
        payment_method: request.payment_method,
        cash_received,
        currency: config.currency.clone(),
        status: SaleStatus::Queued,
        created_at: Utc::now(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
