//! # Cart Aggregator
//!
//! The working order on the terminal, mutated by scans and cashier edits.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Cashier Action           Operation               State Change          │
//! │  ──────────────           ─────────               ────────────          │
//! │                                                                         │
//! │  Scan product ───────────► add_product() ───────► merge or push line   │
//! │                                                                         │
//! │  Change quantity ────────► update_quantity() ───► qty = n (≤0 removes) │
//! │                                                                         │
//! │  Click remove ───────────► remove_line() ───────► retain others        │
//! │                                                                         │
//! │  Cancel / after sale ────► clear() ─────────────► lines.clear()        │
//! │                                                                         │
//! │  Render totals ──────────► snapshot() ──────────► (read only)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Discount and points earned depend on the customer and the redemption
//! request, so they are computed from a snapshot by [`crate::sale::preview`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Product, SaleLine};
use crate::validation::{validate_cart_size, validate_price, validate_quantity};
use crate::MAX_LINE_QUANTITY;

/// A line in the cart.
///
/// `unit_price` is captured when the product is first added. A later scan
/// of the same product merges into this line at the original price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub barcode: String,
    /// Product name at time of adding (frozen)
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartLine {
            product_id: product.id.clone(),
            barcode: product.barcode.clone(),
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
            added_at: Utc::now(),
        }
    }

    /// Unit price × quantity.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// Freezes the line for a sale record.
    pub fn to_sale_line(&self) -> SaleLine {
        SaleLine {
            product_id: self.product_id.clone(),
            name_snapshot: self.name.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            line_total: self.line_total(),
        }
    }
}

/// Read-only view of the cart used for rendering and freezing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
    pub total_quantity: i64,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by `product_id`
/// - Every line has `1 ≤ quantity ≤ MAX_LINE_QUANTITY`
/// - At most `MAX_CART_LINES` lines
/// - Line totals and the subtotal fit in a [`Money`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds a product, merging into an existing line by product id.
    pub fn add_product(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;
        validate_price(product.price)?;

        if let Some(idx) = self.lines.iter().position(|l| l.product_id == product.id) {
            let new_qty = self.lines[idx].quantity + quantity;
            if new_qty > MAX_LINE_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_LINE_QUANTITY,
                });
            }
            self.check_totals(&product.id, self.lines[idx].unit_price, new_qty)?;
            self.lines[idx].quantity = new_qty;
            return Ok(());
        }

        validate_cart_size(self.lines.len())?;
        self.check_totals(&product.id, product.price, quantity)?;

        self.lines.push(CartLine::from_product(product, quantity));
        Ok(())
    }

    /// Sets a line's quantity. A quantity of zero or less removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity <= 0 {
            if self.remove_line(product_id) {
                return Ok(());
            }
            return Err(CoreError::LineNotInCart(product_id.to_string()));
        }

        if quantity > MAX_LINE_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_LINE_QUANTITY,
            });
        }

        let idx = self
            .lines
            .iter()
            .position(|l| l.product_id == product_id)
            .ok_or_else(|| CoreError::LineNotInCart(product_id.to_string()))?;
        self.check_totals(product_id, self.lines[idx].unit_price, quantity)?;
        self.lines[idx].quantity = quantity;
        Ok(())
    }

    /// Rejects a line change whose line total or resulting subtotal overflows.
    fn check_totals(&self, product_id: &str, unit_price: Money, quantity: i64) -> CoreResult<()> {
        let line_total = unit_price.checked_multiply_quantity(quantity)?;
        self.lines
            .iter()
            .filter(|l| l.product_id != product_id)
            .try_fold(line_total, |acc, l| acc.checked_add(l.line_total()))?;
        Ok(())
    }

    /// Removes a line. Returns whether anything was removed.
    pub fn remove_line(&mut self, product_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            lines: self.lines.clone(),
            subtotal: self.subtotal(),
            total_quantity: self.lines.iter().map(|l| l.quantity).sum(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
