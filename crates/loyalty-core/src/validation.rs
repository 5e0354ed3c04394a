//! # Validation Module
//!
//! Input checks run before anything reaches the cart, the committer or
//! the remote store.
//!
//! ```text
//! scan ──► validate_barcode ──► lookup ──► validate_quantity ──► cart
//!                                                                 │
//! checkout ──► validate_identifier(store/cashier/customer) ◄──────┘
//!          ──► validate_points_request
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a scanned or typed barcode.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 64 characters
/// - Printable ASCII only (scanners occasionally emit control characters)
///
/// ## Returns
/// The trimmed barcode.
///
/// ```rust
/// use loyalty_core::validation::validate_barcode;
///
/// assert_eq!(validate_barcode(" 6001234567890\n").unwrap(), "6001234567890");
/// assert!(validate_barcode("").is_err());
/// ```
pub fn validate_barcode(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "barcode".to_string(),
        });
    }

    if code.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: 64,
        });
    }

    if !code.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only printable characters".to_string(),
        });
    }

    Ok(code.to_string())
}

/// Validates an opaque identifier (store, cashier, customer).
pub fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > 128 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 128,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price. Zero is allowed (free items).
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a redemption request before it is compared to the balance.
pub fn validate_points_request(points: i64) -> ValidationResult<()> {
    if points < 0 {
        return Err(ValidationError::OutOfRange {
            field: "points_to_redeem".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more line fits in the cart.
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: MAX_CART_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
