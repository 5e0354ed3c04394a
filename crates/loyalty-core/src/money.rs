//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Loyalty math makes this worse: tier boundaries are compared with       │
//! │  >= and <=, so 4999.999999 vs 5000 decides whether a customer earns     │
//! │  10 or 20 points.                                                       │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (centavos for MZN)                   │
//! │    1,050.00 MZN = 105000                                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use loyalty_core::money::Money;
//!
//! let price = Money::from_major(450);        // 450.00 MZN
//! let line = price.multiply_quantity(3);     // 1,350.00 MZN
//! assert_eq!(line.minor_units(), 135_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use crate::error::{CoreError, CoreResult};

/// Minor units per major unit (centavos per metical).
pub const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Serializes as a bare integer, so `{"subtotal": 105000}` on the wire and
/// in the outbox payload.
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price ──► CartLine.unit_price ──► CartLine.line_total          │
/// │                                                                         │
/// │  Cart subtotal ──► Tier Resolver ──► points earned                      │
/// │        │                                                                │
/// │        └──► − Redemption discount ──► Sale.total ──► cash / change      │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use loyalty_core::money::Money;
    ///
    /// let price = Money::from_minor(45_050); // 450.50
    /// assert_eq!(price.minor_units(), 45_050);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from whole major units, saturating at the
    /// `i64` bounds.
    ///
    /// ```rust
    /// use loyalty_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(1050).minor_units(), 105_000);
    /// assert_eq!(Money::from_major(i64::MAX).minor_units(), i64::MAX);
    /// ```
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major.saturating_mul(MINOR_PER_MAJOR))
    }

    /// Like [`Money::from_major`], but `None` when the amount does not fit.
    #[inline]
    pub const fn checked_from_major(major: i64) -> Option<Self> {
        match major.checked_mul(MINOR_PER_MAJOR) {
            Some(minor) => Some(Money(minor)),
            None => None,
        }
    }

    /// Creates a Money value from major and minor parts.
    ///
    /// For negative amounts only the major part carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        let base = major.saturating_mul(MINOR_PER_MAJOR);
        if major < 0 {
            Money(base.saturating_sub(minor))
        } else {
            Money(base.saturating_add(minor))
        }
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    /// Returns the whole major units (truncated toward zero).
    #[inline]
    pub const fn major_units(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the minor part (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity, saturating at the `i64` bounds.
    ///
    /// The cart only holds lines whose total passed
    /// [`Money::checked_multiply_quantity`], so saturation never shows there.
    ///
    /// ```rust
    /// use loyalty_core::money::Money;
    ///
    /// let unit_price = Money::from_major(180);
    /// assert_eq!(unit_price.multiply_quantity(2), Money::from_major(360));
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Multiplies money by a quantity, failing on overflow.
    ///
    /// ```rust
    /// use loyalty_core::money::Money;
    ///
    /// assert!(Money::from_minor(i64::MAX / 2).checked_multiply_quantity(3).is_err());
    /// ```
    pub fn checked_multiply_quantity(&self, qty: i64) -> CoreResult<Money> {
        self.0
            .checked_mul(qty)
            .map(Money)
            .ok_or(CoreError::AmountOverflow)
    }

    /// Adds, failing on overflow.
    pub fn checked_add(self, other: Money) -> CoreResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or(CoreError::AmountOverflow)
    }

    /// Subtracts, clamping the result at zero.
    ///
    /// This is the `max(0, subtotal − discount)` rule for sale totals.
    ///
    /// ```rust
    /// use loyalty_core::money::Money;
    ///
    /// let subtotal = Money::from_major(30);
    /// assert_eq!(subtotal.saturating_sub_to_zero(Money::from_major(50)), Money::zero());
    /// assert_eq!(subtotal.saturating_sub_to_zero(Money::from_major(10)), Money::from_major(20));
    /// ```
    #[inline]
    pub fn saturating_sub_to_zero(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0).max(0))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain `major.minor` rendering for logs and error messages.
///
/// Currency codes and thousands separators are a presentation concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:02}",
            sign,
            self.major_units().abs(),
            self.minor_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major_and_minor() {
        let money = Money::from_minor(105_099);
        assert_eq!(money.major_units(), 1050);
        assert_eq!(money.minor_part(), 99);

        assert_eq!(Money::from_major(1050).minor_units(), 105_000);
        assert_eq!(Money::from_major_minor(10, 99).minor_units(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).minor_units(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(105_000).to_string(), "1050.00");
        assert_eq!(Money::from_minor(505).to_string(), "5.05");
        assert_eq!(Money::from_minor(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_major(10);
        let b = Money::from_major(5);

        assert_eq!(a + b, Money::from_major(15));
        assert_eq!(a - b, Money::from_major(5));
        assert_eq!(a * 3, Money::from_major(30));

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total, Money::from_major(20));
    }

    #[test]
    fn test_saturating_sub_never_negative() {
        let subtotal = Money::from_major(100);
        assert_eq!(
            subtotal.saturating_sub_to_zero(Money::from_major(150)),
            Money::zero()
        );
        assert_eq!(
            subtotal.saturating_sub_to_zero(Money::from_major(100)),
            Money::zero()
        );
    }

    #[test]
    fn test_extreme_amounts_do_not_overflow() {
        assert_eq!(Money::from_major(i64::MAX), Money::from_minor(i64::MAX));
        assert_eq!(Money::from_major(i64::MIN), Money::from_minor(i64::MIN));
        assert_eq!(Money::checked_from_major(i64::MAX / 10), None);
        assert_eq!(
            Money::checked_from_major(1_050),
            Some(Money::from_minor(105_000))
        );

        let huge = Money::from_minor(i64::MAX / 2);
        assert!(matches!(
            huge.checked_multiply_quantity(3),
            Err(CoreError::AmountOverflow)
        ));
        assert_eq!(huge.checked_multiply_quantity(2).unwrap().minor_units(), i64::MAX - 1);
        assert!(matches!(
            Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)),
            Err(CoreError::AmountOverflow)
        ));

        assert_eq!(huge * 3, Money::from_minor(i64::MAX));
        assert_eq!(
            Money::from_minor(i64::MIN).saturating_sub_to_zero(Money::from_minor(i64::MAX)),
            Money::zero()
        );
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&Money::from_major(12)).unwrap();
        assert_eq!(json, "1200");

        let back: Money = serde_json::from_str("1200").unwrap();
        assert_eq!(back, Money::from_major(12));
    }
}
