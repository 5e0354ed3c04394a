//! # Points Module
//!
//! Tier Resolver and Redemption Calculator.
//!
//! ## Earning and Spending
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EARN: subtotal ──► first tier with min ≤ subtotal ≤ max ──► points     │
//! │                                                                         │
//! │     500 ─ 4999    → 10          34000 ─ 41999  → 50                     │
//! │    5000 ─ 12999   → 20          42000 ─ 46999  → 60                     │
//! │   13000 ─ 25999   → 30          47000 ─ 999999 → 80                     │
//! │   26000 ─ 33999   → 40                                                  │
//! │                                                                         │
//! │  SPEND: points ≥ minimum ──► floor(points × pct / 100) major units      │
//! │         points < minimum ──► 0                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tier bounds are whole major units and inclusive on both ends, so a
//! subtotal of 4999.50 MZN matches no tier in the default table.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::{Money, MINOR_PER_MAJOR};
use crate::DEFAULT_CURRENCY;

/// Largest tier bound whose minor-unit value fits in a [`Money`].
pub const MAX_TIER_AMOUNT: i64 = i64::MAX / MINOR_PER_MAJOR;

// =============================================================================
// Tier
// =============================================================================

/// An inclusive amount range mapped to a fixed points award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    /// Lower bound in major units (inclusive).
    pub min_amount: i64,
    /// Upper bound in major units (inclusive).
    pub max_amount: i64,
    pub points: i64,
}

impl Tier {
    pub const fn new(min_amount: i64, max_amount: i64, points: i64) -> Self {
        Tier {
            min_amount,
            max_amount,
            points,
        }
    }

    /// Whether the amount falls inside `[min_amount, max_amount]`.
    ///
    /// Bounds past [`MAX_TIER_AMOUNT`] saturate rather than overflow.
    pub fn contains(&self, amount: Money) -> bool {
        amount >= Money::from_major(self.min_amount) && amount <= Money::from_major(self.max_amount)
    }

    fn overlaps(&self, other: &Tier) -> bool {
        self.min_amount <= other.max_amount && other.min_amount <= self.max_amount
    }
}

// =============================================================================
// Points Config
// =============================================================================

/// Accrual and redemption rules, read-only during a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsConfig {
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Checked in order; the first containing tier wins.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<Tier>,

    /// Major currency units per 100 points (100 means 1 point = 1 unit).
    #[serde(default = "default_discount_percentage")]
    pub discount_percentage: i64,

    #[serde(default = "default_minimum_points")]
    pub minimum_points_to_redeem: i64,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_tiers() -> Vec<Tier> {
    vec![
        Tier::new(500, 4_999, 10),
        Tier::new(5_000, 12_999, 20),
        Tier::new(13_000, 25_999, 30),
        Tier::new(26_000, 33_999, 40),
        Tier::new(34_000, 41_999, 50),
        Tier::new(42_000, 46_999, 60),
        Tier::new(47_000, 999_999, 80),
    ]
}

fn default_discount_percentage() -> i64 {
    100
}

fn default_minimum_points() -> i64 {
    10
}

impl Default for PointsConfig {
    fn default() -> Self {
        PointsConfig {
            currency: default_currency(),
            tiers: default_tiers(),
            discount_percentage: default_discount_percentage(),
            minimum_points_to_redeem: default_minimum_points(),
        }
    }
}

impl PointsConfig {
    /// Rejects configs the resolver cannot use safely.
    ///
    /// Overlaps are not rejected here; see [`PointsConfig::overlapping_tiers`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.currency.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "points.currency".to_string(),
            });
        }

        if self.discount_percentage < 0 {
            return Err(ValidationError::MustBePositive {
                field: "points.discount_percentage".to_string(),
            });
        }

        if self.minimum_points_to_redeem <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "points.minimum_points_to_redeem".to_string(),
            });
        }

        for (i, tier) in self.tiers.iter().enumerate() {
            if tier.min_amount < 0 || tier.points < 0 {
                return Err(ValidationError::InvalidFormat {
                    field: format!("points.tiers[{}]", i),
                    reason: "amounts and points must not be negative".to_string(),
                });
            }
            if tier.max_amount > MAX_TIER_AMOUNT {
                return Err(ValidationError::OutOfRange {
                    field: format!("points.tiers[{}].max_amount", i),
                    min: 0,
                    max: MAX_TIER_AMOUNT,
                });
            }
            if tier.min_amount > tier.max_amount {
                return Err(ValidationError::InvalidFormat {
                    field: format!("points.tiers[{}]", i),
                    reason: format!("min {} is above max {}", tier.min_amount, tier.max_amount),
                });
            }
        }

        Ok(())
    }

    /// Index pairs of tiers whose ranges overlap.
    ///
    /// The resolver still picks the first match, so the earlier tier shadows
    /// the later one inside the overlap.
    pub fn overlapping_tiers(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, a) in self.tiers.iter().enumerate() {
            for (j, b) in self.tiers.iter().enumerate().skip(i + 1) {
                if a.overlaps(b) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }
}

// =============================================================================
// Tier Resolver
// =============================================================================

/// Points earned for a subtotal: the first containing tier's award, else 0.
///
/// Total for any input; negative amounts simply match nothing.
pub fn points_for_amount(amount: Money, tiers: &[Tier]) -> i64 {
    tiers
        .iter()
        .find(|tier| tier.contains(amount))
        .map(|tier| tier.points)
        .unwrap_or(0)
}

// =============================================================================
// Redemption Calculator
// =============================================================================

/// Discount for redeeming `points`, zero below the configured minimum.
///
/// The caller clamps `points` to the customer's balance first.
///
/// ```rust
/// use loyalty_core::money::Money;
/// use loyalty_core::points::{discount_for_points, PointsConfig};
///
/// let config = PointsConfig::default();
/// assert_eq!(discount_for_points(5, &config), Money::zero());
/// assert_eq!(discount_for_points(50, &config), Money::from_major(50));
/// ```
pub fn discount_for_points(points: i64, config: &PointsConfig) -> Money {
    if points <= 0 || points < config.minimum_points_to_redeem {
        return Money::zero();
    }
    let major = points.saturating_mul(config.discount_percentage.max(0)) / 100;
    Money::from_major(major)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scenario_a_tier_lookup() {
        let config = PointsConfig::default();
        assert_eq!(points_for_amount(Money::from_major(1_050), &config.tiers), 10);
    }

    #[test]
    fn test_tier_boundaries_inclusive() {
        let tiers = PointsConfig::default().tiers;
        assert_eq!(points_for_amount(Money::from_major(499), &tiers), 0);
        assert_eq!(points_for_amount(Money::from_major(500), &tiers), 10);
        assert_eq!(points_for_amount(Money::from_major(4_999), &tiers), 10);
        assert_eq!(points_for_amount(Money::from_major(5_000), &tiers), 20);
        assert_eq!(points_for_amount(Money::from_major(999_999), &tiers), 80);
        assert_eq!(points_for_amount(Money::from_major(1_000_000), &tiers), 0);
    }

    #[test]
    fn test_fractional_gap_matches_nothing() {
        let tiers = PointsConfig::default().tiers;
        assert_eq!(points_for_amount(Money::from_major_minor(4_999, 50), &tiers), 0);
    }

    #[test]
    fn test_first_match_wins_on_overlap() {
        let config = PointsConfig {
            tiers: vec![Tier::new(0, 1_000, 5), Tier::new(500, 2_000, 50)],
            ..PointsConfig::default()
        };
        assert_eq!(points_for_amount(Money::from_major(700), &config.tiers), 5);
        assert_eq!(config.overlapping_tiers(), vec![(0, 1)]);
        assert!(PointsConfig::default().overlapping_tiers().is_empty());
    }

    #[test]
    fn test_scenario_b_and_c_discount() {
        let config = PointsConfig::default();
        assert_eq!(discount_for_points(50, &config), Money::from_major(50));
        assert_eq!(discount_for_points(5, &config), Money::zero());
        assert_eq!(discount_for_points(10, &config), Money::from_major(10));
    }

    #[test]
    fn test_discount_floors_fractional_rate() {
        let config = PointsConfig {
            discount_percentage: 50,
            ..PointsConfig::default()
        };
        // 15 × 0.5 = 7.5 → 7
        assert_eq!(discount_for_points(15, &config), Money::from_major(7));
    }

    #[test]
    fn test_validate() {
        assert!(PointsConfig::default().validate().is_ok());

        let bad = PointsConfig {
            tiers: vec![Tier::new(100, 50, 1)],
            ..PointsConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::InvalidFormat { .. })
        ));

        let bad = PointsConfig {
            minimum_points_to_redeem: 0,
            ..PointsConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = PointsConfig {
            currency: " ".into(),
            ..PointsConfig::default()
        };
        assert!(matches!(bad.validate(), Err(ValidationError::Required { .. })));
    }

    #[test]
    fn test_unbounded_tier_does_not_overflow() {
        let tiers = vec![Tier::new(100, i64::MAX, 5)];
        assert_eq!(points_for_amount(Money::from_minor(i64::MAX), &tiers), 5);
        assert_eq!(points_for_amount(Money::from_major(99), &tiers), 0);

        let config = PointsConfig {
            tiers,
            ..PointsConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::OutOfRange { max: MAX_TIER_AMOUNT, .. })
        ));

        let at_limit = PointsConfig {
            tiers: vec![Tier::new(100, MAX_TIER_AMOUNT, 5)],
            ..PointsConfig::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: PointsConfig = serde_json::from_str(r#"{"minimum_points_to_redeem": 20}"#).unwrap();
        assert_eq!(config.minimum_points_to_redeem, 20);
        assert_eq!(config.tiers, PointsConfig::default().tiers);
        assert_eq!(config.currency, "MZN");
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn prop_tiers_monotonic(a in 0i64..120_000_000, b in 0i64..120_000_000) {
            let tiers = PointsConfig::default().tiers;
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let p_lo = points_for_amount(Money::from_minor(lo), &tiers);
            let p_hi = points_for_amount(Money::from_minor(hi), &tiers);
            // Gaps between tiers score zero, so only compare inside the table
            if p_lo > 0 && p_hi > 0 {
                prop_assert!(p_lo <= p_hi);
            }
        }

        #[test]
        fn prop_below_lowest_tier_is_zero(minor in 0i64..50_000) {
            let tiers = PointsConfig::default().tiers;
            prop_assert_eq!(points_for_amount(Money::from_minor(minor), &tiers), 0);
        }

        #[test]
        fn prop_discount_threshold_and_floor(points in 0i64..1_000_000, pct in 0i64..500) {
            let config = PointsConfig { discount_percentage: pct, ..PointsConfig::default() };
            let discount = discount_for_points(points, &config);
            prop_assert!(!discount.is_negative());
            if points < config.minimum_points_to_redeem {
                prop_assert_eq!(discount, Money::zero());
            } else {
                prop_assert_eq!(discount, Money::from_major(points * pct / 100));
            }
        }
    }
}
