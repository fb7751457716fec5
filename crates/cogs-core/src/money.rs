//! # Money Module
//!
//! Provides the `Money` type used for unit costs, on-hand values and COGS amounts.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE AVERAGE-COST PROBLEM                                               │
//! │                                                                         │
//! │  Floating point:                                                        │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Integer cents:                                                         │
//! │    on_hand_value 1000 / on_hand_qty 3 = 333 cents per unit             │
//! │    Every sale silently loses a third of a cent → drift                 │
//! │                                                                         │
//! │  OUR SOLUTION: base-10 decimals with an explicit rounding policy        │
//! │    • snapshot value        : full precision                            │
//! │    • average unit cost     : rounded to UNIT_COST_SCALE (6 dp)         │
//! │    • allocation amount     : rounded to AMOUNT_SCALE (2 dp)            │
//! │    Rounding is Bankers Rounding and symmetric in sign, so a            │
//! │    reversal is always the exact negative of the sale it undoes.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cogs_core::money::Money;
//!
//! let unit_cost = Money::from_minor(1050); // 10.50
//! let amount = unit_cost.multiply_quantity(3).round_amount();
//! assert_eq!(amount, Money::from_minor(3150));
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::{AMOUNT_SCALE, UNIT_COST_SCALE};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the ledger currency.
///
/// ## Where Money is Used
/// ```text
/// StockReceipt.unit_cost ──► ReceiptLayer.unit_cost ──┐
///                                                      ├──► AllocationDraft.unit_cost
/// CostSnapshot.on_hand_value ──► avg_unit_cost() ─────┘          │
///                                                                 ▼
///                                           CogsAllocation.amount (2 dp)
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(#[ts(as = "String")] Decimal);

impl Money {
    /// Zero money value.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Wraps a decimal value.
    #[inline]
    pub const fn new(value: Decimal) -> Self {
        Money(value)
    }

    /// Creates a value from minor units (cents).
    ///
    /// ## Example
    /// ```rust
    /// use cogs_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(1099).to_string(), "10.99");
    /// ```
    #[inline]
    pub fn from_minor(minor: i64) -> Self {
        Money(Decimal::new(minor, AMOUNT_SCALE))
    }

    /// Creates a value from whole currency units.
    #[inline]
    pub fn from_major(major: i64) -> Self {
        Money(Decimal::from(major))
    }

    /// Returns the underlying decimal.
    #[inline]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiplies a unit cost by a quantity, keeping full precision.
    #[inline]
    pub fn multiply_quantity(&self, qty: i64) -> Money {
        Money(self.0 * Decimal::from(qty))
    }

    /// Divides a value by a quantity at full precision.
    ///
    /// Returns zero for a zero quantity; an empty position has no unit cost.
    pub fn per_unit(&self, qty: i64) -> Money {
        if qty == 0 {
            return Money::ZERO;
        }
        Money(self.0 / Decimal::from(qty))
    }

    /// Rounds to the currency minor unit (allocation amounts).
    ///
    /// ## Bankers Rounding
    /// ```text
    /// 0.125 → 0.12    0.135 → 0.14    -0.125 → -0.12
    /// ```
    /// Half-to-even is symmetric around zero, which is what makes a reversal
    /// row the exact negative of the sale row it mirrors.
    pub fn round_amount(&self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointNearestEven)
                .normalize(),
        )
    }

    /// Rounds to the unit-cost scale (average cost).
    pub fn round_unit_cost(&self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(UNIT_COST_SCALE, RoundingStrategy::MidpointNearestEven)
                .normalize(),
        )
    }

    /// Clamps negative values to zero.
    pub fn non_negative(self) -> Money {
        if self.is_negative() {
            Money::ZERO
        } else {
            self
        }
    }

    /// Parses a stored or user-supplied decimal string.
    pub fn parse(field: &str, raw: &str) -> Result<Money, ValidationError> {
        Decimal::from_str(raw.trim())
            .map(Money)
            .map_err(|e| ValidationError::InvalidFormat {
                field: field.to_string(),
                reason: e.to_string(),
            })
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money(value)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor_and_display() {
        assert_eq!(Money::from_minor(1099).to_string(), "10.99");
        assert_eq!(Money::from_minor(500).to_string(), "5");
        assert_eq!(Money::from_minor(-550).to_string(), "-5.5");
        assert_eq!(Money::ZERO.to_string(), "0");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_major(10);
        let b = Money::from_minor(250);

        assert_eq!(a + b, Money::from_minor(1250));
        assert_eq!(a - b, Money::from_minor(750));
        assert_eq!(-b, Money::from_minor(-250));
        assert_eq!(b.multiply_quantity(4), Money::from_major(10));
    }

    #[test]
    fn test_per_unit_of_empty_position_is_zero() {
        assert_eq!(Money::from_major(100).per_unit(0), Money::ZERO);
        assert_eq!(Money::from_major(100).per_unit(4), Money::from_major(25));
    }

    #[test]
    fn test_bankers_rounding_is_symmetric() {
        let half_cent = Money::parse("amount", "0.125").unwrap();
        assert_eq!(half_cent.round_amount(), Money::from_minor(12));
        assert_eq!((-half_cent).round_amount(), Money::from_minor(-12));

        let other = Money::parse("amount", "0.135").unwrap();
        assert_eq!(other.round_amount(), Money::from_minor(14));
        assert_eq!((-other).round_amount(), -other.round_amount());
    }

    #[test]
    fn test_unit_cost_rounding_keeps_six_places() {
        let third = Money::from_major(100).per_unit(3);
        assert_eq!(third.round_unit_cost().to_string(), "33.333333");
    }

    #[test]
    fn test_non_negative_clamp() {
        assert_eq!(Money::from_minor(-1).non_negative(), Money::ZERO);
        assert_eq!(Money::from_minor(1).non_negative(), Money::from_minor(1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Money::parse("unit_cost", "12.50").is_ok());
        assert!(Money::parse("unit_cost", "twelve").is_err());
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_major(1000), Money::from_major(300)]
            .iter()
            .sum();
        assert_eq!(total, Money::from_major(1300));
    }
}
