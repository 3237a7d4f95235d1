//! Integer cents.
//!
//! Every amount in a cart, a transaction or a stored row is a [`Money`]:
//! an `i64` count of the smallest currency unit. Split balancing and the
//! one-cent tolerance compare these exactly.
//!
//! ```rust
//! use tillpoint_core::money::Money;
//!
//! let latte = Money::from_cents(450);
//! let order = latte * 2 + Money::from_cents(125);
//! assert_eq!(order.cents(), 1025);
//! assert_eq!(order.to_string(), "$10.25");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// Signed amount in cents. Negative values show up as split shortfalls
/// and short tenders. Serializes as a bare integer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Largest magnitude accepted wherever an amount enters: catalog prices,
    /// variant deltas, cart lines, cash tendered, split legs and stored
    /// transaction amounts ($10,000,000,000.00).
    ///
    /// A full cart (100 lines of 999 units at twice this price) stays below
    /// `i64::MAX / 40`, so the operators below cannot overflow on input
    /// that passed these checks.
    pub const MAX_INPUT: Money = Money(1_000_000_000_000);

    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole currency units, truncated toward zero.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Cents past the last whole unit, `0..=99` regardless of sign.
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// `-MAX_INPUT <= self <= MAX_INPUT`.
    #[inline]
    pub const fn is_within_limit(&self) -> bool {
        -Self::MAX_INPUT.0 <= self.0 && self.0 <= Self::MAX_INPUT.0
    }

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

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative amounts to zero.
    ///
    /// ```rust
    /// use tillpoint_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(-250).non_negative(), Money::zero());
    /// assert_eq!(Money::from_cents(250).non_negative().cents(), 250);
    /// ```
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            Money(self.0)
        }
    }

    /// Tax at `rate`, half-up to the nearest cent.
    ///
    /// ```rust
    /// use tillpoint_core::money::Money;
    /// use tillpoint_core::types::TaxRate;
    ///
    /// let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83); // $0.825 rounds to $0.83
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// `AVG()` comes back from SQLite as REAL.
    pub fn from_average(avg: f64) -> Self {
        Money(avg.round() as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Always `$`. Tills format with their configured symbol.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            f.write_str("-")?;
        }
        write!(f, "${}.{:02}", self.dollars().abs(), self.cents_part())
    }
}

// Operators are plain i64 arithmetic. Inputs are bounded by
// `Money::MAX_INPUT` where they enter, not here.

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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        Money(iter.map(|m| m.0).sum())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
