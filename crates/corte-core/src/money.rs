//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A mixed payment of [60.00 cash, 40.00 card] must equal a 100.00 total  │
//! │  EXACTLY, and a running totalReturned must never creep past the total   │
//! │  by a rounding hair.                                                    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    The spec's "0.01 tolerance" becomes a 1-cent tolerance, and the      │
//! │    proportional netting of returns across payment legs uses a           │
//! │    largest-remainder split so the legs always re-sum exactly.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// Tolerance (in cents) for comparing amounts that arrive from callers as
/// decimal values. Matches the 0.01 currency-unit tolerance used when
/// validating mixed-payment sums.
pub const CENT_TOLERANCE: i64 = 1;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds and netting can produce negative deltas
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Derives**: full serde support for JSON serialization
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero amount.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the amount is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the amount is strictly positive.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the amount is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Compares two amounts within [`CENT_TOLERANCE`].
    ///
    /// Used for the mixed-payment sum invariant: the legs of a mixed payment
    /// must equal the sale total within one cent.
    #[inline]
    pub fn approx_eq(&self, other: Money) -> bool {
        (self.0 - other.0).abs() <= CENT_TOLERANCE
    }

    /// Clamps negative amounts to zero.
    #[inline]
    pub fn max_zero(&self) -> Money {
        Money(self.0.max(0))
    }

    /// Splits this amount across `weights` proportionally, using the
    /// largest-remainder method so the shares always re-sum to the original
    /// amount exactly.
    ///
    /// Used by the cash-cutoff aggregator to net a sale's `totalReturned`
    /// across its mixed payment legs.
    ///
    /// ## Example
    /// ```rust
    /// use corte_core::money::Money;
    ///
    /// // Net a 100-cent return across legs of 60 and 40 cents
    /// let shares = Money::from_cents(100).allocate(&[60, 40]);
    /// assert_eq!(shares, vec![60, 40]);
    ///
    /// // Remainders land on the largest fractional share first
    /// let shares = Money::from_cents(100).allocate(&[1, 1, 1]);
    /// assert_eq!(shares.iter().sum::<i64>(), 100);
    /// ```
    pub fn allocate(&self, weights: &[i64]) -> Vec<i64> {
        let total_weight: i64 = weights.iter().sum();
        if total_weight <= 0 || weights.is_empty() {
            return vec![0; weights.len()];
        }

        let amount = self.0;
        let mut shares: Vec<i64> = Vec::with_capacity(weights.len());
        let mut remainders: Vec<(usize, i64)> = Vec::with_capacity(weights.len());

        for (idx, &w) in weights.iter().enumerate() {
            let product = amount * w;
            shares.push(product.div_euclid(total_weight));
            remainders.push((idx, product.rem_euclid(total_weight)));
        }

        let distributed: i64 = shares.iter().sum();
        let mut leftover = amount - distributed;

        // Hand out the leftover cents to the largest remainders first.
        // Ties break on index so the result is deterministic.
        remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let mut i = 0;
        while leftover > 0 && i < remainders.len() {
            shares[remainders[i].0] += 1;
            leftover -= 1;
            i += 1;
        }

        shares
    }
}

// =============================================================================
// Arithmetic Operators
// =============================================================================

impl Add for Money {
    type Output = Money;

    #[inline]
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    #[inline]
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    #[inline]
    fn mul(self, rhs: i64) -> Money {
        Money(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    /// Formats as a decimal currency value, e.g. `12.34` or `-0.05`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
