//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Storage vs. Arithmetic
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WHERE THE PRECISION LIVES                                              │
//! │                                                                         │
//! │  Stored / exchanged:   Money(i64 cents)       1099  == $10.99          │
//! │                                                                         │
//! │  Computed:             rust_decimal::Decimal  3 × 10.99 × 87.5 / 100   │
//! │                        (exact base-10, no binary float)                │
//! │                                                                         │
//! │  Back to Money:        quantize → 2 decimals, half-up                  │
//! │                        28.848750 → 28.85                               │
//! │                                                                         │
//! │  Intermediate math never rounds. Only `Money::quantize` does.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use forneria_core::money::Money;
//!
//! let price = Money::from_cents(1099); // $10.99
//! let doubled = price * 2;             // $21.98
//! assert_eq!(doubled.cents(), 2198);
//! assert_eq!(price.to_string(), "$10.99");
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// Number of fractional digits kept for currency amounts.
pub const MONEY_SCALE: u32 = 2;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: differences (`paid - gross`) may go negative before
///   being clamped by the pricing engine
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Conversions through `Decimal`**: every multiplication by a rate or a
///   percentage happens in `Decimal` and comes back through [`Money::quantize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use forneria_core::money::Money;
    ///
    /// let price = Money::from_cents(200); // $2.00
    /// assert_eq!(price.cents(), 200);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns `self - other`, floored at zero.
    ///
    /// Used for "net after discount" and "change due", which are never
    /// negative.
    ///
    /// ```rust
    /// use forneria_core::money::Money;
    ///
    /// let net = Money::from_cents(500);
    /// assert_eq!(net.saturating_sub_floor(Money::from_cents(800)), Money::zero());
    /// ```
    #[inline]
    pub fn saturating_sub_floor(self, other: Money) -> Money {
        if other >= self {
            Money::zero()
        } else {
            self - other
        }
    }

    /// Exact decimal view of this amount (`1099` → `10.99`).
    #[inline]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, MONEY_SCALE)
    }

    /// Rounds an arbitrary-precision decimal to cents, half-up.
    ///
    /// "Half-up" here means midpoint away from zero, the usual retail rule:
    /// `0.125 → 0.13`, `0.124 → 0.12`.
    ///
    /// Returns `None` when the value does not fit in an `i64` of cents.
    ///
    /// ```rust
    /// use forneria_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let raw = Decimal::new(2_884_875, 5); // 28.84875
    /// assert_eq!(Money::quantize(raw), Some(Money::from_cents(2885)));
    /// ```
    pub fn quantize(value: Decimal) -> Option<Money> {
        let rounded =
            value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        let cents = rounded.checked_mul(Decimal::ONE_HUNDRED)?;
        cents.trunc().to_i64().map(Money)
    }

    /// Converts a caller-supplied decimal amount without rounding.
    ///
    /// Returns `None` if the value carries more than two fractional digits
    /// or does not fit; input amounts are rejected rather than silently
    /// rounded.
    ///
    /// ```rust
    /// use forneria_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// assert_eq!(Money::from_decimal_exact(Decimal::new(250, 2)), Some(Money::from_cents(250)));
    /// assert_eq!(Money::from_decimal_exact(Decimal::new(2501, 3)), None);
    /// ```
    pub fn from_decimal_exact(value: Decimal) -> Option<Money> {
        let normalized = value.normalize();
        if normalized.scale() > MONEY_SCALE {
            return None;
        }
        normalized
            .checked_mul(Decimal::ONE_HUNDRED)?
            .to_i64()
            .map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented display ("$10.99"). Front ends do their own localization.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.major().abs(), self.minor())
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
