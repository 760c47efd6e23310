//! Monetary types for mockva balances and transfer amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of fractional digits carried by every balance and amount.
pub const MONEY_SCALE: u32 = 2;

/// A fixed-scale monetary value. Single currency, so no currency tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Create a new Money instance.
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Whole units, e.g. `Money::from_major(5000)` is `5000.00`.
    pub fn from_major(units: i64) -> Self {
        Self(Decimal::new(units, 0))
    }

    /// Parse from a decimal string.
    pub fn parse(value: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Self(Decimal::from_str(value)?))
    }

    /// Get the underlying decimal.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Check if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Check if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// True when the value carries no more than [`MONEY_SCALE`] fractional
    /// digits once trailing zeros are dropped.
    pub fn fits_scale(&self) -> bool {
        self.0.normalize().scale() <= MONEY_SCALE
    }

    /// The value rescaled to exactly [`MONEY_SCALE`] places, as stored.
    pub fn rescaled(&self) -> Self {
        let mut value = self.0.round_dp(MONEY_SCALE);
        value.rescale(MONEY_SCALE);
        Self(value)
    }

    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rescaled().0)
    }
}
