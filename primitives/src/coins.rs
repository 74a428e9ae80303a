//! Two-denomination coin amounts.
//!
//! `Coins` is an immutable value: every arithmetic operation returns a new
//! value or a [`CoinsError`]. Underflow and 256-bit overflow are errors, never
//! wraps or saturations.

use core::fmt;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::error::CoinsError;

/// A pair of non-negative 256-bit amounts. The secondary denomination pays
/// transaction fees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coins {
    primary_wei: U256,
    secondary_wei: U256,
}

impl Coins {
    pub fn new(primary_wei: U256, secondary_wei: U256) -> Self {
        Self {
            primary_wei,
            secondary_wei,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Coins holding only the primary denomination.
    pub fn primary(amount: impl Into<U256>) -> Self {
        Self::new(amount.into(), U256::zero())
    }

    /// Coins holding only the secondary (fee) denomination.
    pub fn secondary(amount: impl Into<U256>) -> Self {
        Self::new(U256::zero(), amount.into())
    }

    pub fn primary_wei(&self) -> U256 {
        self.primary_wei
    }

    pub fn secondary_wei(&self) -> U256 {
        self.secondary_wei
    }

    pub fn is_zero(&self) -> bool {
        self.primary_wei.is_zero() && self.secondary_wei.is_zero()
    }

    /// At least one denomination is strictly positive.
    pub fn is_positive(&self) -> bool {
        !self.is_zero()
    }

    /// Component-wise `>=`.
    pub fn is_gte(&self, other: &Coins) -> bool {
        self.primary_wei >= other.primary_wei && self.secondary_wei >= other.secondary_wei
    }

    pub fn plus(&self, other: &Coins) -> Result<Coins, CoinsError> {
        Ok(Coins {
            primary_wei: self
                .primary_wei
                .checked_add(other.primary_wei)
                .ok_or(CoinsError::Overflow)?,
            secondary_wei: self
                .secondary_wei
                .checked_add(other.secondary_wei)
                .ok_or(CoinsError::Overflow)?,
        })
    }

    pub fn minus(&self, other: &Coins) -> Result<Coins, CoinsError> {
        Ok(Coins {
            primary_wei: self
                .primary_wei
                .checked_sub(other.primary_wei)
                .ok_or(CoinsError::Underflow)?,
            secondary_wei: self
                .secondary_wei
                .checked_sub(other.secondary_wei)
                .ok_or(CoinsError::Underflow)?,
        })
    }

    /// Multiply both denominations by `factor`.
    pub fn mul_scalar(&self, factor: U256) -> Result<Coins, CoinsError> {
        Ok(Coins {
            primary_wei: self.primary_wei.checked_mul(factor).ok_or(CoinsError::Overflow)?,
            secondary_wei: self.secondary_wei.checked_mul(factor).ok_or(CoinsError::Overflow)?,
        })
    }

    /// Sum an iterator of coins. Addition is commutative, so the result does
    /// not depend on iteration order.
    pub fn sum<'a, I>(items: I) -> Result<Coins, CoinsError>
    where
        I: IntoIterator<Item = &'a Coins>,
    {
        items
            .into_iter()
            .try_fold(Coins::zero(), |acc, c| acc.plus(c))
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} PrimaryWei, {} SecondaryWei",
            self.primary_wei, self.secondary_wei
        )
    }
}
