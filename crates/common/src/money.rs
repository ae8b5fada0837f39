use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fractional digits carried by every monetary amount.
pub const MONEY_SCALE: u32 = 2;

/// Errors raised when constructing a [`Money`] value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// The amount carries more than two significant fractional digits.
    #[error("amount {0} has more than {MONEY_SCALE} fractional digits")]
    TooPrecise(Decimal),

    /// The amount is below zero.
    #[error("amount {0} is negative")]
    Negative(Decimal),

    /// The amount is too large to carry two fractional digits.
    #[error("amount is too large")]
    Overflow,
}

/// Non-negative fixed-point monetary amount with exactly two fractional digits.
///
/// Backed by [`Decimal`] so that sums and products never pick up binary
/// floating point error. Maps to `NUMERIC(10,2)` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Creates a money amount from a decimal value.
    ///
    /// Trailing zeros beyond the second fractional digit are accepted
    /// (`1.500`), anything that would need rounding is not.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        if amount.normalize().scale() > MONEY_SCALE {
            return Err(MoneyError::TooPrecise(amount));
        }
        Self::rescaled(amount)
    }

    // rescale keeps the largest scale that fits, so a short scale means overflow
    fn rescaled(mut amount: Decimal) -> Result<Self, MoneyError> {
        amount.rescale(MONEY_SCALE);
        if amount.scale() != MONEY_SCALE {
            return Err(MoneyError::Overflow);
        }
        Ok(Self(amount))
    }

    /// Creates a money amount from a whole number of cents.
    pub fn from_cents(cents: u64) -> Self {
        // every u64 fits the 96-bit mantissa
        Self(Decimal::from_i128_with_scale(i128::from(cents), MONEY_SCALE))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(Decimal::new(0, MONEY_SCALE))
    }

    /// Returns the amount as a decimal with scale 2.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiplies by a quantity, failing instead of overflowing.
    pub fn checked_mul(&self, quantity: u32) -> Result<Money, MoneyError> {
        let product = self
            .0
            .checked_mul(Decimal::from(quantity))
            .ok_or(MoneyError::Overflow)?;
        Self::rescaled(product)
    }

    /// Adds two amounts, failing instead of overflowing.
    pub fn checked_add(&self, other: Money) -> Result<Money, MoneyError> {
        let sum = self.0.checked_add(other.0).ok_or(MoneyError::Overflow)?;
        Self::rescaled(sum)
    }

    /// Sums amounts, failing on the first overflow.
    pub fn checked_sum<I>(amounts: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}
