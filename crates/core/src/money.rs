//! Two-decimal currency arithmetic shared by the aggregate folds.
//!
//! Amounts are `rust_decimal::Decimal` so sums stay exact until the single
//! rounding step at the end of a fold. Rounding per line item drifts: two items
//! priced `10.005` sum to `20.01`, not `20.02`.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Number of fractional digits kept by currency amounts.
pub const CURRENCY_SCALE: u32 = 2;

/// Round an amount to two decimals, half away from zero (half-up for the
/// non-negative amounts this ledger produces).
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Unrounded value of `stock` units at `price`.
///
/// Stock has no upper bound, so the product can leave `Decimal`'s 96-bit range.
pub fn line_value(price: Decimal, stock: i64) -> DomainResult<Decimal> {
    price
        .checked_mul(Decimal::from(stock))
        .ok_or_else(|| DomainError::overflow(format!("value of {stock} units at {price}")))
}

/// `acc + amount`, failing instead of panicking at the edge of the range.
pub fn checked_sum(acc: Decimal, amount: Decimal) -> DomainResult<Decimal> {
    acc.checked_add(amount)
        .ok_or_else(|| DomainError::overflow("inventory value total"))
}

/// Arithmetic mean; `0` for an empty set.
pub fn mean(sum: Decimal, count: usize) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    sum / Decimal::from(count as u64)
}
