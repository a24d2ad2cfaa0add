//! Currency helpers. Amounts are `Decimal` with two fractional digits.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round to cents, half away from zero
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `base × pct / 100`, rounded to cents
pub fn percentage_of(base: Decimal, pct: Decimal) -> Decimal {
    round2(base * pct / Decimal::ONE_HUNDRED)
}

/// Share of `original` represented by `discount`, in percent.
/// Zero when `original` is zero.
pub fn discount_percentage(original: Decimal, discount: Decimal) -> Decimal {
    if original.is_zero() {
        return Decimal::ZERO;
    }
    round2(discount / original * Decimal::ONE_HUNDRED)
}

/// Per-installment amount: `round2(financed / count)`, applied to every
/// installment. No correction on the last one, so the sum may differ from
/// `financed` by a few cents.
pub fn installment_amount(financed: Decimal, count: u32) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    round2(financed / Decimal::from(count))
}
