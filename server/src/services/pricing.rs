//! Order pricing: subtotal, platform fee and the gateway's minor-unit amount.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::utils::error::AppError;

/// Decimal places kept for stored amounts.
pub const MONEY_SCALE: u32 = 2;
/// Minor units per major unit of the configured currency (paise per rupee).
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeePolicy {
    /// Percentage of the subtotal, e.g. `5` for 5%.
    Percentage(Decimal),
    Fixed(Decimal),
    Both { percentage: Decimal, fixed: Decimal },
}

impl FeePolicy {
    pub fn fee_for(&self, subtotal: Decimal) -> Decimal {
        let percent_of = |pct: Decimal| subtotal * pct / Decimal::ONE_HUNDRED;
        let fee = match *self {
            FeePolicy::Percentage(pct) => percent_of(pct),
            FeePolicy::Fixed(fixed) => fixed,
            FeePolicy::Both { percentage, fixed } => percent_of(percentage) + fixed,
        };
        round_money(fee.max(Decimal::ZERO))
    }
}

/// Rounds half away from zero to [`MONEY_SCALE`] places.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts a stored amount into the integer minor units the gateway expects.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::from(MINOR_UNITS_PER_MAJOR))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
    pub platform_fee: Decimal,
    pub total_amount: Decimal,
}

impl PriceBreakdown {
    pub fn compute(unit_price: Decimal, quantity: i32, policy: &FeePolicy) -> Self {
        let subtotal = round_money(unit_price * Decimal::from(quantity));
        let platform_fee = policy.fee_for(subtotal);
        Self {
            unit_price,
            quantity,
            subtotal,
            platform_fee,
            total_amount: subtotal + platform_fee,
        }
    }

    pub fn gateway_amount(&self) -> Result<i64, AppError> {
        to_minor_units(self.total_amount).ok_or_else(|| {
            AppError::InternalServerError(format!(
                "Order total {} cannot be expressed in minor units",
                self.total_amount
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn test_percentage_fee_example() {
        let breakdown = PriceBreakdown::compute(dec("100.00"), 1, &FeePolicy::Percentage(dec("5")));
        assert_eq!(breakdown.subtotal, dec("100.00"));
        assert_eq!(breakdown.platform_fee, dec("5.00"));
        assert_eq!(breakdown.total_amount, dec("105.00"));
        assert_eq!(breakdown.gateway_amount().unwrap(), 10500);
    }

    #[test]
    fn test_fixed_and_combined_fees() {
        let fixed = PriceBreakdown::compute(dec("250.00"), 2, &FeePolicy::Fixed(dec("20.00")));
        assert_eq!(fixed.subtotal, dec("500.00"));
        assert_eq!(fixed.total_amount, dec("520.00"));

        let both = PriceBreakdown::compute(
            dec("250.00"),
            2,
            &FeePolicy::Both {
                percentage: dec("2.5"),
                fixed: dec("10"),
            },
        );
        assert_eq!(both.platform_fee, dec("22.50"));
        assert_eq!(both.total_amount, dec("522.50"));
        assert_eq!(both.gateway_amount().unwrap(), 52250);
    }

    #[test]
    fn test_fee_rounds_half_away_from_zero() {
        // 2.5% of 99.90 = 2.4975
        let breakdown = PriceBreakdown::compute(dec("99.90"), 1, &FeePolicy::Percentage(dec("2.5")));
        assert_eq!(breakdown.platform_fee, dec("2.50"));
        assert_eq!(breakdown.total_amount, dec("102.40"));

        // 1.5% of 1.00 = 0.015
        let breakdown = PriceBreakdown::compute(dec("1.00"), 1, &FeePolicy::Percentage(dec("1.5")));
        assert_eq!(breakdown.platform_fee, dec("0.02"));
    }

    #[test]
    fn test_minor_units_rounding() {
        assert_eq!(to_minor_units(dec("105.00")), Some(10500));
        assert_eq!(to_minor_units(dec("0.005")), Some(1));
        assert_eq!(to_minor_units(dec("0.004")), Some(0));
        assert_eq!(to_minor_units(dec("19.999")), Some(2000));
    }

    #[test]
    fn test_zero_fee_and_free_tickets() {
        let breakdown = PriceBreakdown::compute(dec("0"), 3, &FeePolicy::Percentage(Decimal::ZERO));
        assert_eq!(breakdown.total_amount, Decimal::ZERO);
        assert_eq!(breakdown.gateway_amount().unwrap(), 0);
    }
}
