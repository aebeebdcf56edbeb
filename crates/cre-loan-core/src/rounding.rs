use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::Money;

/// Decimal places kept on monetary values.
pub const CURRENCY_DP: u32 = 2;

/// Decimal places kept on rates and ratios.
pub const RATE_DP: u32 = 4;

/// Round a monetary amount to the cent, midpoints away from zero.
pub fn round_currency(value: Money) -> Money {
    value.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a percentage-like ratio (tax burden, cash-on-cash) to 4 places.
pub fn round_rate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(RATE_DP, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_currency_midpoints_away_from_zero() {
        assert_eq!(round_currency(dec!(0.125)), dec!(0.13));
        assert_eq!(round_currency(dec!(-0.125)), dec!(-0.13));
        assert_eq!(round_currency(dec!(2.675)), dec!(2.68));
        assert_eq!(round_currency(dec!(-0.375)), dec!(-0.38));
        assert_eq!(round_currency(dec!(8.5379)), dec!(8.54));
    }

    #[test]
    fn test_round_currency_idempotent() {
        let samples = [
            dec!(0),
            dec!(1.005),
            dec!(-1.005),
            dec!(123456.789),
            dec!(-4909.0736),
            dec!(0.0049999),
        ];
        for x in samples {
            let once = round_currency(x);
            assert_eq!(round_currency(once), once, "not idempotent for {x}");
        }
    }

    #[test]
    fn test_round_rate() {
        assert_eq!(round_rate(dec!(0.12345)), dec!(0.1235));
        assert_eq!(round_rate(dec!(-0.00005)), dec!(-0.0001));
        assert_eq!(round_rate(dec!(0.0596)), dec!(0.0596));
        assert_eq!(round_rate(round_rate(dec!(1.234567))), dec!(1.2346));
    }
}
