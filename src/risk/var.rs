//! Parametric value at risk

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// One-period parametric VaR of a position: exposure × σ × z, with σ given
/// in percent.
pub fn parametric_var(exposure: Decimal, volatility_pct: Decimal, z_score: Decimal) -> Decimal {
    exposure.abs() * volatility_pct / dec!(100) * z_score
}

/// Sum of per-position VaR. Positions are treated as perfectly correlated,
/// which overstates diversified risk but never understates it.
pub fn portfolio_var<I>(positions: I, z_score: Decimal) -> Decimal
where
    I: IntoIterator<Item = (Decimal, Decimal)>,
{
    positions
        .into_iter()
        .map(|(exposure, volatility_pct)| parametric_var(exposure, volatility_pct, z_score))
        .sum()
}

/// VaR ceiling as an absolute amount of capital.
pub fn var_limit(capital: Decimal, limit_percent: Decimal) -> Decimal {
    capital * limit_percent / dec!(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VAR_Z_SCORE_95;

    #[test]
    fn scales_with_exposure_and_volatility() {
        assert_eq!(parametric_var(dec!(1000), dec!(2), VAR_Z_SCORE_95), dec!(32.90));
        assert_eq!(parametric_var(dec!(-1000), dec!(2), VAR_Z_SCORE_95), dec!(32.90));
        assert_eq!(
            portfolio_var(vec![(dec!(1000), dec!(2)), (dec!(500), dec!(2))], VAR_Z_SCORE_95),
            dec!(49.35)
        );
        assert_eq!(var_limit(dec!(10000), dec!(5)), dec!(500));
    }
}
