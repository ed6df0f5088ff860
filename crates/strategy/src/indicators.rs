use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Bollinger band values over one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
}

/// Simple moving average over the last `period` closes.
///
/// Returns `None` when the history is shorter than the period — never a
/// biased partial average.
#[must_use]
pub fn sma(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    let sum: Decimal = window.iter().sum();
    Some(sum / Decimal::from(period))
}

/// Bollinger bands over the last `period` closes: mean ± `k` population
/// standard deviations.
#[must_use]
pub fn bollinger(closes: &[Decimal], period: usize, k: Decimal) -> Option<Bands> {
    let middle = sma(closes, period)?;
    let window = &closes[closes.len() - period..];

    let variance: Decimal = window
        .iter()
        .map(|c| {
            let d = *c - middle;
            d * d
        })
        .sum::<Decimal>()
        / Decimal::from(period);

    // rust_decimal has no sqrt without the maths feature; round-trip through
    // f64, which is plenty for a band width.
    let sigma = Decimal::from_f64(variance.to_f64()?.sqrt())?;

    Some(Bands {
        upper: middle + k * sigma,
        middle,
        lower: middle - k * sigma,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sma_short_history_is_unavailable() {
        let closes = vec![dec!(100); 20];
        assert_eq!(sma(&closes, 21), None);
        assert_eq!(sma(&[], 1), None);
    }

    #[test]
    fn sma_uses_last_period_closes() {
        let mut closes = vec![dec!(50); 10];
        closes.extend(vec![dec!(100); 21]);
        assert_eq!(sma(&closes, 21), Some(dec!(100)));
    }

    #[test]
    fn bollinger_short_history_is_unavailable() {
        let closes = vec![dec!(100); 3];
        assert_eq!(bollinger(&closes, 4, dec!(2)), None);
    }

    #[test]
    fn bollinger_bands_are_symmetric() {
        // mean 100, population variance 4, sigma 2, k=2 -> 96/104
        let closes = vec![dec!(98), dec!(102), dec!(98), dec!(102)];
        let bands = bollinger(&closes, 4, dec!(2)).unwrap();
        assert_eq!(bands.middle, dec!(100));
        assert_eq!(bands.upper, dec!(104));
        assert_eq!(bands.lower, dec!(96));
    }

    #[test]
    fn bollinger_flat_series_collapses_to_mean() {
        let closes = vec![dec!(100); 8];
        let bands = bollinger(&closes, 8, dec!(2)).unwrap();
        assert_eq!(bands.upper, dec!(100));
        assert_eq!(bands.lower, dec!(100));
    }
}
