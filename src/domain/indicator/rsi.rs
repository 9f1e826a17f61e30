//! RSI (Relative Strength Index) indicator.
//!
//! delta[t] = close[t] - close[t-1] (zero at t=0), split into gains and losses,
//! each smoothed with an `adjust=false` EMA of span `period`.
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100, or 50 when avg_gain is also 0.
//!
//! Every bar gets a value in [0, 100]; there is no invalid warm-up region.

use crate::domain::indicator::{
    ewm_adjust_false, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::series::PriceSeries;

pub const DEFAULT_PERIOD: usize = 14;
pub const NEUTRAL: f64 = 50.0;

pub fn calculate_rsi(series: &PriceSeries, period: usize) -> IndicatorSeries {
    let period = period.max(1);
    let closes = series.closes();

    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        let change = if i == 0 { 0.0 } else { closes[i] - closes[i - 1] };
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let avg_gains = ewm_adjust_false(&gains, period);
    let avg_losses = ewm_adjust_false(&losses, period);

    let values = series
        .bars
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorPoint {
            date: bar.date,
            value: IndicatorValue::Simple(rsi_from_averages(avg_gains[i], avg_losses[i])),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { NEUTRAL } else { 100.0 }
    } else {
        (100.0 - (100.0 / (1.0 + avg_gain / avg_loss))).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::PriceBar;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn make_series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
                daily_return: if i == 0 { 0.0 } else { close / closes[i - 1] - 1.0 },
            })
            .collect();
        PriceSeries {
            symbol: "TEST".into(),
            bars,
        }
    }

    fn rsi_at(series: &IndicatorSeries, i: usize) -> f64 {
        match series.values[i].value {
            IndicatorValue::Simple(v) => v,
            _ => panic!("Expected Simple value"),
        }
    }

    #[test]
    fn rsi_empty_series() {
        let series = calculate_rsi(&make_series(&[]), 14);
        assert!(series.is_empty());
    }

    #[test]
    fn rsi_first_bar_is_neutral() {
        let series = calculate_rsi(&make_series(&[100.0, 101.0]), 14);
        assert_eq!(rsi_at(&series, 0), NEUTRAL);
    }

    #[test]
    fn rsi_constant_prices_stay_neutral() {
        let series = calculate_rsi(&make_series(&[100.0; 60]), 14);
        for i in 0..60 {
            assert_eq!(rsi_at(&series, i), NEUTRAL, "bar {}", i);
        }
    }

    #[test]
    fn rsi_all_gains_saturates_at_100() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let series = calculate_rsi(&make_series(&closes), 14);
        for i in 1..20 {
            assert_eq!(rsi_at(&series, i), 100.0);
        }
    }

    #[test]
    fn rsi_falling_prices_drop_below_oversold() {
        let closes: Vec<f64> = (0..16).map(|i| 100.0 - i as f64).collect();
        let series = calculate_rsi(&make_series(&closes), 14);
        for i in 1..16 {
            assert!(rsi_at(&series, i) < 30.0, "bar {}", i);
        }
    }

    #[test]
    fn rsi_mixed_moves_in_range() {
        let closes = [
            44.0, 44.25, 44.5, 43.75, 44.5, 44.25, 44.75, 45.25, 45.5, 45.25, 45.5, 46.0, 46.25,
            46.0, 46.5,
        ];
        let series = calculate_rsi(&make_series(&closes), 14);
        let last = rsi_at(&series, 14);
        assert!(last > 50.0 && last < 100.0, "RSI {} should be bullish", last);
    }

    #[test]
    fn rsi_indicator_type() {
        let series = calculate_rsi(&make_series(&[1.0]), 9);
        assert_eq!(series.indicator_type, IndicatorType::Rsi(9));
    }

    #[test]
    fn rsi_from_averages_fallbacks() {
        assert_eq!(rsi_from_averages(0.0, 0.0), 50.0);
        assert_eq!(rsi_from_averages(1.5, 0.0), 100.0);
        assert_eq!(rsi_from_averages(0.0, 2.0), 0.0);
        assert!((rsi_from_averages(1.0, 1.0) - 50.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn rsi_bounded_and_defined(closes in prop::collection::vec(1.0f64..1_000.0, 1..120)) {
            let series = calculate_rsi(&make_series(&closes), 14);
            prop_assert_eq!(series.len(), closes.len());
            for point in &series.values {
                let IndicatorValue::Simple(v) = point.value else {
                    panic!("Expected Simple value");
                };
                prop_assert!(v.is_finite());
                prop_assert!((0.0..=100.0).contains(&v));
            }
        }
    }
}
