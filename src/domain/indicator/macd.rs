//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! All EMAs use recursive `adjust=false` smoothing seeded with the first value,
//! so every bar carries a value. Default parameters: fast=12, slow=26, signal=9.

use crate::domain::indicator::{
    ewm_adjust_false, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::series::PriceSeries;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    series: &PriceSeries,
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };

    if series.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let closes = series.closes();
    let ema_fast = ewm_adjust_false(&closes, fast);
    let ema_slow = ewm_adjust_false(&closes, slow);

    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ewm_adjust_false(&macd_line, signal_period);

    let values = series
        .bars
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorPoint {
            date: bar.date,
            value: IndicatorValue::Macd {
                line: macd_line[i],
                signal: signal_line[i],
                histogram: macd_line[i] - signal_line[i],
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

pub fn calculate_macd_default(series: &PriceSeries) -> IndicatorSeries {
    calculate_macd(series, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}
