//! Per-bar trading signals derived from indicator values.
//!
//! Signal generation is stateless: each bar's signal depends only on that bar's
//! indicator value. Holding, ignoring repeated entries and risk exits belong to
//! the position walk in [`crate::domain::position`].

use crate::domain::error::CipherquantError;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorValue};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "i8")]
pub enum Signal {
    Short,
    #[default]
    Flat,
    Long,
}

impl Signal {
    pub fn value(self) -> i8 {
        match self {
            Signal::Short => -1,
            Signal::Flat => 0,
            Signal::Long => 1,
        }
    }

    pub fn from_value(value: i8) -> Option<Self> {
        match value {
            -1 => Some(Signal::Short),
            0 => Some(Signal::Flat),
            1 => Some(Signal::Long),
            _ => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.value())
    }

    pub fn is_flat(self) -> bool {
        self == Signal::Flat
    }

    pub fn opposite(self) -> Self {
        match self {
            Signal::Short => Signal::Long,
            Signal::Flat => Signal::Flat,
            Signal::Long => Signal::Short,
        }
    }
}

impl From<Signal> for i8 {
    fn from(signal: Signal) -> Self {
        signal.value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiThresholds {
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for RsiThresholds {
    fn default() -> Self {
        Self {
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

/// How indicator values map to signals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalRule {
    /// Long below `oversold`, short above `overbought`, flat otherwise.
    RsiThreshold(RsiThresholds),
    /// Long while the MACD line is above its signal line, short otherwise.
    MacdCrossover,
}

pub fn rsi_signal(rsi: f64, thresholds: &RsiThresholds) -> Signal {
    if rsi < thresholds.oversold {
        Signal::Long
    } else if rsi > thresholds.overbought {
        Signal::Short
    } else {
        Signal::Flat
    }
}

pub fn macd_signal(line: f64, signal_line: f64) -> Signal {
    if line > signal_line {
        Signal::Long
    } else {
        Signal::Short
    }
}

impl SignalRule {
    /// Signal for one indicator row. Values must already be checked finite.
    pub fn signal_for(&self, value: &IndicatorValue) -> Signal {
        match (self, value) {
            (SignalRule::RsiThreshold(t), IndicatorValue::Simple(rsi)) => rsi_signal(*rsi, t),
            (SignalRule::MacdCrossover, IndicatorValue::Macd { line, signal, .. }) => {
                macd_signal(*line, *signal)
            }
            _ => Signal::Flat,
        }
    }
}

/// Map every indicator point to a signal, failing on the first undefined value.
pub fn generate_signals(
    indicators: &IndicatorSeries,
    rule: &SignalRule,
) -> Result<Vec<Signal>, CipherquantError> {
    indicators
        .values
        .iter()
        .enumerate()
        .map(|(index, point)| checked_signal(index, point, rule))
        .collect()
}

fn checked_signal(
    index: usize,
    point: &IndicatorPoint,
    rule: &SignalRule,
) -> Result<Signal, CipherquantError> {
    if !point.value.is_finite() {
        return Err(CipherquantError::DataIntegrity {
            index,
            date: point.date,
            field: "indicator".into(),
            reason: "is not a finite number".into(),
        });
    }
    let shape_matches = matches!(
        (rule, &point.value),
        (SignalRule::RsiThreshold(_), IndicatorValue::Simple(_))
            | (SignalRule::MacdCrossover, IndicatorValue::Macd { .. })
    );
    if !shape_matches {
        return Err(CipherquantError::DataIntegrity {
            index,
            date: point.date,
            field: "indicator".into(),
            reason: "does not match the signal rule".into(),
        });
    }
    Ok(rule.signal_for(&point.value))
}
