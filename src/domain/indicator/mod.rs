//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for the indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values, aligned with its price series

pub mod ema;
pub mod macd;
pub mod rsi;

pub use ema::ewm_adjust_false;
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
}

impl IndicatorValue {
    pub fn is_finite(&self) -> bool {
        match *self {
            IndicatorValue::Simple(v) => v.is_finite(),
            IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } => line.is_finite() && signal.is_finite() && histogram.is_finite(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IndicatorType {
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Single-column values; MACD points yield their line.
    pub fn simple_values(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|p| match p.value {
                IndicatorValue::Simple(v) => v,
                IndicatorValue::Macd { line, .. } => line,
            })
            .collect()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
        }
    }
}
