//! The closed set of evaluable strategies.
//!
//! Each [`Strategy`] variant carries its own parameters and answers the same
//! three operations: [`Strategy::compute_indicators`],
//! [`Strategy::generate_signal`] and [`Strategy::evaluate`]. Lookup by the
//! public identifier (`"RSI"`, `"MACD"`) goes through [`StrategyKind`].

use crate::domain::error::CipherquantError;
use crate::domain::indicator::{calculate_macd, calculate_rsi, IndicatorSeries};
use crate::domain::metrics::PerformanceMetrics;
use crate::domain::position::{self, ExitRule, PositionWalk, RiskLimits};
use crate::domain::series::PriceSeries;
use crate::domain::signal::{generate_signals, RsiThresholds, Signal, SignalRule};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StrategyKind {
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "MACD")]
    Macd,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 2] = [StrategyKind::Rsi, StrategyKind::Macd];

    pub fn id(self) -> &'static str {
        match self {
            StrategyKind::Rsi => "RSI",
            StrategyKind::Macd => "MACD",
        }
    }

    /// Shortest normalized series the strategy accepts.
    pub fn minimum_bars(self) -> usize {
        match self {
            StrategyKind::Rsi => 50,
            StrategyKind::Macd => 40,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Identifiers are matched exactly; `"rsi"` is not a strategy.
impl FromStr for StrategyKind {
    type Err = CipherquantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| CipherquantError::InvalidStrategy { name: s.to_string() })
    }
}

/// Tunable parameters for every strategy, read from `[strategy]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyParams {
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// Applies to RSI only.
    pub risk_managed: bool,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        let limits = RiskLimits::default();
        Self {
            rsi_period: 14,
            oversold: 30.0,
            overbought: 70.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            risk_managed: true,
            stop_loss: limits.stop_loss,
            take_profit: limits.take_profit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RsiStrategy {
    pub period: usize,
    pub thresholds: RsiThresholds,
    pub risk: Option<RiskLimits>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacdStrategy {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Rsi(RsiStrategy),
    Macd(MacdStrategy),
}

/// Everything one strategy produces from one series.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub indicators: IndicatorSeries,
    pub signals: Vec<Signal>,
    pub walk: PositionWalk,
    pub metrics: PerformanceMetrics,
}

impl Strategy {
    pub fn new(kind: StrategyKind, params: &StrategyParams) -> Self {
        match kind {
            StrategyKind::Rsi => Strategy::Rsi(RsiStrategy {
                period: params.rsi_period,
                thresholds: RsiThresholds {
                    oversold: params.oversold,
                    overbought: params.overbought,
                },
                risk: params.risk_managed.then_some(RiskLimits {
                    stop_loss: params.stop_loss,
                    take_profit: params.take_profit,
                }),
            }),
            StrategyKind::Macd => Strategy::Macd(MacdStrategy {
                fast: params.macd_fast,
                slow: params.macd_slow,
                signal: params.macd_signal,
            }),
        }
    }

    /// Registry lookup by public identifier.
    pub fn from_id(id: &str, params: &StrategyParams) -> Result<Self, CipherquantError> {
        Ok(Self::new(id.parse()?, params))
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Rsi(_) => StrategyKind::Rsi,
            Strategy::Macd(_) => StrategyKind::Macd,
        }
    }

    pub fn minimum_bars(&self) -> usize {
        self.kind().minimum_bars()
    }

    pub fn signal_rule(&self) -> SignalRule {
        match self {
            Strategy::Rsi(rsi) => SignalRule::RsiThreshold(rsi.thresholds),
            Strategy::Macd(_) => SignalRule::MacdCrossover,
        }
    }

    pub fn exit_rule(&self) -> ExitRule {
        match self {
            Strategy::Rsi(RsiStrategy {
                risk: Some(limits), ..
            }) => ExitRule::RiskManaged(*limits),
            _ => ExitRule::SignalChange,
        }
    }

    pub fn compute_indicators(&self, series: &PriceSeries) -> IndicatorSeries {
        match self {
            Strategy::Rsi(rsi) => calculate_rsi(series, rsi.period),
            Strategy::Macd(macd) => calculate_macd(series, macd.fast, macd.slow, macd.signal),
        }
    }

    pub fn generate_signal(
        &self,
        indicators: &IndicatorSeries,
    ) -> Result<Vec<Signal>, CipherquantError> {
        generate_signals(indicators, &self.signal_rule())
    }

    /// Indicators, signals, position walk and metrics for a normalized series.
    pub fn evaluate(&self, series: &PriceSeries) -> Result<Evaluation, CipherquantError> {
        series.check_integrity()?;
        let indicators = self.compute_indicators(series);
        if indicators.len() != series.len() {
            return Err(CipherquantError::InvalidInput {
                reason: format!(
                    "{} produced {} values for {} bars",
                    indicators.indicator_type,
                    indicators.len(),
                    series.len()
                ),
            });
        }
        let signals = self.generate_signal(&indicators)?;
        let walk = position::walk(series, &signals, &self.exit_rule())?;
        let metrics = PerformanceMetrics::compute(series, &walk);
        tracing::debug!(
            symbol = %series.symbol,
            strategy = %self.kind(),
            bars = series.len(),
            trades = walk.trades.len(),
            "evaluated strategy"
        );
        Ok(Evaluation {
            indicators,
            signals,
            walk,
            metrics,
        })
    }
}
