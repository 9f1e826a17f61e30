//! Backtest entry point.
//!
//! `provider -> normalize -> indicators -> signals -> position walk -> metrics`.
//! Each call owns its series and state; nothing is cached between runs.

use crate::domain::error::CipherquantError;
use crate::domain::indicator::{IndicatorSeries, IndicatorValue};
use crate::domain::metrics::PerformanceMetrics;
use crate::domain::ohlcv::RawFrame;
use crate::domain::position::{PositionWalk, TradeRecord};
use crate::domain::series::{normalize, PriceSeries};
use crate::domain::signal::Signal;
use crate::domain::strategy::{Strategy, StrategyKind, StrategyParams};
use crate::ports::data_port::DataPort;
use chrono::{Duration, NaiveDate};
use serde::Serialize;

/// Calendar days evaluated when no start date is given.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 365;

/// Upper bound on a configured lookback, roughly a century.
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// `end` minus `days` calendar days, rejecting lookbacks outside
/// `1..=MAX_LOOKBACK_DAYS` and results before the earliest representable date.
pub fn lookback_start(end: NaiveDate, days: i64) -> Result<NaiveDate, CipherquantError> {
    if !(1..=MAX_LOOKBACK_DAYS).contains(&days) {
        return Err(CipherquantError::InvalidInput {
            reason: format!("lookback of {days} days must be between 1 and {MAX_LOOKBACK_DAYS}"),
        });
    }
    Duration::try_days(days)
        .and_then(|span| end.checked_sub_signed(span))
        .ok_or_else(|| CipherquantError::InvalidInput {
            reason: format!("{days} days before {end} is out of range"),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Rows dated after this are never evaluated.
    pub as_of: NaiveDate,
}

impl BacktestConfig {
    /// The trailing `days` calendar days ending at `as_of`.
    pub fn trailing(days: i64, as_of: NaiveDate) -> Result<Self, CipherquantError> {
        Ok(Self {
            start_date: lookback_start(as_of, days)?,
            end_date: as_of,
            as_of,
        })
    }

    pub fn validate(&self) -> Result<(), CipherquantError> {
        if self.start_date > self.end_date {
            return Err(CipherquantError::InvalidInput {
                reason: format!(
                    "start date {} is after end date {}",
                    self.start_date, self.end_date
                ),
            });
        }
        if self.start_date > self.as_of {
            return Err(CipherquantError::InvalidInput {
                reason: format!("start date {} is in the future", self.start_date),
            });
        }
        Ok(())
    }

    /// End of the range actually requested from the provider.
    pub fn fetch_end(&self) -> NaiveDate {
        self.end_date.min(self.as_of)
    }
}

/// The `(symbol, strategy, total_return)` tuple handed to persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub symbol: String,
    pub strategy: StrategyKind,
    pub total_return: f64,
}

/// Aligned columns for plotting; every vector has one entry per bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub symbol: String,
    pub strategy: StrategyKind,
    pub dates: Vec<NaiveDate>,
    pub close: Vec<f64>,
    pub daily_return: Vec<f64>,
    pub signal: Vec<Signal>,
    pub position: Vec<Signal>,
    pub strategy_return: Vec<f64>,
    pub cumulative_return: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd_signal: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram: Option<Vec<f64>>,
}

impl ChartData {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub strategy: StrategyKind,
    pub series: PriceSeries,
    pub indicators: IndicatorSeries,
    pub signals: Vec<Signal>,
    pub walk: PositionWalk,
    pub metrics: PerformanceMetrics,
}

impl BacktestResult {
    pub fn symbol(&self) -> &str {
        &self.series.symbol
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.walk.trades
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            symbol: self.series.symbol.clone(),
            strategy: self.strategy,
            total_return: self.metrics.total_return,
        }
    }

    pub fn chart(&self) -> ChartData {
        let strategy_return = self.walk.strategy_returns();
        let cumulative_return = strategy_return
            .iter()
            .scan(0.0, |acc, r| {
                *acc += r;
                Some(*acc)
            })
            .collect();

        let mut chart = ChartData {
            symbol: self.series.symbol.clone(),
            strategy: self.strategy,
            dates: self.series.dates(),
            close: self.series.closes(),
            daily_return: self.series.daily_returns(),
            signal: self.signals.clone(),
            position: self.walk.positions(),
            strategy_return,
            cumulative_return,
            rsi: None,
            macd: None,
            macd_signal: None,
            histogram: None,
        };

        match self.strategy {
            StrategyKind::Rsi => chart.rsi = Some(self.indicators.simple_values()),
            StrategyKind::Macd => {
                let (mut line, mut signal, mut histogram) = (Vec::new(), Vec::new(), Vec::new());
                for point in &self.indicators.values {
                    if let IndicatorValue::Macd {
                        line: l,
                        signal: s,
                        histogram: h,
                    } = point.value
                    {
                        line.push(l);
                        signal.push(s);
                        histogram.push(h);
                    }
                }
                chart.macd = Some(line);
                chart.macd_signal = Some(signal);
                chart.histogram = Some(histogram);
            }
        }
        chart
    }
}

/// Normalize an already fetched frame and evaluate one strategy on it.
pub fn evaluate_frame(
    raw: &RawFrame,
    strategy: &Strategy,
    as_of: NaiveDate,
) -> Result<BacktestResult, CipherquantError> {
    let series = normalize(raw, strategy.minimum_bars(), as_of)?;
    let evaluation = strategy.evaluate(&series)?;
    Ok(BacktestResult {
        strategy: strategy.kind(),
        series,
        indicators: evaluation.indicators,
        signals: evaluation.signals,
        walk: evaluation.walk,
        metrics: evaluation.metrics,
    })
}

pub fn run_backtest(
    provider: &dyn DataPort,
    symbol: &str,
    strategy: &Strategy,
    config: &BacktestConfig,
) -> Result<BacktestResult, CipherquantError> {
    config.validate()?;
    let raw = provider.fetch_prices(symbol, config.start_date, config.fetch_end())?;
    tracing::debug!(symbol, rows = raw.len(), strategy = %strategy.kind(), "fetched prices");
    evaluate_frame(&raw, strategy, config.as_of)
}

/// One row of a strategy comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyComparison {
    pub strategy: StrategyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PerformanceMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StrategyComparison {
    fn total_return(&self) -> f64 {
        self.metrics
            .as_ref()
            .map_or(f64::NEG_INFINITY, |m| m.total_return)
    }
}

/// Run every registered strategy on one fetch of `symbol`.
///
/// Results are sorted by total return, best first. A strategy that lacks
/// enough bars is reported with its error instead of failing the comparison;
/// any other error aborts.
pub fn compare_strategies(
    provider: &dyn DataPort,
    symbol: &str,
    params: &StrategyParams,
    config: &BacktestConfig,
) -> Result<Vec<StrategyComparison>, CipherquantError> {
    config.validate()?;
    let raw = provider.fetch_prices(symbol, config.start_date, config.fetch_end())?;

    let mut rows = Vec::with_capacity(StrategyKind::ALL.len());
    for kind in StrategyKind::ALL {
        let strategy = Strategy::new(kind, params);
        match evaluate_frame(&raw, &strategy, config.as_of) {
            Ok(result) => rows.push(StrategyComparison {
                strategy: kind,
                metrics: Some(result.metrics),
                error: None,
            }),
            Err(e @ CipherquantError::InsufficientData { .. }) => {
                tracing::debug!(symbol, strategy = %kind, error = %e, "strategy skipped");
                rows.push(StrategyComparison {
                    strategy: kind,
                    metrics: None,
                    error: Some(e.to_string()),
                });
            }
            Err(e) => return Err(e),
        }
    }

    rows.sort_by(|a, b| b.total_return().total_cmp(&a.total_return()));
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use std::cell::Cell;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct FrameProvider {
        bars: Vec<OhlcvBar>,
        fetches: Cell<usize>,
    }

    impl FrameProvider {
        fn with_closes(closes: &[f64]) -> Self {
            let start = date("2024-01-01");
            let bars = closes
                .iter()
                .enumerate()
                .map(|(i, &c)| {
                    OhlcvBar::new("TEST", start + Duration::days(i as i64), c, c, c, c, 1000.0)
                })
                .collect();
            Self {
                bars,
                fetches: Cell::new(0),
            }
        }
    }

    impl DataPort for FrameProvider {
        fn fetch_prices(
            &self,
            symbol: &str,
            start_date: NaiveDate,
            end_date: NaiveDate,
        ) -> Result<RawFrame, CipherquantError> {
            self.fetches.set(self.fetches.get() + 1);
            let bars: Vec<OhlcvBar> = self
                .bars
                .iter()
                .filter(|b| b.date >= start_date && b.date <= end_date)
                .cloned()
                .collect();
            Ok(RawFrame::from_bars(symbol, &bars))
        }

        fn list_symbols(&self) -> Result<Vec<String>, CipherquantError> {
            Ok(vec!["TEST".into()])
        }

        fn get_data_range(
            &self,
            _symbol: &str,
        ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CipherquantError> {
            Ok(None)
        }
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64 * 0.4).sin() * 8.0)
            .collect()
    }

    fn config() -> BacktestConfig {
        BacktestConfig {
            start_date: date("2024-01-01"),
            end_date: date("2024-12-31"),
            as_of: date("2024-12-31"),
        }
    }

    #[test]
    fn config_rejects_inverted_range() {
        let c = BacktestConfig {
            start_date: date("2024-06-01"),
            end_date: date("2024-01-01"),
            as_of: date("2024-12-31"),
        };
        assert!(matches!(c.validate(), Err(CipherquantError::InvalidInput { .. })));
    }

    #[test]
    fn config_rejects_future_start() {
        let c = BacktestConfig {
            start_date: date("2025-01-02"),
            end_date: date("2025-02-01"),
            as_of: date("2025-01-01"),
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn trailing_window() {
        let c = BacktestConfig::trailing(365, date("2024-12-31")).unwrap();
        assert_eq!(c.start_date, date("2024-01-01"));
        assert_eq!(c.end_date, c.as_of);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn lookback_near_earliest_date_is_rejected() {
        let err = lookback_start(NaiveDate::MIN, 365).unwrap_err();
        assert!(matches!(err, CipherquantError::InvalidInput { .. }));
        assert!(BacktestConfig::trailing(30, NaiveDate::MIN).is_err());
        assert_eq!(
            lookback_start(NaiveDate::MIN + Duration::days(1), 1).unwrap(),
            NaiveDate::MIN
        );
    }

    #[test]
    fn lookback_days_are_bounded() {
        let end = date("2024-12-31");
        for days in [0, -5, MAX_LOOKBACK_DAYS + 1, i64::MAX] {
            assert!(matches!(
                lookback_start(end, days),
                Err(CipherquantError::InvalidInput { .. })
            ));
        }
        assert!(lookback_start(end, MAX_LOOKBACK_DAYS).is_ok());
    }

    #[test]
    fn fetch_end_is_clamped_to_as_of() {
        let c = BacktestConfig {
            start_date: date("2024-01-01"),
            end_date: date("2030-01-01"),
            as_of: date("2024-03-01"),
        };
        assert_eq!(c.fetch_end(), date("2024-03-01"));
    }

    #[test]
    fn run_backtest_chart_is_aligned() {
        let provider = FrameProvider::with_closes(&wave(80));
        let strategy = Strategy::new(StrategyKind::Macd, &StrategyParams::default());
        let result = run_backtest(&provider, "TEST", &strategy, &config()).unwrap();
        let chart = result.chart();
        assert_eq!(chart.len(), 80);
        for len in [
            chart.close.len(),
            chart.daily_return.len(),
            chart.signal.len(),
            chart.position.len(),
            chart.strategy_return.len(),
            chart.cumulative_return.len(),
            chart.macd.as_ref().unwrap().len(),
            chart.macd_signal.as_ref().unwrap().len(),
            chart.histogram.as_ref().unwrap().len(),
        ] {
            assert_eq!(len, 80);
        }
        assert!(chart.rsi.is_none());
        let last = *chart.cumulative_return.last().unwrap();
        assert!((last - result.metrics.total_return).abs() < 1e-12);
    }

    #[test]
    fn summary_carries_total_return() {
        let provider = FrameProvider::with_closes(&wave(60));
        let strategy = Strategy::new(StrategyKind::Rsi, &StrategyParams::default());
        let result = run_backtest(&provider, "TEST", &strategy, &config()).unwrap();
        let summary = result.summary();
        assert_eq!(summary.symbol, "TEST");
        assert_eq!(summary.strategy, StrategyKind::Rsi);
        assert_eq!(summary.total_return, result.metrics.total_return);
        assert!(result.chart().rsi.is_some());
    }

    #[test]
    fn compare_reports_insufficient_data_per_strategy() {
        // enough for MACD (40) but not RSI (50)
        let provider = FrameProvider::with_closes(&wave(45));
        let rows =
            compare_strategies(&provider, "TEST", &StrategyParams::default(), &config()).unwrap();
        assert_eq!(provider.fetches.get(), 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].strategy, StrategyKind::Macd);
        assert!(rows[0].metrics.is_some());
        assert_eq!(rows[1].strategy, StrategyKind::Rsi);
        assert!(rows[1].metrics.is_none());
        assert!(rows[1].error.as_ref().unwrap().contains("insufficient data"));
    }

    #[test]
    fn compare_sorted_by_total_return() {
        let provider = FrameProvider::with_closes(&wave(120));
        let rows =
            compare_strategies(&provider, "TEST", &StrategyParams::default(), &config()).unwrap();
        let returns: Vec<f64> = rows
            .iter()
            .map(|r| r.metrics.as_ref().unwrap().total_return)
            .collect();
        assert!(returns[0] >= returns[1]);
    }
}
