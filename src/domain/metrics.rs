//! Performance metrics and statistics.
//!
//! Every metric is a pure reduction over the per-bar strategy returns, the
//! position series, the trade list or the underlying daily returns. Degenerate
//! inputs resolve to documented fallbacks (zero), never to NaN or an error.

use crate::domain::position::{PositionWalk, TradeRecord};
use crate::domain::series::PriceSeries;
use crate::domain::signal::Signal;
use serde::{Deserialize, Serialize};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub avg_return_per_trade: f64,
}

impl PerformanceMetrics {
    pub fn compute(series: &PriceSeries, walk: &PositionWalk) -> Self {
        let returns = walk.strategy_returns();
        let positions = walk.positions();
        let daily = series.daily_returns();
        let (avg_win, avg_loss, avg_return_per_trade) = trade_averages(&walk.trades);

        Self {
            total_return: total_return(&returns),
            annualized_return: annualized_return(&daily),
            volatility: volatility(&daily),
            win_rate: win_rate(&returns, &positions),
            max_drawdown: max_drawdown(&returns),
            sharpe_ratio: sharpe_ratio(&returns),
            profit_factor: profit_factor(&returns),
            trade_count: trade_count(&positions),
            avg_win,
            avg_loss,
            avg_return_per_trade,
        }
    }
}

/// Simple (non-compounded) sum of period returns.
pub fn total_return(returns: &[f64]) -> f64 {
    returns.iter().sum()
}

/// `(prod(1 + r))^(252/N) - 1` over the market's own daily returns.
pub fn annualized_return(daily_returns: &[f64]) -> f64 {
    if daily_returns.is_empty() {
        return 0.0;
    }
    let growth: f64 = daily_returns.iter().map(|r| 1.0 + r).product();
    if growth <= 0.0 {
        return -1.0;
    }
    let annualized = growth.powf(TRADING_DAYS_PER_YEAR / daily_returns.len() as f64) - 1.0;
    if annualized.is_finite() { annualized } else { 0.0 }
}

pub fn volatility(daily_returns: &[f64]) -> f64 {
    sample_stddev(daily_returns).map_or(0.0, |sd| sd * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Most negative distance between the cumulative return and its running maximum.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut cumulative = 0.0;
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for r in returns {
        cumulative += r;
        peak = peak.max(cumulative);
        worst = worst.min(cumulative - peak);
    }
    worst
}

/// Winning bars over bars with a held position.
///
/// The denominator counts held positions rather than non-flat signals: the
/// risk-managed rule keeps a position open through flat signals, and counting
/// signals there would let the rate exceed one.
pub fn win_rate(returns: &[f64], positions: &[Signal]) -> f64 {
    let active = positions.iter().filter(|p| !p.is_flat()).count();
    if active == 0 {
        return 0.0;
    }
    let wins = returns.iter().filter(|r| **r > 0.0).count();
    wins as f64 / active as f64
}

pub fn profit_factor(returns: &[f64]) -> f64 {
    let gains: f64 = returns.iter().filter(|r| **r > 0.0).sum();
    let losses: f64 = returns.iter().filter(|r| **r < 0.0).sum::<f64>().abs();
    if losses > 0.0 { gains / losses } else { 0.0 }
}

pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let Some(stddev) = sample_stddev(returns) else {
        return 0.0;
    };
    if stddev == 0.0 {
        return 0.0;
    }
    mean(returns) / stddev * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Number of changes in the position series whose new value is non-flat.
pub fn trade_count(positions: &[Signal]) -> usize {
    let mut previous = Signal::Flat;
    let mut count = 0;
    for &position in positions {
        if position != previous && !position.is_flat() {
            count += 1;
        }
        previous = position;
    }
    count
}

/// (avg_win, avg_loss as a positive magnitude, avg_return_per_trade)
fn trade_averages(trades: &[TradeRecord]) -> (f64, f64, f64) {
    let wins: Vec<f64> = trades
        .iter()
        .map(|t| t.return_pct)
        .filter(|r| *r > 0.0)
        .collect();
    let losses: Vec<f64> = trades
        .iter()
        .map(|t| t.return_pct)
        .filter(|r| *r < 0.0)
        .map(f64::abs)
        .collect();
    let all: Vec<f64> = trades.iter().map(|t| t.return_pct).collect();
    (mean(&wins), mean(&losses), mean(&all))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (n - 1); `None` below two observations.
fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}
