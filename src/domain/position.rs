//! Position and risk-state machine.
//!
//! The walk is a strict left-to-right fold over the bars. The accumulator is a
//! [`PositionState`] (direction and entry price); each bar emits one immutable
//! [`StepResult`] and, when a position closes, one [`TradeRecord`].
//!
//! Rules:
//! - at most one position is open; entry signals while open are ignored;
//! - `Strategy_Return[t]` is the position held coming into bar `t` times that
//!   bar's daily return, so the entry bar earns nothing and the exit bar does;
//! - a bar that closes a position never opens a new one;
//! - nothing is opened on the final bar, and a position still open there is
//!   closed with [`ExitReason::EndOfData`].

use crate::domain::error::CipherquantError;
use crate::domain::series::{PriceBar, PriceSeries};
use crate::domain::signal::Signal;
use chrono::NaiveDate;
use serde::Serialize;

/// Stop-loss and take-profit as fractions of the entry price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskLimits {
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            stop_loss: 0.02,
            take_profit: 0.05,
        }
    }
}

impl RiskLimits {
    pub fn breach(&self, unrealized_return: f64) -> Option<ExitReason> {
        if unrealized_return <= -self.stop_loss {
            Some(ExitReason::StopLoss)
        } else if unrealized_return >= self.take_profit {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }
}

/// When an open position is closed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitRule {
    /// Any signal other than the held direction closes the position.
    SignalChange,
    /// Only the opposite signal or a risk breach closes; a flat signal holds.
    RiskManaged(RiskLimits),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::EndOfData => "end_of_data",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "signal" => Some(ExitReason::Signal),
            "stop_loss" => Some(ExitReason::StopLoss),
            "take_profit" => Some(ExitReason::TakeProfit),
            "end_of_data" => Some(ExitReason::EndOfData),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionState {
    pub position: Signal,
    pub entry_price: f64,
    pub entry_date: Option<NaiveDate>,
}

impl PositionState {
    pub fn is_open(&self) -> bool {
        !self.position.is_flat()
    }

    fn open(direction: Signal, bar: &PriceBar) -> Self {
        Self {
            position: direction,
            entry_price: bar.close,
            entry_date: Some(bar.date),
        }
    }

    /// Direction-adjusted return since entry; zero when flat.
    pub fn unrealized_return(&self, price: f64) -> f64 {
        if !self.is_open() || self.entry_price == 0.0 {
            return 0.0;
        }
        self.position.as_f64() * (price - self.entry_price) / self.entry_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub date: NaiveDate,
    pub signal: Signal,
    /// Position held at the end of the bar.
    pub position: Signal,
    /// Zero whenever `position` is flat.
    pub entry_price: f64,
    pub strategy_return: f64,
    pub exit: Option<ExitReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub direction: Signal,
    pub return_pct: f64,
    pub exit_reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PositionWalk {
    pub steps: Vec<StepResult>,
    pub trades: Vec<TradeRecord>,
}

impl PositionWalk {
    pub fn strategy_returns(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.strategy_return).collect()
    }

    pub fn positions(&self) -> Vec<Signal> {
        self.steps.iter().map(|s| s.position).collect()
    }
}

/// Advance the state machine by one bar.
pub fn step(
    state: PositionState,
    bar: &PriceBar,
    signal: Signal,
    rule: &ExitRule,
    is_last: bool,
) -> (PositionState, StepResult, Option<TradeRecord>) {
    let strategy_return = state.position.as_f64() * bar.daily_return;

    let (next, exit) = if state.is_open() {
        let exit = exit_reason(&state, bar, signal, rule)
            .or(is_last.then_some(ExitReason::EndOfData));
        match exit {
            Some(_) => (PositionState::default(), exit),
            None => (state, None),
        }
    } else if !signal.is_flat() && !is_last {
        (PositionState::open(signal, bar), None)
    } else {
        (state, None)
    };

    let trade = exit.and_then(|reason| {
        state.entry_date.map(|entry_date| TradeRecord {
            entry_date,
            exit_date: bar.date,
            entry_price: state.entry_price,
            exit_price: bar.close,
            direction: state.position,
            return_pct: state.unrealized_return(bar.close),
            exit_reason: reason,
        })
    });

    let result = StepResult {
        date: bar.date,
        signal,
        position: next.position,
        entry_price: if next.is_open() { next.entry_price } else { 0.0 },
        strategy_return,
        exit,
    };

    (next, result, trade)
}

fn exit_reason(
    state: &PositionState,
    bar: &PriceBar,
    signal: Signal,
    rule: &ExitRule,
) -> Option<ExitReason> {
    match rule {
        ExitRule::SignalChange => (signal != state.position).then_some(ExitReason::Signal),
        ExitRule::RiskManaged(limits) => limits
            .breach(state.unrealized_return(bar.close))
            .or((signal == state.position.opposite()).then_some(ExitReason::Signal)),
    }
}

/// Walk the whole series in order.
pub fn walk(
    series: &PriceSeries,
    signals: &[Signal],
    rule: &ExitRule,
) -> Result<PositionWalk, CipherquantError> {
    series.check_integrity()?;
    if signals.len() != series.len() {
        let index = signals.len().min(series.len());
        return Err(CipherquantError::DataIntegrity {
            index,
            date: series
                .bars
                .get(index)
                .or(series.bars.last())
                .map(|b| b.date)
                .unwrap_or_default(),
            field: "signal".into(),
            reason: format!(
                "series has {} bars but {} signals",
                series.len(),
                signals.len()
            ),
        });
    }

    let last = series.len().saturating_sub(1);
    let (_, walk) = series.bars.iter().zip(signals).enumerate().fold(
        (PositionState::default(), PositionWalk::default()),
        |(state, mut walk), (i, (bar, &signal))| {
            let (next, result, trade) = step(state, bar, signal, rule, i == last);
            walk.steps.push(result);
            walk.trades.extend(trade);
            (next, walk)
        },
    );

    tracing::debug!(
        symbol = %series.symbol,
        bars = walk.steps.len(),
        trades = walk.trades.len(),
        "position walk complete"
    );

    Ok(walk)
}
