//! Core domain types and logic.
//!
//! Data flows one way: [`ohlcv`] rows are normalized into a [`series`], turned
//! into [`indicator`] values, mapped to [`signal`]s, walked through the
//! [`position`] state machine and reduced to [`metrics`].

pub mod ohlcv;
pub mod series;
pub mod indicator;
pub mod signal;
pub mod position;
pub mod metrics;
pub mod strategy;
pub mod backtest;
pub mod symbols;
pub mod config_validation;
pub mod error;
