//! Configuration validation.
//!
//! Every section is checked before a run starts so that a bad value surfaces
//! as a config error rather than as a silently defaulted parameter.

use crate::domain::backtest::MAX_LOOKBACK_DAYS;
use crate::domain::error::CipherquantError;
use crate::domain::symbols::parse_symbols;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::net::SocketAddr;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn validate_database_config(config: &dyn ConfigPort) -> Result<(), CipherquantError> {
    match config.get_string("database", "path") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(CipherquantError::ConfigMissing {
                section: "database".to_string(),
                key: "path".to_string(),
            })
        }
    }
    if let Some(size) = parsed::<u32>(config, "database", "pool_size")? {
        if size == 0 {
            return Err(invalid("database", "pool_size", "pool_size must be at least 1"));
        }
    }
    Ok(())
}

pub fn validate_server_config(config: &dyn ConfigPort) -> Result<(), CipherquantError> {
    parsed::<SocketAddr>(config, "server", "bind")?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), CipherquantError> {
    validate_rsi(config)?;
    validate_macd(config)?;
    validate_risk(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), CipherquantError> {
    validate_dates(config)?;
    validate_lookback(config)?;
    validate_symbols(config)?;
    Ok(())
}

fn validate_rsi(config: &dyn ConfigPort) -> Result<(), CipherquantError> {
    if parsed::<usize>(config, "strategy", "rsi_period")? == Some(0) {
        return Err(invalid("strategy", "rsi_period", "rsi_period must be at least 1"));
    }
    let oversold = parsed::<f64>(config, "strategy", "oversold")?.unwrap_or(30.0);
    let overbought = parsed::<f64>(config, "strategy", "overbought")?.unwrap_or(70.0);
    if !(0.0..=100.0).contains(&oversold) {
        return Err(invalid("strategy", "oversold", "oversold must be between 0 and 100"));
    }
    if !(0.0..=100.0).contains(&overbought) {
        return Err(invalid(
            "strategy",
            "overbought",
            "overbought must be between 0 and 100",
        ));
    }
    if oversold >= overbought {
        return Err(invalid(
            "strategy",
            "oversold",
            "oversold must be below overbought",
        ));
    }
    Ok(())
}

fn validate_macd(config: &dyn ConfigPort) -> Result<(), CipherquantError> {
    let fast = parsed::<usize>(config, "strategy", "macd_fast")?.unwrap_or(12);
    let slow = parsed::<usize>(config, "strategy", "macd_slow")?.unwrap_or(26);
    let signal = parsed::<usize>(config, "strategy", "macd_signal")?.unwrap_or(9);
    if fast == 0 {
        return Err(invalid("strategy", "macd_fast", "macd_fast must be at least 1"));
    }
    if signal == 0 {
        return Err(invalid("strategy", "macd_signal", "macd_signal must be at least 1"));
    }
    if slow <= fast {
        return Err(invalid(
            "strategy",
            "macd_slow",
            "macd_slow must be greater than macd_fast",
        ));
    }
    Ok(())
}

fn validate_risk(config: &dyn ConfigPort) -> Result<(), CipherquantError> {
    if let Some(raw) = config.get_string("strategy", "risk_managed") {
        if !matches!(
            raw.trim().to_lowercase().as_str(),
            "true" | "false" | "yes" | "no" | "1" | "0" | "on" | "off"
        ) {
            return Err(invalid("strategy", "risk_managed", "expected a boolean"));
        }
    }
    let stop_loss = parsed::<f64>(config, "strategy", "stop_loss")?.unwrap_or(0.02);
    if stop_loss <= 0.0 || stop_loss >= 1.0 {
        return Err(invalid("strategy", "stop_loss", "stop_loss must be between 0 and 1"));
    }
    let take_profit = parsed::<f64>(config, "strategy", "take_profit")?.unwrap_or(0.05);
    if take_profit <= 0.0 {
        return Err(invalid("strategy", "take_profit", "take_profit must be positive"));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), CipherquantError> {
    let start = config.get_string("backtest", "start_date");
    let end = config.get_string("backtest", "end_date");
    let start_date = start.as_deref().map(|s| parse_date(s, "start_date")).transpose()?;
    let end_date = end.as_deref().map(|s| parse_date(s, "end_date")).transpose()?;

    if let (Some(start_date), Some(end_date)) = (start_date, end_date) {
        if start_date >= end_date {
            return Err(invalid(
                "backtest",
                "start_date",
                "start_date must be before end_date",
            ));
        }
    }
    Ok(())
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), CipherquantError> {
    if let Some(days) = parsed::<i64>(config, "backtest", "lookback_days")? {
        if days < 1 {
            return Err(invalid(
                "backtest",
                "lookback_days",
                "lookback_days must be at least 1",
            ));
        }
        if days > MAX_LOOKBACK_DAYS {
            return Err(invalid(
                "backtest",
                "lookback_days",
                &format!("lookback_days must be at most {MAX_LOOKBACK_DAYS}"),
            ));
        }
    }
    Ok(())
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), CipherquantError> {
    if let Some(list) = config.get_string("backtest", "symbols") {
        parse_symbols(&list).map_err(|e| invalid("backtest", "symbols", &e.to_string()))?;
    }
    Ok(())
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, CipherquantError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        invalid(
            "backtest",
            field,
            &format!("invalid {} format, expected YYYY-MM-DD", field),
        )
    })
}

/// `None` when the key is absent, an error when present but unparseable.
fn parsed<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, CipherquantError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("cannot parse '{}'", raw.trim()))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> CipherquantError {
    CipherquantError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
