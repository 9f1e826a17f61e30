#![allow(dead_code)]

use chrono::NaiveDate;
use cipherquant::domain::backtest::BacktestConfig;
use cipherquant::domain::error::CipherquantError;
pub use cipherquant::domain::ohlcv::{Column, OhlcvBar, RawFrame};
use cipherquant::domain::series::{normalize, PriceSeries};
use cipherquant::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub frames: HashMap<String, RawFrame>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            frames: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        let frame = RawFrame::from_bars(symbol, &bars);
        self.with_frame(frame)
    }

    pub fn with_frame(mut self, frame: RawFrame) -> Self {
        self.frames.insert(frame.symbol.clone(), frame);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn check(&self, symbol: &str) -> Result<(), CipherquantError> {
        match self.errors.get(symbol) {
            Some(reason) => Err(CipherquantError::Database {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<RawFrame, CipherquantError> {
        self.check(symbol)?;
        let Some(frame) = self.frames.get(symbol) else {
            return Ok(RawFrame::empty(symbol));
        };
        let mut out = RawFrame::empty(symbol);
        for column in frame.missing_columns() {
            out = out.without_column(column);
        }
        for (i, &date) in frame.dates.iter().enumerate() {
            if date >= start_date && date <= end_date {
                out.push_row(date, |c| frame.column(c).and_then(|v| v[i]));
            }
        }
        Ok(out)
    }

    fn list_symbols(&self) -> Result<Vec<String>, CipherquantError> {
        let mut symbols: Vec<String> = self.frames.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CipherquantError> {
        self.check(symbol)?;
        Ok(self.frames.get(symbol).and_then(|frame| {
            let first = frame.dates.iter().min()?;
            let last = frame.dates.iter().max()?;
            Some((*first, *last, frame.len()))
        }))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_bar(symbol: &str, date: &str, close: f64) -> OhlcvBar {
    OhlcvBar::new(
        symbol,
        parse_date(date),
        close - 1.0,
        close + 1.0,
        close - 2.0,
        close,
        1000.0,
    )
}

/// One bar per calendar day starting at `start_date`, closing on `closes`.
pub fn bars_from_closes(symbol: &str, start_date: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    let start = parse_date(start_date);
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            OhlcvBar::new(
                symbol,
                start + chrono::Duration::days(i as i64),
                c,
                c * 1.01,
                c * 0.99,
                c,
                1000.0,
            )
        })
        .collect()
}

/// `count` bars whose close oscillates around `start_price` with a slow drift.
pub fn generate_bars(symbol: &str, start_date: &str, count: usize, start_price: f64) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..count)
        .map(|i| {
            let t = i as f64;
            start_price + 0.05 * t + 4.0 * (t / 5.0).sin() + 1.5 * (t / 2.3).cos()
        })
        .collect();
    bars_from_closes(symbol, start_date, &closes)
}

/// Series of any length, bypassing the strategy minimum.
pub fn series_from_closes(symbol: &str, closes: &[f64]) -> PriceSeries {
    let bars = bars_from_closes(symbol, "2024-01-01", closes);
    normalize(&RawFrame::from_bars(symbol, &bars), 0, date(2100, 1, 1)).unwrap()
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        start_date: date(2020, 1, 1),
        end_date: date(2024, 12, 31),
        as_of: date(2024, 12, 31),
    }
}
