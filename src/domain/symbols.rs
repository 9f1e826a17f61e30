//! Symbol lists for batch runs.
//!
//! Parses the comma-separated `[backtest] symbols` value and screens each
//! symbol against the provider before any evaluation starts.

use crate::domain::error::CipherquantError;
use crate::ports::data_port::DataPort;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    Duplicate(String),
}

impl From<SymbolError> for CipherquantError {
    fn from(err: SymbolError) -> Self {
        CipherquantError::InvalidInput {
            reason: err.to_string(),
        }
    }
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, SymbolError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(SymbolError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(SymbolError::Duplicate(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenedSymbols {
    pub valid: Vec<String>,
    pub skipped: Vec<SkippedSymbol>,
}

/// Split `symbols` into those with at least `minimum` stored rows and the rest.
///
/// Stored row counts are an upper bound on the normalized length, so a symbol
/// that passes here can still fail later with `InsufficientData`.
pub fn screen_symbols(
    data_port: &dyn DataPort,
    symbols: Vec<String>,
    minimum: usize,
) -> Result<ScreenedSymbols, CipherquantError> {
    let mut screened = ScreenedSymbols::default();

    for symbol in symbols {
        match data_port.get_data_range(&symbol)? {
            None => {
                tracing::warn!(%symbol, "skipping symbol: no data");
                screened.skipped.push(SkippedSymbol {
                    symbol,
                    reason: SkipReason::NoData,
                });
            }
            Some((_, _, bars)) if bars < minimum => {
                tracing::warn!(%symbol, bars, minimum, "skipping symbol: too few bars");
                screened.skipped.push(SkippedSymbol {
                    symbol,
                    reason: SkipReason::InsufficientBars { bars },
                });
            }
            Some(_) => screened.valid.push(symbol),
        }
    }

    Ok(screened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::RawFrame;
    use chrono::NaiveDate;

    #[test]
    fn parse_basic() {
        assert_eq!(parse_symbols("AAPL,MSFT,GOOG").unwrap(), vec!["AAPL", "MSFT", "GOOG"]);
    }

    #[test]
    fn parse_trims_and_uppercases() {
        assert_eq!(parse_symbols("  aapl , msft").unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn parse_empty_token() {
        assert_eq!(parse_symbols("AAPL,,MSFT"), Err(SymbolError::EmptyToken));
        assert_eq!(parse_symbols(""), Err(SymbolError::EmptyToken));
    }

    #[test]
    fn parse_duplicate() {
        assert_eq!(
            parse_symbols("AAPL,msft,aapl"),
            Err(SymbolError::Duplicate("AAPL".into()))
        );
    }

    struct RangeOnly;

    impl DataPort for RangeOnly {
        fn fetch_prices(
            &self,
            symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<RawFrame, CipherquantError> {
            Ok(RawFrame::empty(symbol))
        }

        fn list_symbols(&self) -> Result<Vec<String>, CipherquantError> {
            Ok(vec![])
        }

        fn get_data_range(
            &self,
            symbol: &str,
        ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CipherquantError> {
            let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            Ok(match symbol {
                "FULL" => Some((d, d, 300)),
                "THIN" => Some((d, d, 10)),
                _ => None,
            })
        }
    }

    #[test]
    fn screen_splits_symbols() {
        let symbols = vec!["FULL".into(), "THIN".into(), "NONE".into()];
        let screened = screen_symbols(&RangeOnly, symbols, 50).unwrap();
        assert_eq!(screened.valid, vec!["FULL"]);
        assert_eq!(
            screened.skipped,
            vec![
                SkippedSymbol {
                    symbol: "THIN".into(),
                    reason: SkipReason::InsufficientBars { bars: 10 },
                },
                SkippedSymbol {
                    symbol: "NONE".into(),
                    reason: SkipReason::NoData,
                },
            ]
        );
    }
}
