//! Validated, gap-free daily price series.
//!
//! [`normalize`] is the only way raw provider rows enter the core:
//! 1. every value column must be present, otherwise `MissingColumns`;
//! 2. rows are ordered by date, duplicate dates keep the last row, and rows
//!    dated after `as_of` are dropped;
//! 3. fewer than `minimum` remaining rows fails with `InsufficientData`;
//! 4. prices are forward-filled then backward-filled, volume gaps become zero;
//! 5. `daily_return[t] = close[t] / close[t-1] - 1`, with `daily_return[0] = 0`.

use crate::domain::error::CipherquantError;
use crate::domain::ohlcv::{Column, RawFrame};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub daily_return: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn daily_returns(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.daily_return).collect()
    }

    /// Fail on the first bar whose close or daily return is not finite.
    ///
    /// Later stages call this so that a hand-built or corrupted series is
    /// rejected instead of silently producing flat signals.
    pub fn check_integrity(&self) -> Result<(), CipherquantError> {
        for (index, bar) in self.bars.iter().enumerate() {
            if !bar.close.is_finite() {
                return Err(integrity(index, bar.date, "close", "is not a finite number"));
            }
            if !bar.daily_return.is_finite() {
                return Err(integrity(
                    index,
                    bar.date,
                    "daily_return",
                    "is not a finite number",
                ));
            }
        }
        Ok(())
    }
}

fn integrity(index: usize, date: NaiveDate, field: &str, reason: &str) -> CipherquantError {
    CipherquantError::DataIntegrity {
        index,
        date,
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

pub fn normalize(
    raw: &RawFrame,
    minimum: usize,
    as_of: NaiveDate,
) -> Result<PriceSeries, CipherquantError> {
    let missing = raw.missing_columns();
    if !missing.is_empty() {
        return Err(CipherquantError::MissingColumns {
            symbol: raw.symbol.clone(),
            columns: missing.iter().map(|c| c.name().to_string()).collect(),
        });
    }

    // date -> source row; later rows overwrite earlier ones
    let mut rows: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut future = 0usize;
    for (i, &date) in raw.dates.iter().enumerate() {
        if date > as_of {
            future += 1;
            continue;
        }
        rows.insert(date, i);
    }
    if future > 0 {
        tracing::debug!(symbol = %raw.symbol, dropped = future, %as_of, "dropped future-dated rows");
    }

    if rows.len() < minimum {
        return Err(CipherquantError::InsufficientData {
            symbol: raw.symbol.clone(),
            bars: rows.len(),
            minimum,
        });
    }

    let dates: Vec<NaiveDate> = rows.keys().copied().collect();
    let order: Vec<usize> = rows.values().copied().collect();

    let pick = |column: Column| -> Vec<Option<f64>> {
        let values = raw.column(column).unwrap_or(&[]);
        order
            .iter()
            .map(|&i| values.get(i).copied().flatten().filter(|v| !v.is_nan()))
            .collect()
    };

    let open = fill_prices(pick(Column::Open), &dates, "open")?;
    let high = fill_prices(pick(Column::High), &dates, "high")?;
    let low = fill_prices(pick(Column::Low), &dates, "low")?;
    let close = fill_prices(pick(Column::Close), &dates, "close")?;
    let volume: Vec<f64> = pick(Column::Volume)
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect();

    let mut bars = Vec::with_capacity(dates.len());
    for (i, &date) in dates.iter().enumerate() {
        for (field, value) in [
            ("close", close[i]),
            ("open", open[i]),
            ("high", high[i]),
            ("low", low[i]),
        ] {
            if value <= 0.0 {
                return Err(integrity(i, date, field, "must be positive"));
            }
        }
        if volume[i] < 0.0 {
            return Err(integrity(i, date, "volume", "must not be negative"));
        }
        let daily_return = if i == 0 {
            0.0
        } else {
            close[i] / close[i - 1] - 1.0
        };
        bars.push(PriceBar {
            date,
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: volume[i],
            daily_return,
        });
    }

    Ok(PriceSeries {
        symbol: raw.symbol.clone(),
        bars,
    })
}

/// Forward-fill, then backward-fill the leading gap.
fn fill_prices(
    values: Vec<Option<f64>>,
    dates: &[NaiveDate],
    field: &str,
) -> Result<Vec<f64>, CipherquantError> {
    let Some(first_known) = values.iter().flatten().next().copied() else {
        return Err(integrity(
            0,
            dates.first().copied().unwrap_or_default(),
            field,
            "has no known values to fill from",
        ));
    };

    let mut last = first_known;
    Ok(values
        .into_iter()
        .map(|v| {
            if let Some(v) = v {
                last = v;
            }
            last
        })
        .collect())
}
