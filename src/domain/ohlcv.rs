//! Raw OHLCV rows as delivered by a price provider.
//!
//! A provider hands the core a [`RawFrame`]: one date column plus five nullable
//! value columns. A column that is `None` was absent from the source entirely;
//! a cell that is `None` (or NaN) is a gap to be filled during normalization.

use chrono::NaiveDate;
use std::fmt;

/// The five value columns every price source must supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Open,
        Column::High,
        Column::Low,
        Column::Close,
        Column::Volume,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Open => "open",
            Column::High => "high",
            Column::Low => "low",
            Column::Close => "close",
            Column::Volume => "volume",
        }
    }

    /// Case-insensitive header lookup; spaces count as underscores.
    pub fn from_header(header: &str) -> Option<Self> {
        match header.trim().to_lowercase().replace(' ', "_").as_str() {
            "open" | "open_price" => Some(Column::Open),
            "high" | "high_price" => Some(Column::High),
            "low" | "low_price" => Some(Column::Low),
            "close" | "close_price" => Some(Column::Close),
            "volume" => Some(Column::Volume),
            _ => None,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single stored row. Every value cell may be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl OhlcvBar {
    pub fn new(
        symbol: &str,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        }
    }

    pub fn get(&self, column: Column) -> Option<f64> {
        match column {
            Column::Open => self.open,
            Column::High => self.high,
            Column::Low => self.low,
            Column::Close => self.close,
            Column::Volume => self.volume,
        }
    }
}

/// Columnar, unvalidated price data for one symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    pub symbol: String,
    pub dates: Vec<NaiveDate>,
    pub open: Option<Vec<Option<f64>>>,
    pub high: Option<Vec<Option<f64>>>,
    pub low: Option<Vec<Option<f64>>>,
    pub close: Option<Vec<Option<f64>>>,
    pub volume: Option<Vec<Option<f64>>>,
}

impl RawFrame {
    /// An empty frame with every column present.
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            dates: Vec::new(),
            open: Some(Vec::new()),
            high: Some(Vec::new()),
            low: Some(Vec::new()),
            close: Some(Vec::new()),
            volume: Some(Vec::new()),
        }
    }

    /// Build a frame from stored rows. All five columns are present.
    pub fn from_bars(symbol: &str, bars: &[OhlcvBar]) -> Self {
        let mut frame = Self::empty(symbol);
        for bar in bars {
            frame.push_row(bar.date, |c| bar.get(c));
        }
        frame
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, column: Column) -> Option<&[Option<f64>]> {
        let values = match column {
            Column::Open => &self.open,
            Column::High => &self.high,
            Column::Low => &self.low,
            Column::Close => &self.close,
            Column::Volume => &self.volume,
        };
        values.as_deref()
    }

    fn column_mut(&mut self, column: Column) -> Option<&mut Vec<Option<f64>>> {
        match column {
            Column::Open => self.open.as_mut(),
            Column::High => self.high.as_mut(),
            Column::Low => self.low.as_mut(),
            Column::Close => self.close.as_mut(),
            Column::Volume => self.volume.as_mut(),
        }
    }

    /// Drop a column entirely, as if the source never had it.
    pub fn without_column(mut self, column: Column) -> Self {
        match column {
            Column::Open => self.open = None,
            Column::High => self.high = None,
            Column::Low => self.low = None,
            Column::Close => self.close = None,
            Column::Volume => self.volume = None,
        }
        self
    }

    /// Columns that are absent, in canonical order.
    pub fn missing_columns(&self) -> Vec<Column> {
        Column::ALL
            .into_iter()
            .filter(|c| self.column(*c).is_none())
            .collect()
    }

    /// Append one row; `value` is asked for every present column.
    pub fn push_row(&mut self, date: NaiveDate, value: impl Fn(Column) -> Option<f64>) {
        self.dates.push(date);
        for column in Column::ALL {
            if let Some(values) = self.column_mut(column) {
                values.push(value(column));
            }
        }
    }

    /// Convert back to stored rows; absent columns become missing cells.
    pub fn to_bars(&self) -> Vec<OhlcvBar> {
        let cell = |column: Column, i: usize| {
            self.column(column)
                .and_then(|values| values.get(i).copied().flatten())
                .filter(|v| !v.is_nan())
        };
        self.dates
            .iter()
            .enumerate()
            .map(|(i, &date)| OhlcvBar {
                symbol: self.symbol.clone(),
                date,
                open: cell(Column::Open, i),
                high: cell(Column::High, i),
                low: cell(Column::Low, i),
                close: cell(Column::Close, i),
                volume: cell(Column::Volume, i),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn from_bars_keeps_all_columns() {
        let bars = vec![
            OhlcvBar::new("AAPL", date(2), 100.0, 101.0, 99.0, 100.5, 1_000.0),
            OhlcvBar::new("AAPL", date(3), 100.5, 102.0, 100.0, 101.5, 1_500.0),
        ];
        let frame = RawFrame::from_bars("AAPL", &bars);
        assert_eq!(frame.len(), 2);
        assert!(frame.missing_columns().is_empty());
        assert_eq!(frame.column(Column::Close).unwrap()[1], Some(101.5));
    }

    #[test]
    fn without_column_reports_missing() {
        let frame = RawFrame::empty("AAPL")
            .without_column(Column::Volume)
            .without_column(Column::Open);
        assert_eq!(frame.missing_columns(), vec![Column::Open, Column::Volume]);
    }

    #[test]
    fn push_row_skips_absent_columns() {
        let mut frame = RawFrame::empty("MSFT").without_column(Column::High);
        frame.push_row(date(2), |c| match c {
            Column::Close => Some(10.0),
            _ => None,
        });
        assert!(frame.high.is_none());
        assert_eq!(frame.close, Some(vec![Some(10.0)]));
        assert_eq!(frame.open, Some(vec![None]));
    }

    #[test]
    fn to_bars_turns_nan_into_missing() {
        let mut frame = RawFrame::empty("MSFT");
        frame.push_row(date(2), |c| match c {
            Column::Close => Some(f64::NAN),
            _ => Some(1.0),
        });
        let bars = frame.to_bars();
        assert_eq!(bars[0].close, None);
        assert_eq!(bars[0].open, Some(1.0));
    }

    #[test]
    fn header_lookup() {
        assert_eq!(Column::from_header("Close"), Some(Column::Close));
        assert_eq!(Column::from_header(" close_price "), Some(Column::Close));
        assert_eq!(Column::from_header("VOLUME"), Some(Column::Volume));
        assert_eq!(Column::from_header("Adj Close"), None);
    }
}
