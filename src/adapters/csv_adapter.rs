//! CSV price files.
//!
//! Files are header-driven: a `date` column plus any of `open, high, low,
//! close, volume` in any order. A header that is not there becomes an absent
//! column on the frame, and an empty cell becomes a missing value. One file per
//! symbol, named `<SYMBOL>.csv`, when used as a [`DataPort`].

use crate::domain::error::CipherquantError;
use crate::domain::ohlcv::{Column, RawFrame};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

const DATE_HEADERS: [&str; 3] = ["date", "price_date", "timestamp"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol.to_uppercase()))
    }
}

fn read_err(path: &Path, reason: impl std::fmt::Display) -> CipherquantError {
    CipherquantError::InvalidInput {
        reason: format!("{}: {}", path.display(), reason),
    }
}

/// Leading `YYYY-MM-DD`; a trailing time component is ignored.
fn parse_date(field: &str) -> Option<NaiveDate> {
    let field = field.trim();
    let day = field.get(..10).unwrap_or(field);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_cell(field: &str) -> Result<Option<f64>, std::num::ParseFloatError> {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("nan") || field.eq_ignore_ascii_case("null")
    {
        return Ok(None);
    }
    field.parse().map(Some)
}

/// Read a whole CSV file into a frame for `symbol`, in file order.
pub fn read_frame<P: AsRef<Path>>(path: P, symbol: &str) -> Result<RawFrame, CipherquantError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| read_err(path, e))?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = rdr.headers().map_err(|e| read_err(path, e))?.clone();
    let date_index = headers
        .iter()
        .position(|h| DATE_HEADERS.contains(&h.to_lowercase().as_str()))
        .ok_or_else(|| read_err(path, "no date column"))?;

    let mut positions: Vec<(Column, usize)> = Vec::new();
    for (index, header) in headers.iter().enumerate() {
        if let Some(column) = Column::from_header(header) {
            if !positions.iter().any(|(c, _)| *c == column) {
                positions.push((column, index));
            }
        }
    }

    let mut frame = RawFrame::empty(symbol);
    for column in Column::ALL {
        if !positions.iter().any(|(c, _)| *c == column) {
            frame = frame.without_column(column);
        }
    }

    for (line, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| read_err(path, e))?;
        let raw_date = record.get(date_index).unwrap_or_default();
        let date = parse_date(raw_date).ok_or_else(|| {
            read_err(path, format!("row {}: invalid date '{}'", line + 1, raw_date))
        })?;

        let mut cells = [None; 5];
        for &(column, index) in &positions {
            let field = record.get(index).unwrap_or_default();
            cells[column as usize] = parse_cell(field).map_err(|e| {
                read_err(path, format!("row {}: invalid {} '{}': {}", line + 1, column, field, e))
            })?;
        }
        frame.push_row(date, |column| cells[column as usize]);
    }

    tracing::debug!(path = %path.display(), symbol, rows = frame.len(), "read csv prices");
    Ok(frame)
}

/// Copy the rows at `indices`, in that order, preserving column presence.
fn select_rows(frame: &RawFrame, indices: &[usize]) -> RawFrame {
    let mut out = RawFrame::empty(&frame.symbol);
    for column in frame.missing_columns() {
        out = out.without_column(column);
    }
    for &i in indices {
        out.push_row(frame.dates[i], |c| {
            frame.column(c).and_then(|v| v.get(i).copied().flatten())
        });
    }
    out
}

impl DataPort for CsvAdapter {
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<RawFrame, CipherquantError> {
        let frame = read_frame(self.csv_path(symbol), symbol)?;
        let mut rows: Vec<usize> = (0..frame.len())
            .filter(|&i| frame.dates[i] >= start_date && frame.dates[i] <= end_date)
            .collect();
        rows.sort_by_key(|&i| frame.dates[i]);
        Ok(select_rows(&frame, &rows))
    }

    fn list_symbols(&self) -> Result<Vec<String>, CipherquantError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| read_err(&self.base_path, e))?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| read_err(&self.base_path, e))?.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().to_uppercase());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CipherquantError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Ok(None);
        }
        let frame = read_frame(&path, symbol)?;
        let first = frame.dates.iter().min();
        let last = frame.dates.iter().max();
        Ok(first.zip(last).map(|(f, l)| (*f, *l, frame.len())))
    }
}
