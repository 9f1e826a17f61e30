//! Price provider port.

use crate::domain::error::CipherquantError;
use crate::domain::ohlcv::RawFrame;
use chrono::NaiveDate;

/// Read-only source of daily price rows.
///
/// Implementations return rows inside the closed range `[start_date, end_date]`
/// in ascending date order. Absent columns stay `None` on the frame so that the
/// core can report them; the core never retries a failed fetch.
pub trait DataPort {
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<RawFrame, CipherquantError>;

    fn list_symbols(&self) -> Result<Vec<String>, CipherquantError>;

    /// First date, last date and row count, or `None` when the symbol is unknown.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CipherquantError>;
}
