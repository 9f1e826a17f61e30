//! Result persistence port.

use crate::domain::error::CipherquantError;
use crate::domain::metrics::PerformanceMetrics;
use crate::domain::position::TradeRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One finished evaluation as handed to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub symbol: String,
    pub strategy: String,
    pub total_return: f64,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<TradeRecord>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeQuery {
    pub symbol: Option<String>,
    pub strategy: Option<String>,
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
}

impl Default for TradeQuery {
    fn default() -> Self {
        Self {
            symbol: None,
            strategy: None,
            page: 1,
            per_page: 50,
        }
    }
}

impl TradeQuery {
    /// Rows skipped before this page, or `None` when it overflows.
    pub fn offset(&self) -> Option<usize> {
        self.page.saturating_sub(1).checked_mul(self.per_page)
    }

    /// `(LIMIT, OFFSET)` as SQL integers.
    pub fn sql_window(&self) -> Result<(i64, i64), CipherquantError> {
        let out_of_range = || CipherquantError::InvalidInput {
            reason: format!(
                "page {} with {} rows per page is out of range",
                self.page, self.per_page
            ),
        };
        let limit = i64::try_from(self.per_page).map_err(|_| out_of_range())?;
        let offset = self
            .offset()
            .and_then(|o| i64::try_from(o).ok())
            .ok_or_else(out_of_range)?;
        Ok((limit, offset))
    }
}

/// A stored trade joined with the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRow {
    pub run_id: i64,
    pub symbol: String,
    pub strategy: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub trade: TradeRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradePage {
    pub trades: Vec<TradeRow>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

pub trait ResultPort {
    /// Store a run and its trades; returns the new run id.
    fn record_run(&self, run: &RunRecord) -> Result<i64, CipherquantError>;

    /// Trades ordered newest run first, then by entry date.
    fn list_trades(&self, query: &TradeQuery) -> Result<TradePage, CipherquantError>;

    fn latest_metrics(
        &self,
        symbol: &str,
        strategy: &str,
    ) -> Result<Option<PerformanceMetrics>, CipherquantError>;
}
