//! Domain error types.
//!
//! The evaluation errors (`MissingColumns`, `InsufficientData`, `DataIntegrity`,
//! `InvalidStrategy`) abort a whole backtest. Numeric degenerate cases such as a
//! zero average loss or an empty trade list are not errors; they resolve to fixed
//! fallback values inside the calculators.

use chrono::NaiveDate;

/// Top-level error type for cipherquant.
#[derive(Debug, thiserror::Error)]
pub enum CipherquantError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("missing columns for {symbol}: {}", .columns.join(", "))]
    MissingColumns {
        symbol: String,
        columns: Vec<String>,
    },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("data integrity error at bar {index} ({date}): {field} {reason}")]
    DataIntegrity {
        index: usize,
        date: NaiveDate,
        field: String,
        reason: String,
    },

    #[error("unsupported strategy: {name}")]
    InvalidStrategy { name: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CipherquantError {
    /// True for failures caused by the evaluated data rather than the environment.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            CipherquantError::MissingColumns { .. }
                | CipherquantError::InsufficientData { .. }
                | CipherquantError::DataIntegrity { .. }
        )
    }
}

impl From<&CipherquantError> for std::process::ExitCode {
    fn from(err: &CipherquantError) -> Self {
        let code: u8 = match err {
            CipherquantError::Io(_) => 1,
            CipherquantError::ConfigParse { .. }
            | CipherquantError::ConfigMissing { .. }
            | CipherquantError::ConfigInvalid { .. } => 2,
            CipherquantError::Database { .. } | CipherquantError::DatabaseQuery { .. } => 3,
            CipherquantError::InvalidStrategy { .. } | CipherquantError::InvalidInput { .. } => 4,
            CipherquantError::MissingColumns { .. } | CipherquantError::InsufficientData { .. } => {
                5
            }
            CipherquantError::DataIntegrity { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_lists_every_column() {
        let err = CipherquantError::MissingColumns {
            symbol: "AAPL".into(),
            columns: vec!["open".into(), "volume".into()],
        };
        assert_eq!(err.to_string(), "missing columns for AAPL: open, volume");
    }

    #[test]
    fn insufficient_data_message() {
        let err = CipherquantError::InsufficientData {
            symbol: "MSFT".into(),
            bars: 49,
            minimum: 50,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for MSFT: have 49 bars, need 50"
        );
    }

    #[test]
    fn data_errors_are_classified() {
        let integrity = CipherquantError::DataIntegrity {
            index: 3,
            date: NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
            field: "close".into(),
            reason: "is NaN".into(),
        };
        assert!(integrity.is_data_error());
        assert!(
            !CipherquantError::InvalidStrategy {
                name: "SMA".into()
            }
            .is_data_error()
        );
    }
}
