//! SQLite storage adapter.
//!
//! One database holds the imported `prices` and the recorded `runs` with their
//! `trades`. Price cells are nullable; normalization happens in the core.

use crate::domain::error::CipherquantError;
use crate::domain::metrics::PerformanceMetrics;
use crate::domain::ohlcv::{OhlcvBar, RawFrame};
use crate::domain::position::{ExitReason, TradeRecord};
use crate::domain::signal::Signal;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::result_port::{ResultPort, RunRecord, TradePage, TradeQuery, TradeRow};
use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, OptionalExtension};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS prices (
    symbol TEXT NOT NULL,
    price_date TEXT NOT NULL,
    open REAL,
    high REAL,
    low REAL,
    close REAL,
    volume REAL,
    PRIMARY KEY (symbol, price_date)
);
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    strategy TEXT NOT NULL,
    total_return REAL NOT NULL,
    metrics TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS trades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    entry_date TEXT NOT NULL,
    exit_date TEXT NOT NULL,
    entry_price REAL NOT NULL,
    exit_price REAL NOT NULL,
    direction INTEGER NOT NULL,
    return_pct REAL NOT NULL,
    exit_reason TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_runs_symbol_strategy ON runs(symbol, strategy);
CREATE INDEX IF NOT EXISTS idx_trades_run ON trades(run_id);";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> CipherquantError {
    CipherquantError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> CipherquantError {
    CipherquantError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_err(index: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
}

fn date_column(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(index)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| conversion_err(index, e))
}

fn timestamp_column(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(index, e))
}

impl SqliteAdapter {
    /// Open `[database] path` and make sure the schema exists.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CipherquantError> {
        let db_path = config
            .get_string("database", "path")
            .ok_or_else(|| CipherquantError::ConfigMissing {
                section: "database".into(),
                key: "path".into(),
            })?;
        let pool_size = config.get_int("database", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        tracing::info!(path = %db_path, pool_size, "opened sqlite database");
        Ok(adapter)
    }

    /// A private database with the schema already created.
    pub fn in_memory() -> Result<Self, CipherquantError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, CipherquantError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), CipherquantError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }

    /// Insert rows, leaving any existing `(symbol, date)` untouched.
    /// Returns the number of rows actually inserted.
    pub fn insert_bars(&self, bars: &[OhlcvBar]) -> Result<usize, CipherquantError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO prices
                     (symbol, price_date, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(query_err)?;
            for bar in bars {
                inserted += stmt
                    .execute(params![
                        bar.symbol,
                        bar.date.format(DATE_FORMAT).to_string(),
                        bar.open,
                        bar.high,
                        bar.low,
                        bar.close,
                        bar.volume
                    ])
                    .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        tracing::debug!(rows = bars.len(), inserted, "inserted price rows");
        Ok(inserted)
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<RawFrame, CipherquantError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT price_date, open, high, low, close, volume
                 FROM prices
                 WHERE symbol = ?1 AND price_date >= ?2 AND price_date <= ?3
                 ORDER BY price_date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    start_date.format(DATE_FORMAT).to_string(),
                    end_date.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    Ok(OhlcvBar {
                        symbol: symbol.to_string(),
                        date: date_column(row, 0)?,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        volume: row.get(5)?,
                    })
                },
            )
            .map_err(query_err)?;

        let bars = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_err)?;
        Ok(RawFrame::from_bars(symbol, &bars))
    }

    fn list_symbols(&self) -> Result<Vec<String>, CipherquantError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM prices ORDER BY symbol")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        let symbols = rows
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(query_err)?;
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CipherquantError> {
        let conn = self.conn()?;
        let (first, last, count): (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(price_date), MAX(price_date), COUNT(*) FROM prices WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match (first, last) {
            (Some(first), Some(last)) if count > 0 => {
                let parse = |s: &str| {
                    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| {
                        CipherquantError::Database {
                            reason: e.to_string(),
                        }
                    })
                };
                Ok(Some((parse(&first)?, parse(&last)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

impl ResultPort for SqliteAdapter {
    fn record_run(&self, run: &RunRecord) -> Result<i64, CipherquantError> {
        let metrics = serde_json::to_string(&run.metrics).map_err(|e| {
            CipherquantError::DatabaseQuery {
                reason: format!("cannot encode metrics: {e}"),
            }
        })?;

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute(
            "INSERT INTO runs (symbol, strategy, total_return, metrics, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run.symbol,
                run.strategy,
                run.total_return,
                metrics,
                run.created_at.to_rfc3339()
            ],
        )
        .map_err(query_err)?;
        let run_id = tx.last_insert_rowid();

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO trades
                     (run_id, entry_date, exit_date, entry_price, exit_price,
                      direction, return_pct, exit_reason)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(query_err)?;
            for trade in &run.trades {
                stmt.execute(params![
                    run_id,
                    trade.entry_date.format(DATE_FORMAT).to_string(),
                    trade.exit_date.format(DATE_FORMAT).to_string(),
                    trade.entry_price,
                    trade.exit_price,
                    trade.direction.value(),
                    trade.return_pct,
                    trade.exit_reason.as_str()
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;

        tracing::debug!(
            run_id,
            symbol = %run.symbol,
            strategy = %run.strategy,
            trades = run.trades.len(),
            "recorded run"
        );
        Ok(run_id)
    }

    fn list_trades(&self, query: &TradeQuery) -> Result<TradePage, CipherquantError> {
        let mut clauses = Vec::new();
        let mut args: Vec<Value> = Vec::new();
        if let Some(symbol) = &query.symbol {
            clauses.push("r.symbol = ?");
            args.push(Value::Text(symbol.clone()));
        }
        if let Some(strategy) = &query.strategy {
            clauses.push("r.strategy = ?");
            args.push(Value::Text(strategy.clone()));
        }
        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let conn = self.conn()?;
        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM trades t JOIN runs r ON r.id = t.run_id {filter}"),
                params_from_iter(args.iter()),
                |row| row.get(0),
            )
            .map_err(query_err)?;

        let (limit, offset) = query.sql_window()?;
        args.push(Value::Integer(limit));
        args.push(Value::Integer(offset));
        let sql = format!(
            "SELECT r.id, r.symbol, r.strategy, r.created_at,
                    t.entry_date, t.exit_date, t.entry_price, t.exit_price,
                    t.direction, t.return_pct, t.exit_reason
             FROM trades t JOIN runs r ON r.id = t.run_id
             {filter}
             ORDER BY r.id DESC, t.entry_date ASC, t.id ASC
             LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                let direction: i64 = row.get(8)?;
                let direction = i8::try_from(direction)
                    .ok()
                    .and_then(Signal::from_value)
                    .ok_or(rusqlite::Error::IntegralValueOutOfRange(8, direction))?;
                let reason: String = row.get(10)?;
                let exit_reason = ExitReason::parse(&reason).ok_or_else(|| {
                    conversion_err(
                        10,
                        CipherquantError::InvalidInput {
                            reason: format!("unknown exit reason '{reason}'"),
                        },
                    )
                })?;
                Ok(TradeRow {
                    run_id: row.get(0)?,
                    symbol: row.get(1)?,
                    strategy: row.get(2)?,
                    created_at: timestamp_column(row, 3)?,
                    trade: TradeRecord {
                        entry_date: date_column(row, 4)?,
                        exit_date: date_column(row, 5)?,
                        entry_price: row.get(6)?,
                        exit_price: row.get(7)?,
                        direction,
                        return_pct: row.get(9)?,
                        exit_reason,
                    },
                })
            })
            .map_err(query_err)?;
        let trades = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_err)?;

        Ok(TradePage {
            trades,
            total: total as usize,
            page: query.page,
            per_page: query.per_page,
        })
    }

    fn latest_metrics(
        &self,
        symbol: &str,
        strategy: &str,
    ) -> Result<Option<PerformanceMetrics>, CipherquantError> {
        let conn = self.conn()?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT metrics FROM runs WHERE symbol = ?1 AND strategy = ?2
                 ORDER BY id DESC LIMIT 1",
                params![symbol, strategy],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?;

        stored
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| CipherquantError::DatabaseQuery {
                    reason: format!("cannot decode metrics: {e}"),
                })
            })
            .transpose()
    }
}
