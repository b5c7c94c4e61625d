//! SQLite data adapter.

use crate::domain::bar::{Bar, Interval};
use crate::domain::earnings::EarningsEvent;
use crate::domain::error::SveaError;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::{debug, info};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn pool_err(e: r2d2::Error) -> SveaError {
    SveaError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> SveaError {
    SveaError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_err(raw: &str, e: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(raw.len(), rusqlite::types::Type::Text, Box::new(e))
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SveaError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| SveaError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        info!(path = %db_path, pool_size, "opened sqlite database");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, SveaError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SveaError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), SveaError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS bars (
                    ticker TEXT NOT NULL,
                    interval TEXT NOT NULL,
                    ts TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume REAL NOT NULL,
                    PRIMARY KEY (ticker, interval, ts)
                );
                CREATE TABLE IF NOT EXISTS earnings (
                    ticker TEXT NOT NULL,
                    date TEXT NOT NULL,
                    eps_estimate REAL,
                    reported_eps REAL,
                    surprise_pct REAL,
                    PRIMARY KEY (ticker, date)
                );
                CREATE INDEX IF NOT EXISTS idx_bars_ts ON bars(ts);",
            )
            .map_err(query_err)
    }

    pub fn insert_bars(&self, ticker: &str, interval: Interval, bars: &[Bar]) -> Result<(), SveaError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let interval = interval.to_string();

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO bars (ticker, interval, ts, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    ticker,
                    interval,
                    bar.timestamp.format(TS_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        debug!(ticker, %interval, rows = bars.len(), "stored bars");
        Ok(())
    }

    pub fn insert_earnings(&self, events: &[EarningsEvent]) -> Result<(), SveaError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for event in events {
            tx.execute(
                "INSERT OR REPLACE INTO earnings (ticker, date, eps_estimate, reported_eps, surprise_pct)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    event.ticker,
                    event.date.format("%Y-%m-%d").to_string(),
                    event.eps_estimate,
                    event.reported_eps,
                    event.surprise_pct
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }
}

impl MarketDataPort for SqliteAdapter {
    fn fetch_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<Bar>, SveaError> {
        let conn = self.conn()?;

        let query = "SELECT ts, open, high, low, close, volume
                     FROM bars
                     WHERE ticker = ?1 AND interval = ?2 AND ts >= ?3 AND ts <= ?4
                     ORDER BY ts ASC";
        let mut stmt = conn.prepare(query).map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    ticker,
                    interval.to_string(),
                    format!("{} 00:00:00", start.format("%Y-%m-%d")),
                    format!("{} 23:59:59", end.format("%Y-%m-%d")),
                ],
                |row| {
                    let ts: String = row.get(0)?;
                    let timestamp = NaiveDateTime::parse_from_str(&ts, TS_FORMAT)
                        .map_err(|e| conversion_err(&ts, e))?;
                    Ok(Bar {
                        timestamp,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        volume: row.get(5)?,
                    })
                },
            )
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn fetch_earnings(&self, ticker: &str) -> Result<Vec<EarningsEvent>, SveaError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT date, eps_estimate, reported_eps, surprise_pct
                 FROM earnings WHERE ticker = ?1 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![ticker], |row| {
                let raw: String = row.get(0)?;
                let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|e| conversion_err(&raw, e))?;
                Ok(EarningsEvent::new(
                    ticker,
                    date,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                ))
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn is_available(&self) -> bool {
        self.pool.get().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn hourly(day: u32, hour: u32, close: f64) -> Bar {
        Bar {
            timestamp: d(day).and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap()),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    fn adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteAdapter::from_config(&EmptyConfig) {
            Err(SveaError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let adapter = adapter();
        adapter.initialize_schema().unwrap();
        assert!(adapter.is_available());
    }

    #[test]
    fn bars_round_trip_by_interval_and_date() {
        let adapter = adapter();
        adapter
            .insert_bars("ABB.ST", Interval::Hour, &[hourly(16, 10, 101.0), hourly(16, 9, 100.0), hourly(17, 9, 102.0)])
            .unwrap();
        adapter
            .insert_bars("ABB.ST", Interval::Day, &[Bar::daily(d(16), 1.0, 1.0, 1.0, 1.0, 1.0)])
            .unwrap();

        let session = adapter.fetch_bars("ABB.ST", d(16), d(16), Interval::Hour).unwrap();
        assert_eq!(session.len(), 2);
        assert_eq!(session[0].close, 100.0);
        assert_eq!(session[1].time(), NaiveTime::from_hms_opt(10, 0, 0).unwrap());

        let daily = adapter.fetch_bars("ABB.ST", d(1), d(31), Interval::Day).unwrap();
        assert_eq!(daily.len(), 1);
        assert!(adapter.fetch_bars("SAND.ST", d(1), d(31), Interval::Day).unwrap().is_empty());
    }

    #[test]
    fn earnings_keep_missing_values() {
        let adapter = adapter();
        adapter
            .insert_earnings(&[
                EarningsEvent::new("ABB.ST", d(18), None, None, None),
                EarningsEvent::new("ABB.ST", d(4), Some(1.0), Some(1.3), Some(30.0)),
            ])
            .unwrap();

        let events = adapter.fetch_earnings("ABB.ST").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].date, d(4));
        assert_eq!(events[0].reported_eps, Some(1.3));
        assert_eq!(events[1].eps_estimate, None);
        assert!(adapter.fetch_earnings("SAND.ST").unwrap().is_empty());
    }
}
