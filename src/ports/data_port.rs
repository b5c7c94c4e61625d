//! Market data access port.
//!
//! Adapters implement the two `fetch_*` primitives. The provided methods wrap
//! them into the gateway contract: every upstream failure is absorbed into a
//! `BarSeries::errors` list and never propagates as an error.

use crate::domain::bar::{Bar, BarSeries, Interval};
use crate::domain::earnings::EarningsEvent;
use crate::domain::error::SveaError;
use crate::domain::quality::{self, STALENESS_THRESHOLD_SECS};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct PriceQuote {
    pub price: Option<f64>,
    pub data_age_seconds: Option<i64>,
    pub errors: Vec<String>,
}

pub trait MarketDataPort: Send + Sync {
    /// Bars for `ticker` with dates in `[start, end]`, sorted by timestamp.
    fn fetch_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<Bar>, SveaError>;

    /// Every earnings report the provider knows for `ticker`.
    fn fetch_earnings(&self, ticker: &str) -> Result<Vec<EarningsEvent>, SveaError>;

    /// Whether the backend can be reached at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Local exchange wall-clock time, used for data-age estimates.
    fn clock_now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    fn get_historical(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> BarSeries {
        match self.fetch_bars(ticker, start, end, interval) {
            Ok(bars) if bars.is_empty() => {
                warn!(ticker, %interval, "empty data returned");
                BarSeries {
                    errors: vec![format!("no data returned for {}", ticker)],
                    ..Default::default()
                }
            }
            Ok(bars) => {
                let mut errors = quality::validate_ohlcv(&bars);
                errors.extend(quality::detect_gaps(&bars, interval));
                let quality_score = quality::quality_score(&bars, None);
                debug!(ticker, rows = bars.len(), quality_score, "fetched historical bars");
                BarSeries {
                    bars,
                    quality_score,
                    data_age_seconds: None,
                    errors,
                }
            }
            Err(e) => {
                warn!(ticker, error = %e, "historical fetch failed");
                BarSeries {
                    errors: vec![e.to_string()],
                    ..Default::default()
                }
            }
        }
    }

    /// Intraday bars for one session. The data age is only estimated for the
    /// current session; past sessions report `None`.
    fn get_intraday(&self, ticker: &str, date: NaiveDate, interval: Interval) -> BarSeries {
        let mut series = self.get_historical(ticker, date, date, interval);
        if let Some(last) = series.bars.last() {
            let now = self.clock_now();
            if now.date() == date {
                let age = (now - last.timestamp).num_seconds().max(0);
                series.data_age_seconds = Some(age);
                if age > STALENESS_THRESHOLD_SECS {
                    warn!(ticker, age, "intraday data is stale");
                    series.errors.push(format!("data is {}s old (stale)", age));
                }
                series.quality_score = quality::quality_score(&series.bars, Some(age));
            }
        }
        series
    }

    /// Latest traded price: the last intraday close today, else the last
    /// daily close of the past week.
    fn get_current_price(&self, ticker: &str, interval: Interval) -> PriceQuote {
        let today = self.clock_now().date();
        let intraday = self.get_intraday(ticker, today, interval);
        if let Some(last) = intraday.bars.last() {
            return PriceQuote {
                price: Some(last.close),
                data_age_seconds: intraday.data_age_seconds,
                errors: intraday.errors,
            };
        }

        let daily = self.get_historical(
            ticker,
            today - chrono::Duration::days(7),
            today,
            Interval::Day,
        );
        match daily.bars.last() {
            Some(last) => PriceQuote {
                price: Some(last.close),
                data_age_seconds: None,
                errors: daily.errors,
            },
            None => {
                let mut errors = daily.errors;
                errors.push(format!("could not fetch price for {}", ticker));
                PriceQuote {
                    price: None,
                    data_age_seconds: None,
                    errors,
                }
            }
        }
    }
}
