use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seconds since Unix epoch.
pub type Timestamp = i64;

pub const MINUTE_SECS: i64 = 60;
pub const HOUR_SECS: i64 = 60 * MINUTE_SECS;
pub const DAY_SECS: i64 = 24 * HOUR_SECS;

/// Chart timeframes supported by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    Minutes1,
    Minutes5,
    Minutes15,
    Minutes30,
    Hours1,
    Hours4,
    Days1,
    Weeks1,
    Months1,
}

/// Which histo endpoint a timeframe maps to on the market-data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoEndpoint {
    Minute,
    Hour,
    Day,
}

impl HistoEndpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoEndpoint::Minute => "histominute",
            HistoEndpoint::Hour => "histohour",
            HistoEndpoint::Day => "histoday",
        }
    }
}

/// How to ask the market-data API for one screenful of history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    pub endpoint: HistoEndpoint,
    pub limit: u32,
    pub aggregate: u32,
}

impl TimeFrame {
    /// Bucket duration in seconds (weeks/months approximated: 7/30 days).
    pub fn duration_secs(&self) -> i64 {
        match *self {
            TimeFrame::Minutes1 => MINUTE_SECS,
            TimeFrame::Minutes5 => 5 * MINUTE_SECS,
            TimeFrame::Minutes15 => 15 * MINUTE_SECS,
            TimeFrame::Minutes30 => 30 * MINUTE_SECS,
            TimeFrame::Hours1 => HOUR_SECS,
            TimeFrame::Hours4 => 4 * HOUR_SECS,
            TimeFrame::Days1 => DAY_SECS,
            TimeFrame::Weeks1 => 7 * DAY_SECS,
            TimeFrame::Months1 => 30 * DAY_SECS,
        }
    }

    /// Human-readable name (used in URLs/UI).
    pub fn name(&self) -> &'static str {
        match *self {
            TimeFrame::Minutes1 => "1m",
            TimeFrame::Minutes5 => "5m",
            TimeFrame::Minutes15 => "15m",
            TimeFrame::Minutes30 => "30m",
            TimeFrame::Hours1 => "1h",
            TimeFrame::Hours4 => "4h",
            TimeFrame::Days1 => "1d",
            TimeFrame::Weeks1 => "1w",
            TimeFrame::Months1 => "1M",
        }
    }

    pub fn is_minute_frame(&self) -> bool {
        matches!(
            self,
            TimeFrame::Minutes1 | TimeFrame::Minutes5 | TimeFrame::Minutes15 | TimeFrame::Minutes30
        )
    }

    pub fn is_hour_frame(&self) -> bool {
        matches!(self, TimeFrame::Hours1 | TimeFrame::Hours4)
    }

    /// Endpoint, row limit and aggregation factor for a history fetch.
    /// 1M has no dedicated histo mapping and falls back to the hourly
    /// default window.
    pub fn fetch_plan(&self) -> FetchPlan {
        let (endpoint, limit, aggregate) = match *self {
            TimeFrame::Minutes1 => (HistoEndpoint::Minute, 1440, 1),
            TimeFrame::Minutes5 => (HistoEndpoint::Minute, 288, 5),
            TimeFrame::Minutes15 => (HistoEndpoint::Minute, 96, 15),
            TimeFrame::Minutes30 => (HistoEndpoint::Minute, 48, 30),
            TimeFrame::Hours1 => (HistoEndpoint::Hour, 720, 1),
            TimeFrame::Hours4 => (HistoEndpoint::Hour, 180, 4),
            TimeFrame::Days1 => (HistoEndpoint::Day, 365, 1),
            TimeFrame::Weeks1 => (HistoEndpoint::Day, 364, 7),
            TimeFrame::Months1 => (HistoEndpoint::Hour, 720, 1),
        };
        FetchPlan {
            endpoint,
            limit,
            aggregate,
        }
    }

    /// Refresh cadence for live polling, in seconds.
    pub fn poll_interval_secs(&self) -> u64 {
        match *self {
            TimeFrame::Minutes1 => 30,
            TimeFrame::Minutes5 | TimeFrame::Minutes15 | TimeFrame::Minutes30 => 45,
            _ => 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimeFrameError;

impl fmt::Display for ParseTimeFrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown timeframe")
    }
}

impl std::error::Error for ParseTimeFrameError {}

impl FromStr for TimeFrame {
    type Err = ParseTimeFrameError;

    /// Parse e.g. "1m", "5m", "1h", "4h", "1d", "1w", "1M".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(TimeFrame::Minutes1),
            "5m" => Ok(TimeFrame::Minutes5),
            "15m" => Ok(TimeFrame::Minutes15),
            "30m" => Ok(TimeFrame::Minutes30),
            "1h" => Ok(TimeFrame::Hours1),
            "4h" => Ok(TimeFrame::Hours4),
            "1d" => Ok(TimeFrame::Days1),
            "1w" => Ok(TimeFrame::Weeks1),
            "1M" => Ok(TimeFrame::Months1),
            _ => Err(ParseTimeFrameError),
        }
    }
}

/// One OHLCV bar. Bars arrive time-ascending and are replaced wholesale on
/// symbol/timeframe change; nothing mutates them in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Aggregate figures for the loaded series, shown in the header strip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: f64,
}

impl MarketSummary {
    /// Summarize a full series: first open, extremes, last close, change vs
    /// first open and total volume. An empty series yields the zero summary.
    pub fn from_bars(bars: &[Bar]) -> Self {
        let (first, last) = match (bars.first(), bars.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return Self::default(),
        };

        let mut high = first.high;
        let mut low = first.low;
        let mut volume = 0.0;
        for bar in bars {
            high = high.max(bar.high);
            low = low.min(bar.low);
            volume += bar.volume;
        }

        let change = last.close - first.open;
        let change_percent = if first.open == 0.0 {
            0.0
        } else {
            change / first.open * 100.0
        };

        Self {
            open: first.open,
            high,
            low,
            close: last.close,
            change,
            change_percent,
            volume,
        }
    }
}

/// Simple moving average of closes over the trailing `period` bars.
/// Returns `None` until the series is at least `period` long.
pub fn latest_sma(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let sum: f64 = bars[bars.len() - period..].iter().map(|b| b.close).sum();
    Some(sum / period as f64)
}

/// Axis-label formatting: HH:MM on minute frames, M/D HH:MM on hour frames,
/// M/D otherwise.
pub fn format_bar_time(ts: Timestamp, timeframe: TimeFrame) -> String {
    let dt: DateTime<Utc> = match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt,
        None => return String::new(),
    };
    if timeframe.is_minute_frame() {
        format!("{:02}:{:02}", dt.hour(), dt.minute())
    } else if timeframe.is_hour_frame() {
        format!(
            "{}/{} {:02}:{:02}",
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute()
        )
    } else {
        format!("{}/{}", dt.month(), dt.day())
    }
}
