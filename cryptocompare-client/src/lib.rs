use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use series_core::{Bar, TimeFrame};
use thiserror::Error;
use tokio::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com";
const QUOTE_CURRENCY: &str = "USD";

#[derive(Debug, Clone)]
pub struct CryptoCompareConfig {
    pub base_url: String,
    pub max_requests_per_minute: u32,
}

impl CryptoCompareConfig {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_requests_per_minute: 30,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_limit(mut self, max_requests_per_minute: u32) -> Self {
        self.max_requests_per_minute = max_requests_per_minute.max(1);
        self
    }
}

impl Default for CryptoCompareConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate limited by local guard")]
    RateLimited,
    #[error("cryptocompare api error: {0}")]
    ApiError(String),
    #[error("parse error: {0}")]
    ParseError(String),
}

/// "BTC/USD" → "BTC": the histo API wants the base asset on its own.
pub fn base_symbol(symbol: &str) -> &str {
    symbol.split('/').next().unwrap_or(symbol)
}

/// Polling client for the histo{minute,hour,day} endpoints. Responses are
/// cached per (symbol, timeframe) for the timeframe's poll interval, so a
/// render-driven refetch loop stays cheap.
#[derive(Clone)]
pub struct CryptoCompareClient {
    config: CryptoCompareConfig,
    http: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    cache: Arc<Mutex<HistoryCache>>,
}

impl CryptoCompareClient {
    pub fn new(config: CryptoCompareConfig) -> Result<Self, MarketDataError> {
        let http = reqwest::Client::builder()
            .user_agent("chartlens-market-data/0.1")
            .build()?;
        Ok(Self {
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(config.max_requests_per_minute))),
            cache: Arc::new(Mutex::new(HistoryCache::new())),
            config,
            http,
        })
    }

    /// One screenful of history for `symbol` at `timeframe`, ascending.
    pub async fn fetch_history(
        &self,
        symbol: &str,
        timeframe: TimeFrame,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let cache_key = format!("{symbol}:{}", timeframe.name());
        let ttl = Duration::from_secs(timeframe.poll_interval_secs());
        if let Some(hit) = self.cache.lock().await.get(&cache_key, ttl) {
            return Ok(hit);
        }

        self.rate_limiter.lock().await.try_acquire()?;
        let plan = timeframe.fetch_plan();
        let url = format!(
            "{}/data/v2/{}",
            self.config.base_url.trim_end_matches('/'),
            plan.endpoint.as_str()
        );
        tracing::debug!(symbol, timeframe = timeframe.name(), %url, "fetching history");

        let limit = plan.limit.to_string();
        let aggregate = plan.aggregate.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("fsym", base_symbol(symbol)),
                ("tsym", QUOTE_CURRENCY),
                ("limit", limit.as_str()),
                ("aggregate", aggregate.as_str()),
            ])
            .send()
            .await?;
        let json: Value = resp.json().await?;

        let bars = parse_history(&json).map_err(|err| {
            if let MarketDataError::ApiError(message) = &err {
                tracing::warn!(symbol, %message, "cryptocompare rejected request");
            }
            err
        })?;
        self.cache.lock().await.insert(cache_key, bars.clone());
        Ok(bars)
    }
}

/// Decode a histo response body into ascending bars.
fn parse_history(json: &Value) -> Result<Vec<Bar>, MarketDataError> {
    if json.get("Response").and_then(Value::as_str) == Some("Error") {
        let message = json
            .get("Message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown API Error")
            .to_string();
        return Err(MarketDataError::ApiError(message));
    }

    let rows = json
        .pointer("/Data/Data")
        .and_then(Value::as_array)
        .ok_or_else(|| MarketDataError::ParseError("invalid data structure from API".to_string()))?;

    let mut bars = Vec::with_capacity(rows.len());
    for row in rows {
        bars.push(parse_row(row)?);
    }
    bars.sort_by_key(|b| b.time);
    Ok(bars)
}

fn parse_row(row: &Value) -> Result<Bar, MarketDataError> {
    let obj = row
        .as_object()
        .ok_or_else(|| MarketDataError::ParseError("history row not an object".to_string()))?;
    Ok(Bar {
        time: obj
            .get("time")
            .and_then(Value::as_i64)
            .ok_or_else(|| MarketDataError::ParseError("missing time field".to_string()))?,
        open: parse_number(obj, "open")?,
        high: parse_number(obj, "high")?,
        low: parse_number(obj, "low")?,
        close: parse_number(obj, "close")?,
        volume: parse_number(obj, "volumefrom")?,
    })
}

fn parse_number(obj: &Map<String, Value>, key: &str) -> Result<f64, MarketDataError> {
    obj.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| MarketDataError::ParseError(format!("missing numeric field {key}")))
}

struct RateLimiter {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl RateLimiter {
    fn new(max_per_minute: u32) -> Self {
        let capacity = max_per_minute as f64;
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    fn try_acquire(&mut self) -> Result<(), MarketDataError> {
        self.refill();
        if self.tokens < 1.0 {
            return Err(MarketDataError::RateLimited);
        }
        self.tokens -= 1.0;
        Ok(())
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = Instant::now();
    }
}

#[derive(Default)]
struct HistoryCache {
    series: HashMap<String, CachedSeries>,
}

struct CachedSeries {
    stored_at: Instant,
    bars: Vec<Bar>,
}

impl HistoryCache {
    fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str, ttl: Duration) -> Option<Vec<Bar>> {
        let hit = self.series.get(key)?;
        if hit.stored_at.elapsed() <= ttl {
            Some(hit.bars.clone())
        } else {
            None
        }
    }

    fn insert(&mut self, key: String, bars: Vec<Bar>) {
        self.series.insert(
            key,
            CachedSeries {
                stored_at: Instant::now(),
                bars,
            },
        );
    }
}
