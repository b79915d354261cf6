use serde::{Deserialize, Serialize};
use series_core::{Bar, Timestamp};
use std::{collections::VecDeque, fmt, str::FromStr};

/// Which bar field feeds an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceField {
    Open,
    High,
    Low,
    Close,
    Hlc3,
    Ohlc4,
}

impl SourceField {
    pub fn value(&self, bar: &Bar) -> f64 {
        match self {
            SourceField::Open => bar.open,
            SourceField::High => bar.high,
            SourceField::Low => bar.low,
            SourceField::Close => bar.close,
            SourceField::Hlc3 => (bar.high + bar.low + bar.close) / 3.0,
            SourceField::Ohlc4 => (bar.open + bar.high + bar.low + bar.close) / 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSourceFieldError;

impl fmt::Display for ParseSourceFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown source field")
    }
}

impl std::error::Error for ParseSourceFieldError {}

impl FromStr for SourceField {
    type Err = ParseSourceFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(SourceField::Open),
            "high" => Ok(SourceField::High),
            "low" => Ok(SourceField::Low),
            "close" => Ok(SourceField::Close),
            "hlc3" => Ok(SourceField::Hlc3),
            "ohlc4" => Ok(SourceField::Ohlc4),
            _ => Err(ParseSourceFieldError),
        }
    }
}

/// Indicators the dashboard can toggle.
///
/// Outputs:
/// - Sma: single line (overlay)
/// - Rsi: single line (separate pane)
/// - Macd: macd, signal, histogram (separate pane)
/// - Bbands: middle/upper/lower (overlay)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Sma,
    Rsi,
    Macd,
    Bbands,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIndicatorKindError;

impl fmt::Display for ParseIndicatorKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown indicator kind")
    }
}

impl std::error::Error for ParseIndicatorKindError {}

impl FromStr for IndicatorKind {
    type Err = ParseIndicatorKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sma" | "ma" => Ok(IndicatorKind::Sma),
            "rsi" => Ok(IndicatorKind::Rsi),
            "macd" => Ok(IndicatorKind::Macd),
            "bbands" | "bollinger" | "bollinger_bands" => Ok(IndicatorKind::Bbands),
            _ => Err(ParseIndicatorKindError),
        }
    }
}

impl IndicatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            IndicatorKind::Sma => "sma",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Macd => "macd",
            IndicatorKind::Bbands => "bbands",
        }
    }

    pub fn output_dimension(&self) -> usize {
        match self {
            IndicatorKind::Sma | IndicatorKind::Rsi => 1,
            IndicatorKind::Macd | IndicatorKind::Bbands => 3,
        }
    }

    pub fn default_params(&self) -> IndicatorParams {
        match self {
            IndicatorKind::Sma => IndicatorParams::Sma {
                period: 14,
                source: SourceField::Close,
            },
            IndicatorKind::Rsi => IndicatorParams::Rsi {
                period: 14,
                source: SourceField::Close,
            },
            IndicatorKind::Macd => IndicatorParams::Macd {
                fast: 12,
                slow: 26,
                signal: 9,
                source: SourceField::Close,
            },
            IndicatorKind::Bbands => IndicatorParams::Bbands {
                period: 20,
                stddev: 2.0,
                source: SourceField::Close,
            },
        }
    }
}

/// Where to draw an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Overlay,
    SeparatePane,
}

/// Parameters for the supported indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndicatorParams {
    /// Simple moving average of a bar source over `period`.
    Sma { period: usize, source: SourceField },
    /// Relative Strength Index (Wilder smoothing) of `period`.
    Rsi { period: usize, source: SourceField },
    /// MACD: fast/slow EMAs and a signal EMA over the difference.
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
        source: SourceField,
    },
    /// Bollinger Bands: middle SMA, bands at `stddev` population deviations.
    Bbands {
        period: usize,
        stddev: f64,
        source: SourceField,
    },
}

impl IndicatorParams {
    pub fn kind(&self) -> IndicatorKind {
        match self {
            IndicatorParams::Sma { .. } => IndicatorKind::Sma,
            IndicatorParams::Rsi { .. } => IndicatorKind::Rsi,
            IndicatorParams::Macd { .. } => IndicatorKind::Macd,
            IndicatorParams::Bbands { .. } => IndicatorKind::Bbands,
        }
    }
}

/// Stroke settings for one output line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotStyle {
    pub color: String,
    pub width: f64,
}

/// Config for an indicator instance (no runtime state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub kind: IndicatorKind,
    pub params: IndicatorParams,
    pub output: OutputKind,
    pub line_styles: Vec<PlotStyle>,
}

impl IndicatorConfig {
    pub fn with_defaults(kind: IndicatorKind) -> Self {
        let output = match kind {
            IndicatorKind::Sma | IndicatorKind::Bbands => OutputKind::Overlay,
            IndicatorKind::Rsi | IndicatorKind::Macd => OutputKind::SeparatePane,
        };
        Self {
            kind,
            params: kind.default_params(),
            output,
            line_styles: default_line_styles(kind),
        }
    }
}

fn default_line_styles(kind: IndicatorKind) -> Vec<PlotStyle> {
    let mk = |color: &str, width: f64| PlotStyle {
        color: color.to_string(),
        width,
    };
    match kind {
        IndicatorKind::Sma => vec![mk("#9C27B0", 1.5)],
        IndicatorKind::Rsi => vec![mk("#FFD54F", 1.5)],
        IndicatorKind::Macd => vec![mk("#2196F3", 1.5), mk("#FF5252", 1.5), mk("#4CAF50", 1.0)],
        IndicatorKind::Bbands => vec![mk("#4CAF50", 1.5), mk("#4CAF50", 1.0), mk("#4CAF50", 1.0)],
    }
}

/// Single indicator sample for arbitrary-dimension output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSample {
    pub time: Timestamp,
    pub values: Vec<f64>,
}

/// Indicator computation engine – stateful, incremental.
pub trait IndicatorEngine {
    fn kind(&self) -> IndicatorKind;
    fn output_dimension(&self) -> usize;
    fn reset(&mut self);

    fn apply_history(&mut self, bars: &[Bar]) -> Vec<IndicatorSample> {
        self.reset();
        let mut out = Vec::new();
        for bar in bars {
            if let Some(sample) = self.apply_incremental(bar) {
                out.push(sample);
            }
        }
        out
    }

    fn apply_incremental(&mut self, bar: &Bar) -> Option<IndicatorSample>;
}

/// Build the engine matching a parameter set.
pub fn engine_for(params: &IndicatorParams) -> Box<dyn IndicatorEngine> {
    match *params {
        IndicatorParams::Sma { period, source } => Box::new(SmaEngine::new(period, source)),
        IndicatorParams::Rsi { period, source } => Box::new(RsiEngine::new(period, source)),
        IndicatorParams::Macd {
            fast,
            slow,
            signal,
            source,
        } => Box::new(MacdEngine::new(fast, slow, signal, source)),
        IndicatorParams::Bbands {
            period,
            stddev,
            source,
        } => Box::new(BbandsEngine::new(period, stddev, source)),
    }
}

// ---------- EMA smoothing helper --------------------------------------------

/// EMA seeded by the SMA of the first `period` inputs, Wilder-free variant
/// (alpha = 2 / (period + 1)).
struct EmaState {
    period: usize,
    alpha: f64,
    seed_sum: f64,
    count: usize,
    ema: Option<f64>,
}

impl EmaState {
    fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            alpha: 2.0 / (period.max(1) as f64 + 1.0),
            seed_sum: 0.0,
            count: 0,
            ema: None,
        }
    }

    fn reset(&mut self) {
        self.seed_sum = 0.0;
        self.count = 0;
        self.ema = None;
    }

    fn next(&mut self, value: f64) -> Option<f64> {
        match self.ema {
            Some(prev) => {
                let ema = self.alpha * value + (1.0 - self.alpha) * prev;
                self.ema = Some(ema);
                Some(ema)
            }
            None => {
                self.count += 1;
                self.seed_sum += value;
                if self.count < self.period {
                    return None;
                }
                let ema = self.seed_sum / self.period as f64;
                self.ema = Some(ema);
                Some(ema)
            }
        }
    }
}

// ---------- individual indicator engines ------------------------------------

struct SmaEngine {
    period: usize,
    source: SourceField,
    window: VecDeque<f64>,
    sum: f64,
}

impl SmaEngine {
    fn new(period: usize, source: SourceField) -> Self {
        Self {
            period: period.max(1),
            source,
            window: VecDeque::new(),
            sum: 0.0,
        }
    }
}

impl IndicatorEngine for SmaEngine {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Sma
    }

    fn output_dimension(&self) -> usize {
        1
    }

    fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
    }

    fn apply_incremental(&mut self, bar: &Bar) -> Option<IndicatorSample> {
        let value = self.source.value(bar);
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        if self.window.len() == self.period {
            Some(IndicatorSample {
                time: bar.time,
                values: vec![self.sum / self.period as f64],
            })
        } else {
            None
        }
    }
}

struct RsiEngine {
    period: usize,
    source: SourceField,
    prev_value: Option<f64>,
    gain_sum: f64,
    loss_sum: f64,
    count: usize,
    avg_gain: Option<f64>,
    avg_loss: Option<f64>,
}

impl RsiEngine {
    fn new(period: usize, source: SourceField) -> Self {
        Self {
            period: period.max(1),
            source,
            prev_value: None,
            gain_sum: 0.0,
            loss_sum: 0.0,
            count: 0,
            avg_gain: None,
            avg_loss: None,
        }
    }

    fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            return 100.0;
        }
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

impl IndicatorEngine for RsiEngine {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Rsi
    }

    fn output_dimension(&self) -> usize {
        1
    }

    fn reset(&mut self) {
        self.prev_value = None;
        self.gain_sum = 0.0;
        self.loss_sum = 0.0;
        self.count = 0;
        self.avg_gain = None;
        self.avg_loss = None;
    }

    fn apply_incremental(&mut self, bar: &Bar) -> Option<IndicatorSample> {
        let value = self.source.value(bar);
        let prev = match self.prev_value.replace(value) {
            Some(prev) => prev,
            None => return None,
        };
        let delta = value - prev;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        match (self.avg_gain, self.avg_loss) {
            (Some(avg_gain), Some(avg_loss)) => {
                // Wilder smoothing after the seed window.
                let p = self.period as f64;
                let avg_gain = (avg_gain * (p - 1.0) + gain) / p;
                let avg_loss = (avg_loss * (p - 1.0) + loss) / p;
                self.avg_gain = Some(avg_gain);
                self.avg_loss = Some(avg_loss);
                Some(IndicatorSample {
                    time: bar.time,
                    values: vec![Self::rsi_from(avg_gain, avg_loss)],
                })
            }
            _ => {
                self.gain_sum += gain;
                self.loss_sum += loss;
                self.count += 1;
                if self.count < self.period {
                    return None;
                }
                let avg_gain = self.gain_sum / self.period as f64;
                let avg_loss = self.loss_sum / self.period as f64;
                self.avg_gain = Some(avg_gain);
                self.avg_loss = Some(avg_loss);
                Some(IndicatorSample {
                    time: bar.time,
                    values: vec![Self::rsi_from(avg_gain, avg_loss)],
                })
            }
        }
    }
}

struct MacdEngine {
    source: SourceField,
    fast: EmaState,
    slow: EmaState,
    signal: EmaState,
}

impl MacdEngine {
    fn new(fast: usize, slow: usize, signal: usize, source: SourceField) -> Self {
        Self {
            source,
            fast: EmaState::new(fast),
            slow: EmaState::new(slow),
            signal: EmaState::new(signal),
        }
    }
}

impl IndicatorEngine for MacdEngine {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Macd
    }

    fn output_dimension(&self) -> usize {
        3
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
    }

    fn apply_incremental(&mut self, bar: &Bar) -> Option<IndicatorSample> {
        let value = self.source.value(bar);
        let fast = self.fast.next(value);
        let slow = self.slow.next(value);
        let (fast, slow) = match (fast, slow) {
            (Some(f), Some(s)) => (f, s),
            _ => return None,
        };
        let macd = fast - slow;
        let signal = self.signal.next(macd)?;
        Some(IndicatorSample {
            time: bar.time,
            values: vec![macd, signal, macd - signal],
        })
    }
}

struct BbandsEngine {
    period: usize,
    stddev: f64,
    source: SourceField,
    window: VecDeque<f64>,
    sum: f64,
}

impl BbandsEngine {
    fn new(period: usize, stddev: f64, source: SourceField) -> Self {
        Self {
            period: period.max(1),
            stddev,
            source,
            window: VecDeque::new(),
            sum: 0.0,
        }
    }
}

impl IndicatorEngine for BbandsEngine {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Bbands
    }

    fn output_dimension(&self) -> usize {
        3
    }

    fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
    }

    fn apply_incremental(&mut self, bar: &Bar) -> Option<IndicatorSample> {
        let value = self.source.value(bar);
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        if self.window.len() < self.period {
            return None;
        }
        let middle = self.sum / self.period as f64;
        // Population deviation over the window, not the sample estimator.
        let variance = self
            .window
            .iter()
            .map(|v| (v - middle).powi(2))
            .sum::<f64>()
            / self.period as f64;
        let band = variance.sqrt() * self.stddev;
        Some(IndicatorSample {
            time: bar.time,
            values: vec![middle, middle + band, middle - band],
        })
    }
}
