use serde::{Deserialize, Serialize};
use serde_json::Value;
use series_core::{Bar, Timestamp};
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-pro";

/// How many trailing chat messages go into the prompt.
pub const CHAT_CONTEXT_MESSAGES: usize = 5;
/// How many trailing bars go into the prompt.
pub const CHART_CONTEXT_BARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(rename = "ai")]
    Assistant,
}

impl Sender {
    fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "ai",
        }
    }
}

/// One entry of the assistant panel's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: Sender::User,
            text: text.into(),
            timestamp,
        }
    }

    pub fn assistant(text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: Sender::Assistant,
            text: text.into(),
            timestamp,
        }
    }
}

/// Last `count` bars as one line per bar, oldest first. The analyst reads
/// these verbatim, so keep the field labels stable.
pub fn describe_recent_bars(bars: &[Bar], count: usize) -> String {
    if bars.is_empty() {
        return "No chart data available.".to_string();
    }
    let start = bars.len().saturating_sub(count);
    bars[start..]
        .iter()
        .map(|bar| {
            format!(
                "Timestamp: {}, Open: {:.2}, High: {:.2}, Low: {:.2}, Close: {:.2}, Volume: {}",
                bar.time, bar.open, bar.high, bar.low, bar.close, bar.volume
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assemble the full analyst prompt from recent conversation and bars.
pub fn build_analysis_prompt(messages: &[ChatMessage], bars: &[Bar]) -> String {
    let start = messages.len().saturating_sub(CHAT_CONTEXT_MESSAGES);
    let history = messages[start..]
        .iter()
        .map(|m| format!("{}: {}", m.sender.as_str(), m.text))
        .collect::<Vec<_>>()
        .join("\n");
    let chart_data = describe_recent_bars(bars, CHART_CONTEXT_BARS);

    format!(
        "You are an expert trading analyst AI. Your goal is to help users by \
analyzing financial chart data and recent conversation history.\n\n\
Here is the recent chat history:\n{history}\n\n\
Here is the recent chart data (last {CHART_CONTEXT_BARS} periods, most recent last):\n{chart_data}\n\n\
Please analyze this data along with the recent chat history to:\n\
1. Identify the current market trend (e.g., bullish, bearish, sideways).\n\
2. Determine key support and resistance levels.\n\
3. Spot any basic chart patterns (e.g., head and shoulders, double top/bottom, triangles, channels).\n\
4. Provide potential trading signals or noteworthy insights based on your analysis.\n\
Respond clearly and concisely.\n\n\
AI Analyst:"
    )
}

#[derive(Debug, Error)]
pub enum AnalystError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("missing Gemini API key")]
    MissingApiKey,
    #[error("generative api error: {0}")]
    ApiError(String),
    #[error("parse error: {0}")]
    ParseError(String),
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        Self::new(api_key)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// Thin client for the generateContent endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AnalystError> {
        if config.api_key.trim().is_empty() {
            return Err(AnalystError::MissingApiKey);
        }
        let http = reqwest::Client::builder()
            .user_agent("chartlens-ai-analyst/0.1")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> Result<Self, AnalystError> {
        Self::new(GeminiConfig::default())
    }

    /// One-shot analysis: prompt from recent chat + bars, reply text back.
    pub async fn analyze(
        &self,
        messages: &[ChatMessage],
        bars: &[Bar],
    ) -> Result<String, AnalystError> {
        let prompt = build_analysis_prompt(messages, bars);
        self.generate(&prompt).await
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, AnalystError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        tracing::debug!(model = %self.config.model, prompt_len = prompt.len(), "generate request");

        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };
        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let json: Value = resp.json().await?;
        if !status.is_success() {
            let message = json
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            tracing::warn!(%status, %message, "generative api error");
            return Err(AnalystError::ApiError(message));
        }
        extract_reply(&json)
    }
}

/// Pull the reply text out of a generateContent response.
pub fn extract_reply(json: &Value) -> Result<String, AnalystError> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| AnalystError::ParseError("no candidates in response".to_string()))?;
    let text = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        return Err(AnalystError::ParseError(
            "candidate contained no text parts".to_string(),
        ));
    }
    Ok(text)
}
