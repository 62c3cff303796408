//! Bot HTTP API channel
//!
//! Concrete [`DeliveryChannel`] over a bot-style HTTP API: JSON requests for
//! text and cached-id sends, multipart uploads for fresh binary content. A
//! governor rate limiter paces every call so bursts of media stay under the
//! channel's per-chat limits.
//!
//! Responses are folded into the three-way [`ChannelError`] classification:
//! timeouts and 429/5xx are transient, a rejected transfer id is
//! `InvalidIdentifier`, everything else in 4xx is permanent.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{multipart, Client};
use serde_json::Value;
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use super::{ChannelError, ChannelId, DeliveryChannel, MediaKind, MediaSource, SendReceipt};

/// Description substrings the bot API uses when a cached id is no longer
/// usable.
const INVALID_ID_PATTERNS: &[&str] = &["wrong file identifier", "file_id", "invalid file id"];

/// Bot API channel configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// API base URL, e.g. `https://api.telegram.org`
    pub api_url: String,

    /// Bot token
    pub token: String,

    /// Request timeout in seconds (uploads of large media need headroom)
    pub timeout_secs: u64,

    /// Maximum sends per second
    pub sends_per_second: u32,
}

impl BotConfig {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            token: token.into(),
            timeout_secs: 120,
            sends_per_second: 1,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_sends_per_second(mut self, rate: u32) -> Self {
        self.sends_per_second = rate;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.api_url.is_empty() {
            return Err("Channel API URL cannot be empty".to_string());
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err("Channel API URL must start with http:// or https://".to_string());
        }
        if self.token.is_empty() {
            return Err("Channel bot token is empty".to_string());
        }
        if self.sends_per_second == 0 {
            return Err("sends_per_second must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Bot HTTP API delivery channel
pub struct BotChannel {
    config: BotConfig,
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl BotChannel {
    /// Create a new channel client.
    pub fn new(config: BotConfig) -> Result<Self, ChannelError> {
        config.validate().map_err(ChannelError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChannelError::InvalidConfig(format!("HTTP client: {e}")))?;

        let rate = NonZeroU32::new(config.sends_per_second)
            .unwrap_or_else(|| NonZeroU32::new(1).expect("1 is non-zero"));
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            config,
            client,
            rate_limiter,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_url, self.config.token, method)
    }

    /// Map a transport-level reqwest failure.
    fn transport_error(e: reqwest::Error) -> ChannelError {
        if e.is_timeout() {
            return ChannelError::transient("request timeout");
        }
        let message = e.to_string();
        if message.contains("reset") || message.contains("broken pipe") {
            ChannelError::connection_reset(message)
        } else if e.is_connect() {
            ChannelError::transient(message)
        } else {
            ChannelError::Permanent(message)
        }
    }

    /// Classify a decoded API response; `cached_id` marks sends that used a
    /// native transfer id, the only case an id rejection applies to.
    fn classify_response(
        status: u16,
        body: &Value,
        cached_id: bool,
    ) -> Result<Value, ChannelError> {
        if body.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(body.get("result").cloned().unwrap_or(Value::Null));
        }

        let description = body
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("no description")
            .to_string();

        if matches!(status, 429 | 500 | 502 | 503 | 504) {
            return Err(ChannelError::transient(format!("HTTP {status}: {description}")));
        }

        let lowered = description.to_lowercase();
        if cached_id && INVALID_ID_PATTERNS.iter().any(|p| lowered.contains(p)) {
            return Err(ChannelError::InvalidIdentifier(description));
        }

        Err(ChannelError::Permanent(format!("HTTP {status}: {description}")))
    }

    async fn execute(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
        cached_id: bool,
    ) -> Result<Value, ChannelError> {
        self.rate_limiter.until_ready().await;

        let response = request.send().await.map_err(Self::transport_error)?;
        let status = response.status().as_u16();

        // Intermediaries answer 5xx with HTML, not the API's JSON envelope.
        // An unreadable body on a retryable status keeps its transient class.
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) if matches!(status, 429 | 500 | 502 | 503 | 504) => {
                return Err(ChannelError::transient(format!(
                    "HTTP {status}: unreadable {method} response: {e}"
                )));
            }
            Err(e) => {
                return Err(ChannelError::Permanent(format!(
                    "{method} response decode: {e}"
                )));
            }
        };

        Self::classify_response(status, &body, cached_id)
    }

    /// Pull the native transfer id out of a send result.
    ///
    /// Photos come back as an array of sizes; the last element is the
    /// largest and is the one worth caching.
    fn extract_native_id(kind: MediaKind, result: &Value) -> Option<String> {
        let node = result.get(kind.field())?;
        let node = if kind == MediaKind::Photo {
            node.as_array()?.last()?
        } else {
            node
        };
        node.get("file_id")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    async fn upload_part(path: &Path) -> Result<multipart::Part, ChannelError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ChannelError::Permanent(format!("read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Ok(multipart::Part::bytes(bytes).file_name(file_name))
    }
}

#[async_trait::async_trait]
impl DeliveryChannel for BotChannel {
    async fn send_text(&self, channel: ChannelId, text: &str) -> Result<(), ChannelError> {
        let payload = serde_json::json!({
            "chat_id": channel,
            "text": text,
            "parse_mode": "HTML",
        });

        let request = self.client.post(self.method_url("sendMessage")).json(&payload);
        self.execute("sendMessage", request, false).await?;

        tracing::debug!(channel, "Text message sent");
        Ok(())
    }

    async fn send_media(
        &self,
        channel: ChannelId,
        kind: MediaKind,
        source: &MediaSource,
        protected: bool,
    ) -> Result<SendReceipt, ChannelError> {
        let url = self.method_url(kind.method());

        let result = match source {
            MediaSource::Native(id) => {
                let payload = serde_json::json!({
                    "chat_id": channel,
                    (kind.field()): id,
                    "protect_content": protected,
                });
                let request = self.client.post(&url).json(&payload);
                self.execute(kind.method(), request, true).await?
            }
            MediaSource::Upload(path) => {
                let form = multipart::Form::new()
                    .text("chat_id", channel.to_string())
                    .text("protect_content", protected.to_string())
                    .part(kind.field(), Self::upload_part(path).await?);
                let request = self.client.post(&url).multipart(form);
                self.execute(kind.method(), request, false).await?
            }
        };

        let native_id = Self::extract_native_id(kind, &result);
        tracing::debug!(channel, kind = ?kind, cached = native_id.is_some(), "Media sent");

        Ok(SendReceipt { native_id })
    }
}
