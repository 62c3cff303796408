//! Messaging channel boundary
//!
//! The engine pushes day content to subscribers through a messaging channel.
//! This module defines the channel interface and the three-way failure
//! classification the delivery loop branches on; the concrete bot HTTP API
//! client lives in [`bot_api`].

pub mod bot_api;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

pub use bot_api::{BotChannel, BotConfig};

/// Identifier of a subscriber's conversation on the channel
pub type ChannelId = i64;

/// Channel failures, classified the way the delivery loop consumes them
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Worth retrying: timeouts, connection resets, rate limits, 5xx
    #[error("Transient channel failure: {message}")]
    Transient {
        message: String,
        /// Connection-reset-shaped failures are usually rate limiting in
        /// disguise and get an extra flat delay before the retry.
        connection_reset: bool,
    },

    /// The channel rejected a previously issued native transfer id
    #[error("Channel rejected transfer identifier: {0}")]
    InvalidIdentifier(String),

    /// Not worth retrying: malformed request, unsupported content, 4xx
    #[error("Permanent channel failure: {0}")]
    Permanent(String),

    /// Rejected at construction time, never reaches the delivery path
    #[error("Invalid channel configuration: {0}")]
    InvalidConfig(String),
}

impl ChannelError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            connection_reset: false,
        }
    }

    pub fn connection_reset(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            connection_reset: true,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn is_connection_reset(&self) -> bool {
        matches!(
            self,
            Self::Transient {
                connection_reset: true,
                ..
            }
        )
    }

    pub fn is_invalid_identifier(&self) -> bool {
        matches!(self, Self::InvalidIdentifier(_))
    }
}

/// Kind of a binary item, selecting the channel send method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    /// Bot API method name for this kind.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Photo => "sendPhoto",
            Self::Video => "sendVideo",
            Self::Audio => "sendAudio",
            Self::Document => "sendDocument",
        }
    }

    /// JSON/form field the payload travels under.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }
}

/// What to send: a fresh upload from a local file, or a previously issued
/// channel-native transfer id.
#[derive(Debug, Clone)]
pub enum MediaSource {
    Upload(PathBuf),
    Native(String),
}

/// Result of a successful media send
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Channel-native transfer id, reusable for later sends of the same
    /// content without re-uploading.
    pub native_id: Option<String>,
}

/// Messaging channel interface
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Send a formatted text message.
    async fn send_text(&self, channel: ChannelId, text: &str) -> Result<(), ChannelError>;

    /// Send one binary item. `protected` marks the content non-forwardable.
    async fn send_media(
        &self,
        channel: ChannelId,
        kind: MediaKind,
        source: &MediaSource,
        protected: bool,
    ) -> Result<SendReceipt, ChannelError>;
}
