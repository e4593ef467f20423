//! WebSocket message types and frame classification.
//!
//! Every inbound text frame is classified into exactly one of:
//! - a typed [`InboundMessage`] (dispatched to one callback),
//! - [`Frame::HeartbeatAck`] (explicit no-op),
//! - [`Frame::Unparseable`] (dropped, never surfaced).
//!
//! The `type` discriminator is validated at this boundary; unknown
//! discriminators and malformed bodies are unparseable.

use newswire_core::{NewsItem, SentimentData, VolumeAlert};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Liveness frame sent on the heartbeat interval.
pub const HEARTBEAT_PING: &str = "ping";

/// Bare (non-JSON) heartbeat reply.
pub const HEARTBEAT_ACK: &str = "pong";

// ============================================================================
// Inbound
// ============================================================================

/// Server-to-client message, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Authentication accepted.
    AuthSuccess {
        #[serde(default)]
        exchange_id: Option<String>,
    },
    /// Authentication rejected.
    AuthError {
        #[serde(default = "default_auth_error")]
        error: String,
        /// Backend error code; numeric or string depending on the backend version.
        #[serde(default)]
        code: Option<serde_json::Value>,
    },
    /// A news/alert/tweet item.
    News { data: NewsItem },
    /// Sentiment for a previously delivered item.
    #[serde(rename = "ai_sentiment")]
    Sentiment(SentimentData),
    /// Unusual trading volume notification.
    #[serde(rename = "trading_volume_alert")]
    VolumeAlert(VolumeAlert),
    /// JSON heartbeat reply.
    Pong,
}

fn default_auth_error() -> String {
    "unknown error".to_string()
}

impl InboundMessage {
    /// Wire discriminator, for logging and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthSuccess { .. } => "auth_success",
            Self::AuthError { .. } => "auth_error",
            Self::News { .. } => "news",
            Self::Sentiment(_) => "ai_sentiment",
            Self::VolumeAlert(_) => "trading_volume_alert",
            Self::Pong => "pong",
        }
    }
}

/// Result of classifying one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A typed message for exactly one consumer.
    Message(InboundMessage),
    /// Heartbeat reply; nothing to dispatch.
    HeartbeatAck,
    /// Malformed or unknown; silently dropped.
    Unparseable,
}

impl Frame {
    /// Label used by logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(msg) => msg.kind(),
            Self::HeartbeatAck => "heartbeat_ack",
            Self::Unparseable => "unparseable",
        }
    }
}

/// Classify a raw text frame.
///
/// Total over its input: never fails, never panics.
pub fn classify(text: &str) -> Frame {
    let trimmed = text.trim();
    if trimmed == HEARTBEAT_ACK {
        return Frame::HeartbeatAck;
    }

    match serde_json::from_str::<InboundMessage>(trimmed) {
        Ok(InboundMessage::Pong) => Frame::HeartbeatAck,
        Ok(msg) => Frame::Message(msg),
        Err(e) => {
            debug!(error = %e, len = text.len(), "Dropping unparseable frame");
            Frame::Unparseable
        }
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// Client-to-server JSON message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Sent once per connection attempt, immediately after transport open.
    Auth { api_key: String },
}

impl OutboundMessage {
    pub fn auth(api_key: impl Into<String>) -> Self {
        Self::Auth {
            api_key: api_key.into(),
        }
    }

    /// Serialize to a text frame.
    pub fn to_frame(&self) -> String {
        match self {
            // Built by hand so serialization cannot fail.
            Self::Auth { api_key } => serde_json::json!({
                "type": "auth",
                "api_key": api_key,
            })
            .to_string(),
        }
    }
}
