//! WebSocket client for the news feed.
//!
//! Provides:
//! - Authenticated sessions (`auth` frame sent once per transport)
//! - Frame classification into a closed message set
//! - Fixed-interval heartbeat while authenticated
//! - Bounded exponential backoff with configurable terminal close codes
//! - A pure session state machine driven by a cancellable async task

pub mod connection;
pub mod error;
pub mod handler;
pub mod heartbeat;
pub mod message;
pub mod reconnect;
pub mod session;

pub use connection::{ConnectionConfig, ConnectionManager, SessionParams};
pub use error::{WsError, WsResult};
pub use handler::{ChannelHandler, FeedEvent, FeedHandler};
pub use heartbeat::{HeartbeatMonitor, HeartbeatStats};
pub use message::{classify, Frame, InboundMessage, OutboundMessage, HEARTBEAT_ACK, HEARTBEAT_PING};
pub use reconnect::{next_delay, ReconnectDecision, ReconnectPolicy};
pub use session::{
    default_terminal_close_codes, Session, SessionAction, SessionConfig, SessionEvent,
    SessionState,
};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any `wss://` connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
