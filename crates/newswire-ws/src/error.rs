//! WebSocket error types.
//!
//! Session failures never surface here: they become state transitions plus
//! `on_error` callbacks. These errors cover API misuse and transport plumbing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Session already active")]
    AlreadyActive,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

pub type WsResult<T> = Result<T, WsError>;
