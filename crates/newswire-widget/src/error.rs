//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] newswire_ws::WsError),

    #[error("Gesture error: {0}")]
    Gesture(#[from] newswire_gesture::GestureError),

    #[error("Trade error: {0}")]
    Trade(#[from] newswire_trade::TradeError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] newswire_telemetry::TelemetryError),

    #[error("Invalid preferences: {0}")]
    Preferences(#[from] newswire_core::CoreError),

    #[error("Widget already initialized")]
    AlreadyInitialized,

    #[error("Widget not initialized")]
    NotInitialized,
}

pub type AppResult<T> = Result<T, AppError>;
