//! Trade error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("Trading is disabled for this widget")]
    TradingDisabled,

    #[error("Invalid trade amount: {0}")]
    InvalidAmount(String),

    #[error("Missing exchange identity: {0}")]
    MissingIdentity(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TradeResult<T> = Result<T, TradeError>;
