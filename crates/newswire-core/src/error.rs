//! Error types for newswire-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid presets: {0}")]
    InvalidPresets(String),

    #[error("Invalid long-press duration: {0}ms")]
    InvalidLongPressDuration(u64),

    #[error("Invalid trade side: {0}")]
    InvalidSide(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
