//! Core domain types for the newswire trading widget.
//!
//! This crate provides the types shared by every other crate:
//! - `NewsItem`, `SentimentData`, `VolumeAlert`: feed payloads
//! - `TradeSide`, `TradeIntent`, `TradeRequest`: trade plumbing
//! - `UserPreferences`, `FeatureFlags`: configuration consumed from the backend
//! - `Clock`: injectable time source for timer-driven state machines

pub mod clock;
pub mod error;
pub mod news;
pub mod prefs;
pub mod trade;

pub use clock::{Clock, SystemClock, TokioClock};
pub use error::{CoreError, Result};
pub use news::{NewsItem, Sentiment, SentimentData, VolumeAlert};
pub use prefs::{
    ButtonStyle, FeatureFlags, LongPressDuration, UserPreferences, MAX_AMOUNT_PRESETS,
    MIN_AMOUNT_PRESETS,
};
pub use trade::{TradeIntent, TradeRequest, TradeSide};
