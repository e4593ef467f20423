//! Embeddable financial news widget.
//!
//! Wires the components together:
//! - News feed connection feeding the in-memory store
//! - Gesture recognition on trade controls
//! - Trade dispatch (sandbox or live) for completed gestures
//! - Metrics and structured logging

pub mod app;
pub mod bridge;
pub mod config;
pub mod error;

pub use app::{run_gesture_pipeline, InitOptions, InitStatus, Widget};
pub use bridge::FeedBridge;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
