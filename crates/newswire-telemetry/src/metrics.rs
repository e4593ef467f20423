//! Prometheus metrics for the newswire widget.
//!
//! Covers:
//! - Feed connection state and reconnects
//! - Inbound frames by kind
//! - Gesture outcomes
//! - Dispatched trades
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is fatal at startup. These panics only occur
//! during static initialization, never at runtime.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_int_counter, CounterVec,
    Encoder, Gauge, GaugeVec, IntCounter, TextEncoder,
};

/// Session states reported by the feed connection.
const SESSION_STATES: [&str; 5] = [
    "disconnected",
    "connecting",
    "authenticating",
    "authenticated",
    "closing",
];

/// Feed connection state (1 = authenticated, 0 = not).
pub static FEED_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "newswire_feed_connected",
        "News feed connection state (1=authenticated)"
    )
    .unwrap()
});

/// Current session state.
/// Labels: state (disconnected/connecting/authenticating/authenticated/closing)
pub static FEED_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "newswire_feed_state",
        "Feed session current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Total scheduled reconnects.
pub static FEED_RECONNECT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "newswire_feed_reconnect_total",
        "Total news feed reconnects scheduled"
    )
    .unwrap()
});

/// Feed errors reported to the widget.
pub static FEED_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("newswire_feed_errors_total", "Total news feed errors").unwrap()
});

/// Inbound frames by kind.
pub static FRAMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "newswire_frames_total",
        "Inbound feed frames by kind",
        &["kind"]
    )
    .unwrap()
});

/// Gesture outcomes.
/// Labels: outcome (trade/preset_changed)
pub static GESTURE_OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "newswire_gesture_outcomes_total",
        "Discrete gesture outcomes",
        &["outcome"]
    )
    .unwrap()
});

/// Trades by side, mode and result.
pub static TRADES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "newswire_trades_total",
        "Dispatched trades",
        &["side", "mode", "result"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn feed_connected() {
        FEED_CONNECTED.set(1.0);
    }

    pub fn feed_disconnected() {
        FEED_CONNECTED.set(0.0);
    }

    /// Only the active state is set to 1.
    pub fn feed_state_set(state: &str) {
        for s in SESSION_STATES {
            FEED_STATE.with_label_values(&[s]).set(0.0);
        }
        FEED_STATE.with_label_values(&[state]).set(1.0);
    }

    pub fn feed_reconnects(count: u64) {
        FEED_RECONNECT_TOTAL.inc_by(count);
    }

    pub fn feed_error() {
        FEED_ERRORS_TOTAL.inc();
    }

    pub fn frame_received(kind: &str) {
        FRAMES_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn gesture_outcome(outcome: &str) {
        GESTURE_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn trade(side: &str, mode: &str, success: bool) {
        let result = if success { "ok" } else { "error" };
        TRADES_TOTAL.with_label_values(&[side, mode, result]).inc();
    }

    /// Render the default registry in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_gauge_single_active() {
        Metrics::feed_state_set("authenticating");
        Metrics::feed_state_set("authenticated");

        assert_eq!(FEED_STATE.with_label_values(&["authenticated"]).get(), 1.0);
        assert_eq!(FEED_STATE.with_label_values(&["authenticating"]).get(), 0.0);
    }

    #[test]
    fn test_counters_and_render() {
        let before = TRADES_TOTAL.with_label_values(&["long", "sandbox", "ok"]).get();
        Metrics::trade("long", "sandbox", true);
        Metrics::frame_received("news");
        Metrics::feed_reconnects(2);

        assert_eq!(
            TRADES_TOTAL.with_label_values(&["long", "sandbox", "ok"]).get(),
            before + 1.0
        );
        let text = Metrics::render().unwrap();
        assert!(text.contains("newswire_trades_total"));
        assert!(text.contains("newswire_feed_reconnect_total"));
    }
}
