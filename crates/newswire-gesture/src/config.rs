//! Gesture thresholds.

use serde::Deserialize;

/// Pixel and timing thresholds shared by every control.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GestureConfig {
    /// Displacement that commits a contact to a drag axis.
    #[serde(default = "default_commit_threshold")]
    pub commit_threshold_px: f64,

    /// Long-press progress sampling period.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Wheel events inside this window after a wheel step are ignored.
    #[serde(default = "default_wheel_cooldown")]
    pub wheel_cooldown_ms: u64,

    /// Horizontal swipe that steps the amount on single-coin controls.
    #[serde(default = "default_amount_swipe")]
    pub amount_swipe_px: f64,

    /// Horizontal swipe that cycles the coin on multi-coin controls.
    #[serde(default = "default_coin_swipe")]
    pub coin_swipe_px: f64,

    /// Vertical swipe that steps the amount on multi-coin controls.
    #[serde(default = "default_vertical_amount_swipe")]
    pub vertical_amount_swipe_px: f64,
}

fn default_commit_threshold() -> f64 {
    10.0
}

fn default_tick_interval() -> u64 {
    16
}

fn default_wheel_cooldown() -> u64 {
    400
}

fn default_amount_swipe() -> f64 {
    40.0
}

fn default_coin_swipe() -> f64 {
    20.0
}

fn default_vertical_amount_swipe() -> f64 {
    100.0
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            commit_threshold_px: default_commit_threshold(),
            tick_interval_ms: default_tick_interval(),
            wheel_cooldown_ms: default_wheel_cooldown(),
            amount_swipe_px: default_amount_swipe(),
            coin_swipe_px: default_coin_swipe(),
            vertical_amount_swipe_px: default_vertical_amount_swipe(),
        }
    }
}
