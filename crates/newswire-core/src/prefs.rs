//! User preferences and feature flags.
//!
//! Consumed as configuration only: the preference collaborator supplies
//! amount presets, button style and long-press duration; the widget config
//! endpoint supplies feature flags.

use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maximum number of amount presets a control can show.
pub const MAX_AMOUNT_PRESETS: usize = 4;

/// Minimum number of amount presets a control can show.
pub const MIN_AMOUNT_PRESETS: usize = 1;

/// Trade button presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStyle {
    /// One split control per coin, swipe to change amount/coin.
    #[default]
    Swipe,
    /// One button per (coin, side, amount).
    Standard,
}

/// Allowed press-and-hold durations.
///
/// Serialized as the number of milliseconds (0, 500, 750 or 1000).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum LongPressDuration {
    /// Fires on pointer-down.
    Instant,
    Short,
    #[default]
    Medium,
    Long,
}

impl LongPressDuration {
    pub fn as_millis(&self) -> u64 {
        match self {
            Self::Instant => 0,
            Self::Short => 500,
            Self::Medium => 750,
            Self::Long => 1000,
        }
    }

    pub fn is_instant(&self) -> bool {
        matches!(self, Self::Instant)
    }
}

impl TryFrom<u64> for LongPressDuration {
    type Error = CoreError;

    fn try_from(ms: u64) -> Result<Self> {
        match ms {
            0 => Ok(Self::Instant),
            500 => Ok(Self::Short),
            750 => Ok(Self::Medium),
            1000 => Ok(Self::Long),
            other => Err(CoreError::InvalidLongPressDuration(other)),
        }
    }
}

impl From<LongPressDuration> for u64 {
    fn from(d: LongPressDuration) -> Self {
        d.as_millis()
    }
}

/// Per-user trading preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub trade_amount_presets: Vec<Decimal>,
    #[serde(default)]
    pub button_style: ButtonStyle,
    #[serde(default)]
    pub long_press_duration: LongPressDuration,
}

impl UserPreferences {
    /// Build preferences from a preset list, keeping the default style and duration.
    pub fn with_presets(presets: Vec<Decimal>) -> Self {
        Self {
            trade_amount_presets: presets,
            button_style: ButtonStyle::default(),
            long_press_duration: LongPressDuration::default(),
        }
    }

    /// Check preset count and minimum amount.
    pub fn validate(&self, min_trade_amount: Decimal) -> Result<()> {
        let count = self.trade_amount_presets.len();
        if !(MIN_AMOUNT_PRESETS..=MAX_AMOUNT_PRESETS).contains(&count) {
            return Err(CoreError::InvalidPresets(format!(
                "expected {MIN_AMOUNT_PRESETS}..={MAX_AMOUNT_PRESETS} presets, got {count}"
            )));
        }

        if let Some(bad) = self
            .trade_amount_presets
            .iter()
            .find(|a| **a < min_trade_amount)
        {
            return Err(CoreError::InvalidAmount(format!(
                "preset {bad} is below minimum {min_trade_amount}"
            )));
        }

        Ok(())
    }
}

/// Backend-controlled feature switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub allow_trading: bool,
    #[serde(default = "default_true")]
    pub show_sentiment: bool,
    #[serde(default = "default_true")]
    pub show_volume_alerts: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            allow_trading: true,
            show_sentiment: true,
            show_volume_alerts: true,
        }
    }
}
