//! Trade control descriptions.
//!
//! A control is one interactive trade surface. Its kind decides what a drag
//! does; the press-and-hold behavior is the same for every kind.

use crate::error::{GestureError, GestureResult};
use newswire_core::prefs::{MAX_AMOUNT_PRESETS, MIN_AMOUNT_PRESETS};
use newswire_core::{LongPressDuration, TradeIntent, TradeSide};
use rust_decimal::Decimal;
use std::fmt;

/// Stable key of a control; contacts are tracked per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(String);

impl ControlId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ControlId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ControlId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Pointer position relative to the control's top-left corner, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// What a control trades and how a drag changes it.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    /// One button per (coin, side, amount). Drags only cancel the press.
    SingleTrade {
        coin: String,
        amount: Decimal,
        side: TradeSide,
    },
    /// One coin; a horizontal swipe steps the amount, clamped at the ends.
    AmountSwipe { coin: String, presets: Vec<Decimal> },
    /// Several coins; a horizontal swipe cycles the coin with wraparound,
    /// a vertical swipe steps the amount, clamped at the ends.
    CoinAndAmountSwipe {
        coins: Vec<String>,
        presets: Vec<Decimal>,
    },
}

/// Registration data for a control.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSpec {
    pub kind: ControlKind,
    pub long_press: LongPressDuration,
    /// Rendered width; swipe controls pick the side from the half pressed.
    pub width_px: f64,
}

impl ControlSpec {
    pub(crate) fn validate(&self, id: &ControlId) -> GestureResult<()> {
        let invalid = |reason: &str| GestureError::InvalidControl {
            id: id.clone(),
            reason: reason.to_string(),
        };

        let presets = match &self.kind {
            ControlKind::SingleTrade { .. } => return Ok(()),
            ControlKind::AmountSwipe { presets, .. } => presets,
            ControlKind::CoinAndAmountSwipe { coins, presets } => {
                if coins.is_empty() {
                    return Err(invalid("no coins"));
                }
                presets
            }
        };

        if !(MIN_AMOUNT_PRESETS..=MAX_AMOUNT_PRESETS).contains(&presets.len()) {
            return Err(invalid("amount preset count out of range"));
        }
        if self.width_px.is_nan() || self.width_px <= 0.0 {
            return Err(invalid("width must be positive"));
        }
        Ok(())
    }
}

/// Current coin/amount choice of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub coin_index: usize,
    pub amount_index: usize,
}

/// Which index a drag step moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTarget {
    Coin,
    Amount,
}

/// Move `index` by `step` within `len`, either clamping or wrapping.
pub(crate) fn step_index(index: usize, step: i8, len: usize, wrap: bool) -> usize {
    if len == 0 {
        return 0;
    }
    let last = len - 1;
    match step.signum() {
        1 if index >= last => {
            if wrap {
                0
            } else {
                last
            }
        }
        1 => index + 1,
        -1 if index == 0 => {
            if wrap {
                last
            } else {
                0
            }
        }
        -1 => index - 1,
        _ => index,
    }
}

impl ControlKind {
    /// Resolve the trade this control would fire for `selection` on `side`.
    pub fn intent(&self, selection: Selection, side: TradeSide) -> Option<TradeIntent> {
        match self {
            Self::SingleTrade { coin, amount, side } => {
                Some(TradeIntent::new(coin.clone(), *amount, *side))
            }
            Self::AmountSwipe { coin, presets } => {
                let amount = presets.get(selection.amount_index).or(presets.first())?;
                Some(TradeIntent::new(coin.clone(), *amount, side))
            }
            Self::CoinAndAmountSwipe { coins, presets } => {
                let coin = coins.get(selection.coin_index).or(coins.first())?;
                let amount = presets.get(selection.amount_index).or(presets.first())?;
                Some(TradeIntent::new(coin.clone(), *amount, side))
            }
        }
    }

    /// Side fixed by the control, if any.
    pub fn fixed_side(&self) -> Option<TradeSide> {
        match self {
            Self::SingleTrade { side, .. } => Some(*side),
            _ => None,
        }
    }

    pub(crate) fn preset_count(&self) -> usize {
        match self {
            Self::SingleTrade { .. } => 1,
            Self::AmountSwipe { presets, .. } | Self::CoinAndAmountSwipe { presets, .. } => {
                presets.len()
            }
        }
    }

    pub(crate) fn coin_count(&self) -> usize {
        match self {
            Self::CoinAndAmountSwipe { coins, .. } => coins.len(),
            _ => 1,
        }
    }

    /// Apply one step and return the new selection, or `None` if nothing moved.
    pub(crate) fn step(
        &self,
        selection: Selection,
        target: StepTarget,
        step: i8,
    ) -> Option<Selection> {
        let mut next = selection;
        match target {
            StepTarget::Coin => {
                next.coin_index = step_index(selection.coin_index, step, self.coin_count(), true);
            }
            StepTarget::Amount => {
                next.amount_index =
                    step_index(selection.amount_index, step, self.preset_count(), false);
            }
        }
        (next != selection).then_some(next)
    }
}
