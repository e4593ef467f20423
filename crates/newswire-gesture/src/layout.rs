//! Standard-button arrangement for amount presets.
//!
//! Long buttons list amounts ascending, short buttons descending. Narrow
//! containers stack each side into a two-column grid whose visual order is
//! permuted so the largest amounts sit next to each other across sides.

use crate::control::{ControlId, ControlKind, ControlSpec};
use newswire_core::{LongPressDuration, TradeSide};
use rust_decimal::Decimal;

/// Containers wider than this render every button in one row.
pub const WIDE_LAYOUT_MIN_WIDTH_PX: f64 = 780.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonLayout {
    Wide,
    Stacked,
}

pub fn layout_for_width(container_width_px: f64) -> ButtonLayout {
    if container_width_px > WIDE_LAYOUT_MIN_WIDTH_PX {
        ButtonLayout::Wide
    } else {
        ButtonLayout::Stacked
    }
}

/// Presets in display order for `side`.
pub fn ordered_presets(presets: &[Decimal], side: TradeSide) -> Vec<Decimal> {
    let mut sorted = presets.to_vec();
    sorted.sort();
    if side == TradeSide::Short {
        sorted.reverse();
    }
    sorted
}

/// Grid position of the button at `index` (in [`ordered_presets`] order).
pub fn stacked_order(index: usize, side: TradeSide, total: usize) -> usize {
    match (total, side) {
        (0..=2, _) => index,
        (3, TradeSide::Long) => [3, 0, 1].get(index).copied().unwrap_or(index),
        (3, TradeSide::Short) => index,
        (_, TradeSide::Long) => {
            let half = total.div_ceil(2);
            if index < half {
                index + half
            } else {
                index - half
            }
        }
        (_, TradeSide::Short) => index,
    }
}

/// Explicit grid column (1-based) for buttons that must not auto-place.
pub fn stacked_grid_column(index: usize, side: TradeSide, total: usize) -> Option<u8> {
    (total == 3 && side == TradeSide::Long && index == 0).then_some(2)
}

/// One rendered standard button.
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonSlot {
    pub id: ControlId,
    pub coin: String,
    pub side: TradeSide,
    pub amount: Decimal,
    pub order: usize,
    pub grid_column: Option<u8>,
}

impl ButtonSlot {
    pub fn control_spec(&self, long_press: LongPressDuration) -> ControlSpec {
        ControlSpec {
            kind: ControlKind::SingleTrade {
                coin: self.coin.clone(),
                amount: self.amount,
                side: self.side,
            },
            long_press,
            width_px: 0.0,
        }
    }
}

/// Key of a standard button: `{coin}-{side}-{index}`.
pub fn standard_control_id(coin: &str, side: TradeSide, index: usize) -> ControlId {
    ControlId::new(format!("{coin}-{side}-{index}"))
}

/// Lay out both sides of standard buttons for one coin.
pub fn standard_buttons(coin: &str, presets: &[Decimal], layout: ButtonLayout) -> Vec<ButtonSlot> {
    let total = presets.len();
    [TradeSide::Long, TradeSide::Short]
        .into_iter()
        .flat_map(|side| {
            ordered_presets(presets, side)
                .into_iter()
                .enumerate()
                .map(move |(index, amount)| {
                    let (order, grid_column) = match layout {
                        ButtonLayout::Wide => (index, None),
                        ButtonLayout::Stacked => (
                            stacked_order(index, side, total),
                            stacked_grid_column(index, side, total),
                        ),
                    };
                    ButtonSlot {
                        id: standard_control_id(coin, side, index),
                        coin: coin.to_string(),
                        side,
                        amount,
                        order,
                        grid_column,
                    }
                })
        })
        .collect()
}
