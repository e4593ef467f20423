//! Per-control gesture state machine.
//!
//! Each registered control owns at most one contact at a time. A contact
//! resolves to at most one discrete outcome: a trade (hold completed) or a
//! preset change (swipe past the kind's step threshold).
//!
//! The recognizer is pure: callers supply timestamps and drive ticks. See
//! [`crate::driver`] for the async tick loop.

use crate::config::GestureConfig;
use crate::control::{ControlId, ControlKind, ControlSpec, Point, Selection, StepTarget};
use crate::error::{GestureError, GestureResult};
use newswire_core::{TradeIntent, TradeSide};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Contact phase. Once a drag axis is chosen it holds until the contact ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No contact, or the contact already produced its outcome.
    #[default]
    Idle,
    /// Pressed; neither the hold nor a drag axis has been decided.
    Determining,
    /// Hold completed; the trade is firing.
    LongPress,
    DraggingHorizontal,
    DraggingVertical,
}

/// Observable output of the recognizer.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    /// Hold progress in `[0, 1]`; `0.0` after an abort or a drag commit.
    Progress { control: ControlId, progress: f64 },
    /// A hold completed.
    Trade {
        control: ControlId,
        intent: TradeIntent,
    },
    /// Coin or amount selection moved.
    PresetChanged {
        control: ControlId,
        selection: Selection,
    },
}

#[derive(Debug, Clone)]
struct Contact {
    origin: Point,
    started_ms: u64,
    phase: Phase,
    progress: f64,
    committed: bool,
    side: TradeSide,
}

#[derive(Debug, Clone)]
struct ControlState {
    spec: ControlSpec,
    selection: Selection,
    contact: Option<Contact>,
    last_wheel_ms: Option<u64>,
}

/// Tracks contacts for every registered control.
#[derive(Debug, Default)]
pub struct GestureRecognizer {
    config: GestureConfig,
    controls: HashMap<ControlId, ControlState>,
}

/// Side picked by pressing a split control: left half is long.
pub fn side_for_position(x: f64, width_px: f64) -> TradeSide {
    if x < width_px / 2.0 {
        TradeSide::Long
    } else {
        TradeSide::Short
    }
}

/// Step direction for a displacement: negative (left/up) selects the next
/// index, positive selects the previous one.
fn swipe_step(delta: f64, threshold: f64) -> i8 {
    if delta < -threshold {
        1
    } else if delta > threshold {
        -1
    } else {
        0
    }
}

impl GestureRecognizer {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            controls: HashMap::new(),
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Register or replace a control. Replacing drops any live contact.
    pub fn register_control(&mut self, id: ControlId, spec: ControlSpec) -> GestureResult<()> {
        spec.validate(&id)?;
        self.controls.insert(
            id,
            ControlState {
                spec,
                selection: Selection::default(),
                contact: None,
                last_wheel_ms: None,
            },
        );
        Ok(())
    }

    /// Forget a control and any contact on it.
    pub fn remove_control(&mut self, id: &ControlId) -> bool {
        self.controls.remove(id).is_some()
    }

    pub fn control_ids(&self) -> impl Iterator<Item = &ControlId> {
        self.controls.keys()
    }

    /// Set the selection, clamped to the control's coins and presets.
    pub fn set_selection(&mut self, id: &ControlId, selection: Selection) -> GestureResult<()> {
        let state = self.state_mut(id)?;
        state.selection = Selection {
            coin_index: selection
                .coin_index
                .min(state.spec.kind.coin_count().saturating_sub(1)),
            amount_index: selection
                .amount_index
                .min(state.spec.kind.preset_count().saturating_sub(1)),
        };
        Ok(())
    }

    pub fn selection(&self, id: &ControlId) -> Option<Selection> {
        self.controls.get(id).map(|s| s.selection)
    }

    /// Phase of the control's contact; `Idle` when there is none.
    pub fn phase(&self, id: &ControlId) -> Option<Phase> {
        self.controls
            .get(id)
            .map(|s| s.contact.as_ref().map_or(Phase::Idle, |c| c.phase))
    }

    pub fn progress(&self, id: &ControlId) -> Option<f64> {
        self.controls
            .get(id)
            .map(|s| s.contact.as_ref().map_or(0.0, |c| c.progress))
    }

    /// True while the contact is waiting on hold progress.
    pub fn needs_ticks(&self, id: &ControlId) -> bool {
        self.controls
            .get(id)
            .and_then(|s| s.contact.as_ref())
            .is_some_and(|c| !c.committed && c.phase == Phase::Determining)
    }

    pub fn active_contacts(&self) -> usize {
        self.controls
            .values()
            .filter(|s| s.contact.is_some())
            .count()
    }

    fn state_mut(&mut self, id: &ControlId) -> GestureResult<&mut ControlState> {
        self.controls
            .get_mut(id)
            .ok_or_else(|| GestureError::UnknownControl(id.clone()))
    }

    /// Start a contact. Instant controls fire here.
    pub fn pointer_down(
        &mut self,
        id: &ControlId,
        at: Point,
        now_ms: u64,
    ) -> GestureResult<Vec<GestureEvent>> {
        let state = self.state_mut(id)?;
        if state.contact.is_some() {
            debug!(control = %id, "Second contact on busy control ignored");
            return Ok(Vec::new());
        }

        let side = state
            .spec
            .kind
            .fixed_side()
            .unwrap_or_else(|| side_for_position(at.x, state.spec.width_px));

        let mut contact = Contact {
            origin: at,
            started_ms: now_ms,
            phase: Phase::Determining,
            progress: 0.0,
            committed: false,
            side,
        };

        let mut events = Vec::new();
        if state.spec.long_press.is_instant() {
            contact.phase = Phase::LongPress;
            fire(id, &state.spec.kind, state.selection, &mut contact, &mut events);
        }
        state.contact = Some(contact);
        Ok(events)
    }

    /// Update a contact's position.
    pub fn pointer_move(&mut self, id: &ControlId, at: Point) -> GestureResult<Vec<GestureEvent>> {
        let commit_threshold = self.config.commit_threshold_px;
        let amount_swipe = self.config.amount_swipe_px;
        let coin_swipe = self.config.coin_swipe_px;
        let vertical_swipe = self.config.vertical_amount_swipe_px;

        let ControlState {
            spec,
            selection,
            contact,
            ..
        } = self.state_mut(id)?;
        let mut events = Vec::new();

        let Some(contact) = contact.as_mut().filter(|c| !c.committed) else {
            return Ok(events);
        };

        let dx = at.x - contact.origin.x;
        let dy = at.y - contact.origin.y;

        if contact.phase == Phase::Determining {
            let (ax, ay) = (dx.abs(), dy.abs());
            if ax > commit_threshold || ay > commit_threshold {
                let axis = if ax > ay {
                    Some(Phase::DraggingHorizontal)
                } else if ay > ax {
                    Some(Phase::DraggingVertical)
                } else {
                    None
                };
                if let Some(phase) = axis {
                    debug!(control = %id, ?phase, "Drag committed");
                    contact.phase = phase;
                    if contact.progress > 0.0 {
                        events.push(GestureEvent::Progress {
                            control: id.clone(),
                            progress: 0.0,
                        });
                    }
                    contact.progress = 0.0;
                }
            }
        }

        let step = match (contact.phase, &spec.kind) {
            (Phase::DraggingHorizontal, ControlKind::AmountSwipe { .. }) => {
                Some((StepTarget::Amount, swipe_step(dx, amount_swipe)))
            }
            (Phase::DraggingHorizontal, ControlKind::CoinAndAmountSwipe { .. }) => {
                Some((StepTarget::Coin, swipe_step(dx, coin_swipe)))
            }
            (Phase::DraggingVertical, ControlKind::CoinAndAmountSwipe { .. }) => {
                Some((StepTarget::Amount, swipe_step(dy, vertical_swipe)))
            }
            _ => None,
        };

        if let Some((target, direction)) = step.filter(|(_, d)| *d != 0) {
            if let Some(next) = spec.kind.step(*selection, target, direction) {
                *selection = next;
                contact.committed = true;
                events.push(GestureEvent::PresetChanged {
                    control: id.clone(),
                    selection: next,
                });
            }
        }

        Ok(events)
    }

    /// Sample hold progress. Fires the trade on the tick that reaches 1.0.
    pub fn tick(&mut self, id: &ControlId, now_ms: u64) -> GestureResult<Vec<GestureEvent>> {
        let ControlState {
            spec,
            selection,
            contact,
            ..
        } = self.state_mut(id)?;
        let mut events = Vec::new();

        let Some(contact) = contact
            .as_mut()
            .filter(|c| !c.committed && c.phase == Phase::Determining)
        else {
            return Ok(events);
        };

        let duration = spec.long_press.as_millis();
        let elapsed = now_ms.saturating_sub(contact.started_ms);

        if elapsed >= duration {
            contact.progress = 1.0;
            events.push(GestureEvent::Progress {
                control: id.clone(),
                progress: 1.0,
            });
            contact.phase = Phase::LongPress;
            fire(id, &spec.kind, *selection, contact, &mut events);
        } else {
            contact.progress = elapsed as f64 / duration as f64;
            events.push(GestureEvent::Progress {
                control: id.clone(),
                progress: contact.progress,
            });
        }

        Ok(events)
    }

    /// End a contact (pointer up, cancel or leave). Never fires.
    pub fn pointer_up(&mut self, id: &ControlId) -> GestureResult<Vec<GestureEvent>> {
        let state = self.state_mut(id)?;
        let mut events = Vec::new();

        if let Some(contact) = state.contact.take() {
            if !contact.committed && contact.progress > 0.0 {
                debug!(control = %id, progress = contact.progress, "Hold aborted");
                events.push(GestureEvent::Progress {
                    control: id.clone(),
                    progress: 0.0,
                });
            }
        }
        Ok(events)
    }

    /// Step the amount by one preset per wheel event, with a cooldown.
    pub fn wheel(
        &mut self,
        id: &ControlId,
        delta_y: f64,
        now_ms: u64,
    ) -> GestureResult<Vec<GestureEvent>> {
        let cooldown = self.config.wheel_cooldown_ms;
        let state = self.state_mut(id)?;

        if matches!(state.spec.kind, ControlKind::SingleTrade { .. }) {
            return Ok(Vec::new());
        }
        if state
            .last_wheel_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < cooldown)
        {
            return Ok(Vec::new());
        }
        state.last_wheel_ms = Some(now_ms);

        let direction = if delta_y > 0.0 { -1 } else { 1 };
        let mut events = Vec::new();
        if let Some(next) = state
            .spec
            .kind
            .step(state.selection, StepTarget::Amount, direction)
        {
            state.selection = next;
            events.push(GestureEvent::PresetChanged {
                control: id.clone(),
                selection: next,
            });
        }
        Ok(events)
    }
}

/// Emit the trade for a finished hold and settle the contact.
fn fire(
    id: &ControlId,
    kind: &ControlKind,
    selection: Selection,
    contact: &mut Contact,
    events: &mut Vec<GestureEvent>,
) {
    match kind.intent(selection, contact.side) {
        Some(intent) => {
            debug!(
                control = %id,
                coin = %intent.coin,
                amount = %intent.amount,
                side = %intent.side,
                "Hold completed"
            );
            events.push(GestureEvent::Trade {
                control: id.clone(),
                intent,
            });
        }
        None => warn!(control = %id, "Hold completed but control has nothing to trade"),
    }
    contact.committed = true;
    contact.progress = 0.0;
    contact.phase = Phase::Idle;
}
