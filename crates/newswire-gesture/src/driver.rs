//! Async tick loop for the gesture recognizer.
//!
//! A pointer-down that starts a hold spawns one tick task for that control.
//! The task is cancelled by pointer-up, by control removal, or by shutdown,
//! and exits on its own once the hold resolves.

use crate::config::GestureConfig;
use crate::control::{ControlId, ControlSpec, Point};
use crate::error::GestureResult;
use crate::recognizer::{GestureEvent, GestureRecognizer};
use newswire_core::Clock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Shares a recognizer between pointer handlers and tick tasks.
pub struct GestureDriver {
    recognizer: Arc<Mutex<GestureRecognizer>>,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
    events_tx: mpsc::UnboundedSender<GestureEvent>,
    ticks: Mutex<HashMap<ControlId, CancellationToken>>,
}

impl GestureDriver {
    /// Create a driver and the receiver for its events.
    pub fn new(
        config: GestureConfig,
        clock: Arc<dyn Clock>,
    ) -> (Self, mpsc::UnboundedReceiver<GestureEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let driver = Self {
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
            recognizer: Arc::new(Mutex::new(GestureRecognizer::new(config))),
            clock,
            events_tx,
            ticks: Mutex::new(HashMap::new()),
        };
        (driver, events_rx)
    }

    pub fn recognizer(&self) -> Arc<Mutex<GestureRecognizer>> {
        self.recognizer.clone()
    }

    pub fn register_control(&self, id: ControlId, spec: ControlSpec) -> GestureResult<()> {
        self.cancel_ticks(&id);
        self.recognizer.lock().register_control(id, spec)
    }

    /// Remove a control, stopping its tick task.
    pub fn remove_control(&self, id: &ControlId) -> bool {
        self.cancel_ticks(id);
        self.recognizer.lock().remove_control(id)
    }

    /// Must be called from within a tokio runtime.
    pub fn pointer_down(&self, id: &ControlId, at: Point) -> GestureResult<()> {
        let now = self.clock.now_ms();
        let (events, needs_ticks) = {
            let mut recognizer = self.recognizer.lock();
            let events = recognizer.pointer_down(id, at, now)?;
            (events, recognizer.needs_ticks(id))
        };
        self.forward(events);

        if needs_ticks {
            self.spawn_ticks(id.clone());
        }
        Ok(())
    }

    pub fn pointer_move(&self, id: &ControlId, at: Point) -> GestureResult<()> {
        let events = self.recognizer.lock().pointer_move(id, at)?;
        self.forward(events);
        Ok(())
    }

    /// Pointer up, cancel or leave.
    pub fn pointer_up(&self, id: &ControlId) -> GestureResult<()> {
        self.cancel_ticks(id);
        let events = self.recognizer.lock().pointer_up(id)?;
        self.forward(events);
        Ok(())
    }

    pub fn wheel(&self, id: &ControlId, delta_y: f64) -> GestureResult<()> {
        let now = self.clock.now_ms();
        let events = self.recognizer.lock().wheel(id, delta_y, now)?;
        self.forward(events);
        Ok(())
    }

    /// Number of running tick tasks.
    pub fn active_ticks(&self) -> usize {
        self.ticks
            .lock()
            .values()
            .filter(|t| !t.is_cancelled())
            .count()
    }

    /// Cancel every tick task.
    pub fn shutdown(&self) {
        for (_, token) in self.ticks.lock().drain() {
            token.cancel();
        }
    }

    fn forward(&self, events: Vec<GestureEvent>) {
        forward(&self.events_tx, events);
    }

    fn cancel_ticks(&self, id: &ControlId) {
        if let Some(token) = self.ticks.lock().remove(id) {
            token.cancel();
        }
    }

    fn spawn_ticks(&self, id: ControlId) {
        let token = CancellationToken::new();
        if let Some(previous) = self.ticks.lock().insert(id.clone(), token.clone()) {
            previous.cancel();
        }

        let recognizer = self.recognizer.clone();
        let clock = self.clock.clone();
        let events_tx = self.events_tx.clone();
        let period = self.tick_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; progress starts at zero anyway.
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        debug!(control = %id, "Tick task cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        let now = clock.now_ms();
                        let result = {
                            let mut recognizer = recognizer.lock();
                            recognizer
                                .tick(&id, now)
                                .map(|events| (events, recognizer.needs_ticks(&id)))
                        };
                        match result {
                            Ok((events, still_needed)) => {
                                forward(&events_tx, events);
                                if !still_needed {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(control = %id, error = %e, "Tick on removed control");
                                break;
                            }
                        }
                    }
                }
            }
            token.cancel();
        });
    }
}

impl Drop for GestureDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn forward(tx: &mpsc::UnboundedSender<GestureEvent>, events: Vec<GestureEvent>) {
    for event in events {
        if tx.send(event).is_err() {
            debug!("Gesture event receiver dropped");
            return;
        }
    }
}
