//! Heartbeat bookkeeping for the feed connection.
//!
//! The feed is kept alive by sending a `ping` literal on a fixed interval
//! while authenticated. Replies are recorded for diagnostics only: a missing
//! pong never tears the connection down, liveness is decided by the
//! transport closing.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct HeartbeatInner {
    last_ping: Option<DateTime<Utc>>,
    last_pong: Option<DateTime<Utc>>,
    last_frame: Option<DateTime<Utc>>,
    pings_sent: u64,
    pongs_received: u64,
}

/// Tracks ping/pong timing for one connection manager.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    interval_ms: u64,
    inner: RwLock<HeartbeatInner>,
}

impl HeartbeatMonitor {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            inner: RwLock::new(HeartbeatInner::default()),
        }
    }

    /// Interval between pings. Never zero.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    /// Reset on every successful authentication.
    pub fn reset(&self) {
        *self.inner.write() = HeartbeatInner::default();
    }

    pub fn record_ping(&self) {
        let mut inner = self.inner.write();
        inner.last_ping = Some(Utc::now());
        inner.pings_sent += 1;
    }

    pub fn record_pong(&self) {
        let now = Utc::now();
        let mut inner = self.inner.write();
        inner.last_pong = Some(now);
        inner.pongs_received += 1;

        if let Some(ping) = inner.last_ping {
            debug!(rtt_ms = (now - ping).num_milliseconds(), "Heartbeat ack");
        }
    }

    /// Record any inbound frame.
    pub fn record_frame(&self) {
        self.inner.write().last_frame = Some(Utc::now());
    }

    pub fn stats(&self) -> HeartbeatStats {
        let inner = self.inner.read();
        HeartbeatStats {
            last_ping: inner.last_ping,
            last_pong: inner.last_pong,
            last_frame: inner.last_frame,
            pings_sent: inner.pings_sent,
            pongs_received: inner.pongs_received,
        }
    }
}

/// Snapshot of heartbeat activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatStats {
    pub last_ping: Option<DateTime<Utc>>,
    pub last_pong: Option<DateTime<Utc>>,
    pub last_frame: Option<DateTime<Utc>>,
    pub pings_sent: u64,
    pub pongs_received: u64,
}

impl HeartbeatStats {
    /// Pings sent without a matching reply.
    pub fn unanswered(&self) -> u64 {
        self.pings_sent.saturating_sub(self.pongs_received)
    }
}
