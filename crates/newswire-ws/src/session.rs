//! Connection session state machine.
//!
//! [`Session`] owns the lifecycle rules of one logical feed session and
//! performs no I/O. The driver in [`crate::connection`] feeds it
//! [`SessionEvent`]s and executes the returned [`SessionAction`]s in order.
//!
//! ```text
//! disconnected --connect--> connecting --opened--> authenticating
//! authenticating --auth_success--> authenticated
//! authenticating --auth_error--> closing --closed--> disconnected
//! authenticated --closed (non-terminal)--> connecting (after backoff)
//! any --closed (terminal) | disconnect--> disconnected
//! ```

use crate::handler::FeedEvent;
use crate::message::{Frame, InboundMessage, OutboundMessage, HEARTBEAT_PING};
use crate::reconnect::{ReconnectDecision, ReconnectPolicy};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Close code the client uses for its own closes.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close frame without a status code.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Transport lost without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Error reported when the reconnect budget is used up.
pub const EXHAUSTED_MESSAGE: &str = "Max reconnection attempts reached";

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// Opening a transport, or waiting for the reconnect timer.
    Connecting,
    /// Transport open, auth frame sent.
    Authenticating,
    Authenticated,
    /// Client-initiated close in flight.
    Closing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static session rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub policy: ReconnectPolicy,
    /// Close codes that end the session without reconnecting.
    pub terminal_close_codes: Vec<u16>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicy::default(),
            terminal_close_codes: default_terminal_close_codes(),
        }
    }
}

/// Normal closure plus the backend's auth-rejection codes.
pub fn default_terminal_close_codes() -> Vec<u16> {
    vec![1000, 4001, 40002, 4003]
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connect,
    TransportOpened,
    TransportError(String),
    Frame(Frame),
    TransportClosed { code: u16, reason: String },
    ReconnectTimerFired,
    HeartbeatTick,
    Disconnect,
}

/// Effect requested by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    OpenTransport,
    SendText(String),
    CloseTransport { code: u16, reason: String },
    StartHeartbeat,
    StopHeartbeat,
    ScheduleReconnect(Duration),
    CancelReconnect,
    /// Invoke one feed callback.
    Emit(FeedEvent),
}

/// One logical feed session, possibly spanning several transports.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    api_key: String,
    state: SessionState,
    /// Retries scheduled since the last successful authentication.
    attempt_count: u32,
    reconnect_pending: bool,
    /// Last value passed to `on_connection_change`.
    reported_connected: bool,
}

impl Session {
    pub fn new(config: SessionConfig, api_key: impl Into<String>) -> Self {
        Self {
            config,
            api_key: api_key.into(),
            state: SessionState::Disconnected,
            attempt_count: 0,
            reconnect_pending: false,
            reported_connected: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Apply one event. Returned actions must be executed in order.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        match event {
            SessionEvent::Connect => self.on_connect(&mut actions),
            SessionEvent::TransportOpened => self.on_opened(&mut actions),
            SessionEvent::TransportError(message) => self.on_transport_error(message, &mut actions),
            SessionEvent::Frame(frame) => self.on_frame(frame, &mut actions),
            SessionEvent::TransportClosed { code, reason } => {
                self.on_closed(code, &reason, &mut actions)
            }
            SessionEvent::ReconnectTimerFired => self.on_reconnect_timer(&mut actions),
            SessionEvent::HeartbeatTick => {
                if self.state == SessionState::Authenticated {
                    actions.push(SessionAction::SendText(HEARTBEAT_PING.to_string()));
                }
            }
            SessionEvent::Disconnect => self.on_disconnect(&mut actions),
        }
        actions
    }

    fn on_connect(&mut self, actions: &mut Vec<SessionAction>) {
        if self.state != SessionState::Disconnected {
            debug!(state = %self.state, "Connect ignored, session active");
            return;
        }
        self.attempt_count = 0;
        self.reconnect_pending = false;
        self.state = SessionState::Connecting;
        actions.push(SessionAction::OpenTransport);
    }

    fn on_opened(&mut self, actions: &mut Vec<SessionAction>) {
        match self.state {
            SessionState::Connecting if !self.reconnect_pending => {
                self.state = SessionState::Authenticating;
                actions.push(SessionAction::SendText(
                    OutboundMessage::auth(self.api_key.clone()).to_frame(),
                ));
            }
            _ => {
                debug!(state = %self.state, "Unexpected transport open, closing it");
                actions.push(SessionAction::CloseTransport {
                    code: CLOSE_NORMAL,
                    reason: "Client disconnect".to_string(),
                });
            }
        }
    }

    fn on_transport_error(&mut self, message: String, actions: &mut Vec<SessionAction>) {
        if matches!(
            self.state,
            SessionState::Disconnected | SessionState::Closing
        ) {
            return;
        }
        warn!(error = %message, state = %self.state, "Transport error");
        actions.push(SessionAction::Emit(FeedEvent::Error(format!(
            "WebSocket connection error: {message}"
        ))));
    }

    fn on_frame(&mut self, frame: Frame, actions: &mut Vec<SessionAction>) {
        let Frame::Message(msg) = frame else {
            return;
        };
        if !matches!(
            self.state,
            SessionState::Authenticating | SessionState::Authenticated
        ) {
            debug!(kind = msg.kind(), state = %self.state, "Frame outside open session dropped");
            return;
        }

        match msg {
            InboundMessage::AuthSuccess { exchange_id } => {
                if self.state != SessionState::Authenticating {
                    debug!("Duplicate auth_success ignored");
                    return;
                }
                info!(?exchange_id, "Authenticated");
                self.state = SessionState::Authenticated;
                self.attempt_count = 0;
                actions.push(SessionAction::StartHeartbeat);
                self.report_connected(true, actions);
            }
            InboundMessage::AuthError { error, code } => {
                error!(%error, ?code, "Authentication rejected");
                self.state = SessionState::Closing;
                actions.push(SessionAction::StopHeartbeat);
                self.report_connected(false, actions);
                actions.push(SessionAction::Emit(FeedEvent::Error(format!(
                    "Authentication failed: {error}"
                ))));
                actions.push(SessionAction::CloseTransport {
                    code: CLOSE_NORMAL,
                    reason: "Authentication failed".to_string(),
                });
            }
            InboundMessage::News { data } => {
                actions.push(SessionAction::Emit(FeedEvent::News(data)));
            }
            InboundMessage::Sentiment(data) => {
                actions.push(SessionAction::Emit(FeedEvent::Sentiment(data)));
            }
            InboundMessage::VolumeAlert(alert) => {
                actions.push(SessionAction::Emit(FeedEvent::VolumeAlert(alert)));
            }
            InboundMessage::Pong => {}
        }
    }

    fn on_closed(&mut self, code: u16, reason: &str, actions: &mut Vec<SessionAction>) {
        match self.state {
            SessionState::Disconnected => return,
            SessionState::Closing => {
                info!(code, %reason, "Session closed");
                self.state = SessionState::Disconnected;
                self.report_connected(false, actions);
                return;
            }
            SessionState::Connecting if self.reconnect_pending => {
                debug!(code, "Close while waiting to reconnect ignored");
                return;
            }
            _ => {}
        }

        actions.push(SessionAction::StopHeartbeat);
        self.report_connected(false, actions);

        if self.config.terminal_close_codes.contains(&code) {
            info!(code, %reason, "Terminal close, not reconnecting");
            self.state = SessionState::Disconnected;
            return;
        }

        match self.config.policy.decide(self.attempt_count) {
            ReconnectDecision::Retry { delay } => {
                self.attempt_count += 1;
                warn!(
                    code,
                    %reason,
                    attempt = self.attempt_count,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnecting"
                );
                self.state = SessionState::Connecting;
                self.reconnect_pending = true;
                actions.push(SessionAction::ScheduleReconnect(delay));
            }
            ReconnectDecision::Exhausted => {
                error!(attempts = self.attempt_count, "{EXHAUSTED_MESSAGE}");
                self.state = SessionState::Disconnected;
                actions.push(SessionAction::Emit(FeedEvent::Error(
                    EXHAUSTED_MESSAGE.to_string(),
                )));
            }
        }
    }

    fn on_reconnect_timer(&mut self, actions: &mut Vec<SessionAction>) {
        if self.state != SessionState::Connecting || !self.reconnect_pending {
            debug!(state = %self.state, "Stale reconnect timer ignored");
            return;
        }
        self.reconnect_pending = false;
        actions.push(SessionAction::OpenTransport);
    }

    fn on_disconnect(&mut self, actions: &mut Vec<SessionAction>) {
        match self.state {
            SessionState::Disconnected | SessionState::Closing => {}
            SessionState::Connecting if self.reconnect_pending => {
                info!("Disconnect while waiting to reconnect");
                self.reconnect_pending = false;
                self.state = SessionState::Disconnected;
                actions.push(SessionAction::CancelReconnect);
                self.report_connected(false, actions);
            }
            _ => {
                info!(state = %self.state, "Disconnect requested");
                self.state = SessionState::Closing;
                actions.push(SessionAction::CancelReconnect);
                actions.push(SessionAction::StopHeartbeat);
                self.report_connected(false, actions);
                actions.push(SessionAction::CloseTransport {
                    code: CLOSE_NORMAL,
                    reason: "Client disconnect".to_string(),
                });
            }
        }
    }

    fn report_connected(&mut self, connected: bool, actions: &mut Vec<SessionAction>) {
        if self.reported_connected != connected {
            self.reported_connected = connected;
            actions.push(SessionAction::Emit(FeedEvent::ConnectionChange(connected)));
        }
    }
}
