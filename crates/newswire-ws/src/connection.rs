//! News feed connection manager.
//!
//! Runs one [`Session`] on a spawned task: opens the socket, authenticates,
//! sends heartbeats while authenticated and sleeps through reconnect backoff.
//! Every timer is owned by the task and dropped on the path that ends it.

use crate::error::{WsError, WsResult};
use crate::handler::{FeedEvent, FeedHandler};
use crate::heartbeat::{HeartbeatMonitor, HeartbeatStats};
use crate::message::{classify, Frame, HEARTBEAT_PING};
use crate::reconnect::ReconnectPolicy;
use crate::session::{
    default_terminal_close_codes, Session, SessionAction, SessionConfig, SessionEvent,
    SessionState, CLOSE_ABNORMAL, CLOSE_NO_STATUS,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// How long `disconnect()` waits for the session task to close cleanly.
const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

/// Upper bound on flushing our own close frame.
const CLOSE_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Maximum consecutive reconnection attempts (0 = never reconnect).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Heartbeat interval while authenticated.
    pub heartbeat_interval_ms: u64,
    /// Close codes that must not trigger reconnection.
    pub terminal_close_codes: Vec<u16>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_reconnect_attempts: 5,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 16000,
            heartbeat_interval_ms: 25000,
            terminal_close_codes: default_terminal_close_codes(),
        }
    }
}

impl ConnectionConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            policy: ReconnectPolicy {
                max_attempts: self.max_reconnect_attempts,
                base_delay_ms: self.reconnect_base_delay_ms,
                max_delay_ms: self.reconnect_max_delay_ms,
            },
            terminal_close_codes: self.terminal_close_codes.clone(),
        }
    }
}

/// Per-session inputs to [`ConnectionManager::connect`].
pub struct SessionParams {
    pub api_key: String,
    pub handler: Arc<dyn FeedHandler>,
}

struct ActiveSession {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns at most one running feed session.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state_tx: Arc<watch::Sender<SessionState>>,
    heartbeat: Arc<HeartbeatMonitor>,
    /// Reconnects scheduled over the manager's lifetime.
    reconnects: Arc<AtomicU64>,
    active: Mutex<Option<ActiveSession>>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Self {
            heartbeat: Arc::new(HeartbeatMonitor::new(config.heartbeat_interval_ms)),
            config,
            state_tx: Arc::new(state_tx),
            reconnects: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    /// Start a session on the current tokio runtime.
    ///
    /// Returns immediately; progress is reported through the handler and
    /// [`Self::subscribe_state`]. Fails if a session is still running.
    pub fn connect(&self, params: SessionParams) -> WsResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|a| !a.task.is_finished()) {
            return Err(WsError::AlreadyActive);
        }

        let cancel = CancellationToken::new();
        let driver = SessionDriver {
            session: Session::new(self.config.session_config(), params.api_key),
            handler: params.handler,
            url: self.config.url.clone(),
            heartbeat: self.heartbeat.clone(),
            state_tx: self.state_tx.clone(),
            reconnects: self.reconnects.clone(),
            cancel: cancel.clone(),
            disconnect_requested: false,
            write: None,
            read: None,
            ticker: None,
            reconnect: None,
        };

        let task = runtime.spawn(driver.run());
        *active = Some(ActiveSession { cancel, task });
        Ok(())
    }

    /// Tear down the running session, if any, and suppress reconnection.
    ///
    /// Idempotent and safe from any state.
    pub async fn disconnect(&self) {
        let Some(active) = self.active.lock().take() else {
            return;
        };

        active.cancel.cancel();
        let abort = active.task.abort_handle();
        match tokio::time::timeout(DISCONNECT_GRACE, active.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(?e, "Session task ended abnormally"),
            Err(_) => {
                warn!("Session task did not stop in time, aborting");
                abort.abort();
            }
        }
        self.state_tx.send_replace(SessionState::Disconnected);
    }

    /// True only while authenticated.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// True while a session task is running.
    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|a| !a.task.is_finished())
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn heartbeat_stats(&self) -> HeartbeatStats {
        self.heartbeat.stats()
    }

    /// Total reconnects scheduled, across sessions.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.cancel.cancel();
        }
    }
}

/// What woke the session task.
enum Wake {
    Cancelled,
    ReconnectDue,
    HeartbeatDue,
    Inbound(Option<Result<Message, tungstenite::Error>>),
}

/// Executes session actions against a real socket.
struct SessionDriver {
    session: Session,
    handler: Arc<dyn FeedHandler>,
    url: String,
    heartbeat: Arc<HeartbeatMonitor>,
    state_tx: Arc<watch::Sender<SessionState>>,
    reconnects: Arc<AtomicU64>,
    cancel: CancellationToken,
    disconnect_requested: bool,
    write: Option<WsWrite>,
    read: Option<WsRead>,
    ticker: Option<Interval>,
    reconnect: Option<Pin<Box<Sleep>>>,
}

impl SessionDriver {
    async fn run(mut self) {
        let mut pending = VecDeque::from([SessionEvent::Connect]);

        loop {
            while let Some(event) = pending.pop_front() {
                let actions = self.session.handle(event);
                self.publish_state();
                for action in actions {
                    self.execute(action, &mut pending).await;
                }
            }

            if self.session.state() == SessionState::Disconnected {
                break;
            }

            let wake = self.wait().await;
            self.on_wake(wake, &mut pending);
        }

        self.ticker = None;
        self.reconnect = None;
        debug!("Session task finished");
    }

    fn publish_state(&self) {
        let state = self.session.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    async fn wait(&mut self) -> Wake {
        let cancel = self.cancel.clone();
        let watch_cancel = !self.disconnect_requested;

        tokio::select! {
            biased;
            () = cancel.cancelled(), if watch_cancel => Wake::Cancelled,
            () = sleep_or_pending(&mut self.reconnect) => Wake::ReconnectDue,
            () = tick_or_pending(&mut self.ticker) => Wake::HeartbeatDue,
            msg = next_or_pending(&mut self.read) => Wake::Inbound(msg),
        }
    }

    fn on_wake(&mut self, wake: Wake, pending: &mut VecDeque<SessionEvent>) {
        match wake {
            Wake::Cancelled => {
                self.disconnect_requested = true;
                pending.push_back(SessionEvent::Disconnect);
            }
            Wake::ReconnectDue => {
                self.reconnect = None;
                pending.push_back(SessionEvent::ReconnectTimerFired);
            }
            Wake::HeartbeatDue => pending.push_back(SessionEvent::HeartbeatTick),
            Wake::Inbound(msg) => self.on_inbound(msg, pending),
        }
    }

    fn on_inbound(
        &mut self,
        msg: Option<Result<Message, tungstenite::Error>>,
        pending: &mut VecDeque<SessionEvent>,
    ) {
        match msg {
            Some(Ok(Message::Text(text))) => {
                self.heartbeat.record_frame();
                let frame = classify(&text);
                if matches!(frame, Frame::HeartbeatAck) {
                    self.heartbeat.record_pong();
                }
                debug!(kind = frame.kind(), "Frame received");
                pending.push_back(SessionEvent::Frame(frame));
            }
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.to_string()))
                    .unwrap_or((CLOSE_NO_STATUS, String::new()));
                self.drop_transport();
                pending.push_back(SessionEvent::TransportClosed { code, reason });
            }
            Some(Ok(Message::Binary(data))) => {
                debug!(len = data.len(), "Dropping binary frame");
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                self.drop_transport();
                pending.push_back(SessionEvent::TransportError(e.to_string()));
                pending.push_back(SessionEvent::TransportClosed {
                    code: CLOSE_ABNORMAL,
                    reason: "Read error".to_string(),
                });
            }
            None => {
                self.drop_transport();
                pending.push_back(SessionEvent::TransportClosed {
                    code: CLOSE_ABNORMAL,
                    reason: "Stream ended".to_string(),
                });
            }
        }
    }

    async fn execute(&mut self, action: SessionAction, pending: &mut VecDeque<SessionEvent>) {
        match action {
            SessionAction::OpenTransport => self.open(pending).await,
            SessionAction::SendText(text) => {
                let is_ping = text == HEARTBEAT_PING;
                match send_text(&mut self.write, text).await {
                    Ok(()) if is_ping => self.heartbeat.record_ping(),
                    Ok(()) => {}
                    Err(e) => pending.push_back(SessionEvent::TransportError(e.to_string())),
                }
            }
            SessionAction::CloseTransport { code, reason } => {
                if let Some(mut write) = self.write.take() {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: Cow::Owned(reason.clone()),
                    };
                    let send = write.send(Message::Close(Some(frame)));
                    if let Ok(Err(e)) = tokio::time::timeout(CLOSE_SEND_TIMEOUT, send).await {
                        debug!(?e, "Close frame not delivered");
                    }
                }
                self.read = None;
                pending.push_back(SessionEvent::TransportClosed { code, reason });
            }
            SessionAction::StartHeartbeat => {
                self.heartbeat.reset();
                let period = self.heartbeat.interval();
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.ticker = Some(ticker);
            }
            SessionAction::StopHeartbeat => self.ticker = None,
            SessionAction::ScheduleReconnect(delay) => {
                self.reconnects.fetch_add(1, Ordering::Relaxed);
                self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
            }
            SessionAction::CancelReconnect => self.reconnect = None,
            SessionAction::Emit(event) => dispatch(self.handler.as_ref(), event),
        }
    }

    async fn open(&mut self, pending: &mut VecDeque<SessionEvent>) {
        info!(url = %self.url, "Connecting to news feed");
        let cancel = self.cancel.clone();
        let watch_cancel = !self.disconnect_requested;

        tokio::select! {
            biased;
            () = cancel.cancelled(), if watch_cancel => {
                self.disconnect_requested = true;
                pending.push_back(SessionEvent::Disconnect);
            }
            result = open_transport(&self.url) => match result {
                Ok((write, read)) => {
                    info!("News feed transport open");
                    self.write = Some(write);
                    self.read = Some(read);
                    pending.push_back(SessionEvent::TransportOpened);
                }
                Err(e) => {
                    pending.push_back(SessionEvent::TransportError(e.to_string()));
                    pending.push_back(SessionEvent::TransportClosed {
                        code: CLOSE_ABNORMAL,
                        reason: "Connection failed".to_string(),
                    });
                }
            }
        }
    }

    fn drop_transport(&mut self) {
        self.write = None;
        self.read = None;
    }
}

/// Invoke the handler callback matching `event`.
fn dispatch(handler: &dyn FeedHandler, event: FeedEvent) {
    match event {
        FeedEvent::News(item) => handler.on_news(item),
        FeedEvent::Sentiment(data) => handler.on_sentiment(data),
        FeedEvent::VolumeAlert(alert) => handler.on_volume_alert(alert),
        FeedEvent::ConnectionChange(connected) => handler.on_connection_change(connected),
        FeedEvent::Error(message) => handler.on_error(message),
    }
}

async fn open_transport(url: &str) -> WsResult<(WsWrite, WsRead)> {
    let (stream, _response) = connect_async_tls_with_config(url, None, true, None).await?;
    Ok(stream.split())
}

async fn send_text(write: &mut Option<WsWrite>, text: String) -> WsResult<()> {
    let write = write
        .as_mut()
        .ok_or_else(|| WsError::ConnectionFailed("transport not open".to_string()))?;
    write.send(Message::Text(text)).await?;
    Ok(())
}

async fn sleep_or_pending(sleep: &mut Option<Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn tick_or_pending(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_or_pending(read: &mut Option<WsRead>) -> Option<Result<Message, tungstenite::Error>> {
    match read {
        Some(read) => read.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{ChannelHandler, MockFeedHandler};
    use crate::session::EXHAUSTED_MESSAGE;
    use mockall::{predicate::eq, Sequence};
    use tokio::net::TcpListener;

    async fn wait_until_idle(manager: &ConnectionManager) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while manager.is_active() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("session task should finish");
    }

    async fn refused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{addr}")
    }

    async fn next_frame(rx: &mut tokio::sync::mpsc::UnboundedReceiver<String>) -> String {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("frame within timeout")
            .expect("server still running")
    }

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.heartbeat_interval_ms, 25000);
        assert_eq!(config.terminal_close_codes, vec![1000, 4001, 40002, 4003]);
    }

    #[test]
    fn test_connect_outside_runtime_fails() {
        let manager = ConnectionManager::new(ConnectionConfig::default());
        let (handler, _rx) = ChannelHandler::new();
        let result = manager.connect(SessionParams {
            api_key: "k".to_string(),
            handler: Arc::new(handler),
        });
        assert!(matches!(result, Err(WsError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_refused_connection_exhausts_without_retry_budget() {
        let config = ConnectionConfig {
            url: refused_url().await,
            max_reconnect_attempts: 0,
            ..Default::default()
        };
        let manager = ConnectionManager::new(config);

        let mut handler = MockFeedHandler::new();
        let mut seq = Sequence::new();
        handler
            .expect_on_error()
            .withf(|m| m.starts_with("WebSocket connection error"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        handler
            .expect_on_error()
            .with(eq(EXHAUSTED_MESSAGE.to_string()))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        handler.expect_on_connection_change().never();

        manager
            .connect(SessionParams {
                api_key: "k".to_string(),
                handler: Arc::new(handler),
            })
            .unwrap();

        wait_until_idle(&manager).await;
        assert_eq!(manager.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_auth_then_terminal_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let auth = ws.next().await.unwrap().unwrap();
            let auth: serde_json::Value = serde_json::from_str(auth.to_text().unwrap()).unwrap();
            assert_eq!(auth["type"], "auth");
            assert_eq!(auth["api_key"], "secret");

            ws.send(Message::Text(r#"{"type":"auth_success","exchange_id":"ex"}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(
                r#"{"type":"news","data":{"_id":"n1","title":"t","time":1}}"#.into(),
            ))
            .await
            .unwrap();
            ws.send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            })))
            .await
            .unwrap();
            // Drain until the client acknowledges the close.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let mut handler = MockFeedHandler::new();
        let mut seq = Sequence::new();
        handler
            .expect_on_connection_change()
            .with(eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        handler
            .expect_on_news()
            .withf(|item| item.id == "n1")
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        handler
            .expect_on_connection_change()
            .with(eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        handler.expect_on_error().never();

        let manager = ConnectionManager::new(ConnectionConfig {
            url: format!("ws://{addr}"),
            ..Default::default()
        });
        manager
            .connect(SessionParams {
                api_key: "secret".to_string(),
                handler: Arc::new(handler),
            })
            .unwrap();

        wait_until_idle(&manager).await;
        assert_eq!(manager.state(), SessionState::Disconnected);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_heartbeat_pings_after_auth_and_stop_on_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames_tx, mut frames_rx) = tokio::sync::mpsc::unbounded_channel::<String>();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let auth = ws.next().await.unwrap().unwrap();
            frames_tx.send(auth.to_text().unwrap().to_string()).unwrap();
            ws.send(Message::Text(r#"{"type":"auth_success","exchange_id":"ex"}"#.into()))
                .await
                .unwrap();

            let mut saw_close = false;
            while let Some(Ok(msg)) = ws.next().await {
                match msg {
                    Message::Text(text) => {
                        let _ = frames_tx.send(text);
                    }
                    Message::Close(_) => saw_close = true,
                    _ => {}
                }
            }
            saw_close
        });

        let manager = ConnectionManager::new(ConnectionConfig {
            url: format!("ws://{addr}"),
            heartbeat_interval_ms: 20,
            ..Default::default()
        });
        let (handler, _rx) = ChannelHandler::new();
        tokio_test::assert_ok!(manager.connect(SessionParams {
            api_key: "k".to_string(),
            handler: Arc::new(handler),
        }));

        let first: serde_json::Value =
            serde_json::from_str(&next_frame(&mut frames_rx).await).unwrap();
        assert_eq!(first["type"], "auth");
        assert_eq!(next_frame(&mut frames_rx).await, HEARTBEAT_PING);
        assert_eq!(next_frame(&mut frames_rx).await, HEARTBEAT_PING);

        manager.disconnect().await;
        assert_eq!(manager.state(), SessionState::Disconnected);
        assert!(server.await.unwrap(), "client should send a close frame");

        let sent = manager.heartbeat_stats().pings_sent;
        assert!(sent >= 2);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.heartbeat_stats().pings_sent, sent);
        while let Ok(frame) = frames_rx.try_recv() {
            assert_eq!(frame, HEARTBEAT_PING);
        }
    }

    #[tokio::test]
    async fn test_second_connect_rejected_while_active() {
        let manager = ConnectionManager::new(ConnectionConfig {
            url: refused_url().await,
            reconnect_base_delay_ms: 60_000,
            reconnect_max_delay_ms: 60_000,
            ..Default::default()
        });

        let (first, _rx1) = ChannelHandler::new();
        let (second, _rx2) = ChannelHandler::new();
        tokio_test::assert_ok!(manager.connect(SessionParams {
            api_key: "k".to_string(),
            handler: Arc::new(first),
        }));

        let result = manager.connect(SessionParams {
            api_key: "k".to_string(),
            handler: Arc::new(second),
        });
        assert!(matches!(result, Err(WsError::AlreadyActive)));

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_disconnect_cancels_pending_reconnect() {
        let manager = ConnectionManager::new(ConnectionConfig {
            url: refused_url().await,
            reconnect_base_delay_ms: 60_000,
            reconnect_max_delay_ms: 60_000,
            ..Default::default()
        });
        let (handler, mut rx) = ChannelHandler::new();
        manager
            .connect(SessionParams {
                api_key: "k".to_string(),
                handler: Arc::new(handler),
            })
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first, FeedEvent::Error(_)));

        let started = std::time::Instant::now();
        manager.disconnect().await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!manager.is_active());
        assert_eq!(manager.state(), SessionState::Disconnected);
        assert_eq!(manager.reconnect_count(), 1);

        // Idempotent
        manager.disconnect().await;
        assert!(rx.try_recv().is_err());
    }
}
