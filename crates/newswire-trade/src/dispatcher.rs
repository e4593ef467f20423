//! Trade dispatcher seam and its implementations.
//!
//! The gesture pipeline hands finished [`TradeRequest`]s to a
//! [`TradeDispatcher`]. Sandbox mode simulates execution locally; live mode
//! exchanges the request for a trade token at the backend. Both publish a
//! [`TradeEvent`] for the host on success.

use crate::api::{ApiClient, TradeParams};
use crate::error::{TradeError, TradeResult};
use newswire_core::{TradeRequest, TradeSide};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Boxed future type for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Simulated execution latency in sandbox mode.
pub const SANDBOX_LATENCY: Duration = Duration::from_millis(500);

/// Capacity of the trade event channel.
pub const TRADE_EVENT_CAPACITY: usize = 64;

/// Result of a dispatched trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeConfirmation {
    pub trade_id: String,
    pub token: String,
    pub is_sandbox: bool,
}

/// Published for the host after every successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub token: String,
    pub trade_id: String,
    pub coin: String,
    pub side: TradeSide,
    pub amount_usd: Decimal,
    pub news_id: String,
    pub is_sandbox: bool,
}

impl TradeEvent {
    fn new(request: &TradeRequest, confirmation: &TradeConfirmation) -> Self {
        Self {
            token: confirmation.token.clone(),
            trade_id: confirmation.trade_id.clone(),
            coin: request.coin.clone(),
            side: request.side,
            amount_usd: request.amount_usd,
            news_id: request.news_id.clone(),
            is_sandbox: confirmation.is_sandbox,
        }
    }
}

/// Create the trade event channel.
pub fn trade_event_channel() -> (broadcast::Sender<TradeEvent>, broadcast::Receiver<TradeEvent>) {
    broadcast::channel(TRADE_EVENT_CAPACITY)
}

fn publish(events: &broadcast::Sender<TradeEvent>, event: TradeEvent) {
    if events.send(event).is_err() {
        debug!("No trade event subscribers");
    }
}

/// Executes trade requests.
///
/// This trait abstracts trade execution, allowing for:
/// - Unit testing with mock implementations
/// - Sandbox and live backends behind one interface
pub trait TradeDispatcher: Send + Sync {
    fn execute(&self, request: TradeRequest) -> BoxFuture<'_, TradeResult<TradeConfirmation>>;

    fn is_sandbox(&self) -> bool;
}

/// Arc wrapper for TradeDispatcher trait objects.
pub type DynTradeDispatcher = Arc<dyn TradeDispatcher>;

#[derive(Debug, Serialize)]
struct SandboxTokenPayload<'a> {
    trade_id: &'a str,
    coin: &'a str,
    side: TradeSide,
    amount_usd: Decimal,
    is_sandbox: bool,
}

/// Simulates execution without touching the backend.
pub struct SandboxDispatcher {
    latency: Duration,
    events: broadcast::Sender<TradeEvent>,
}

impl SandboxDispatcher {
    pub fn new(events: broadcast::Sender<TradeEvent>) -> Self {
        Self::with_latency(events, SANDBOX_LATENCY)
    }

    pub fn with_latency(events: broadcast::Sender<TradeEvent>, latency: Duration) -> Self {
        Self { latency, events }
    }

    /// `sandbox_<unix_ms>_<6 hex chars>`.
    fn trade_id() -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "sandbox_{}_{}",
            chrono::Utc::now().timestamp_millis(),
            &suffix[..6]
        )
    }

    /// `sandbox.<hex(json)>`.
    fn token(trade_id: &str, request: &TradeRequest) -> TradeResult<String> {
        let payload = SandboxTokenPayload {
            trade_id,
            coin: &request.coin,
            side: request.side,
            amount_usd: request.amount_usd,
            is_sandbox: true,
        };
        Ok(format!("sandbox.{}", hex::encode(serde_json::to_vec(&payload)?)))
    }
}

impl TradeDispatcher for SandboxDispatcher {
    fn execute(&self, request: TradeRequest) -> BoxFuture<'_, TradeResult<TradeConfirmation>> {
        Box::pin(async move {
            tokio::time::sleep(self.latency).await;

            let trade_id = Self::trade_id();
            let confirmation = TradeConfirmation {
                token: Self::token(&trade_id, &request)?,
                trade_id,
                is_sandbox: true,
            };
            info!(
                trade_id = %confirmation.trade_id,
                coin = %request.coin,
                side = %request.side,
                amount_usd = %request.amount_usd,
                "Sandbox trade executed"
            );
            publish(&self.events, TradeEvent::new(&request, &confirmation));
            Ok(confirmation)
        })
    }

    fn is_sandbox(&self) -> bool {
        true
    }
}

/// Exchange account the live dispatcher trades for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExchangeIdentity {
    pub exchange_id: Option<String>,
    pub exchange_user_id: Option<String>,
}

/// Obtains trade tokens from the backend.
pub struct LiveDispatcher {
    api: Arc<ApiClient>,
    identity: RwLock<ExchangeIdentity>,
    events: broadcast::Sender<TradeEvent>,
}

impl LiveDispatcher {
    pub fn new(
        api: Arc<ApiClient>,
        identity: ExchangeIdentity,
        events: broadcast::Sender<TradeEvent>,
    ) -> Self {
        Self {
            api,
            identity: RwLock::new(identity),
            events,
        }
    }

    /// The exchange id is only known once the widget config arrives.
    pub fn set_exchange_id(&self, exchange_id: Option<String>) {
        self.identity.write().exchange_id = exchange_id;
    }

    pub fn identity(&self) -> ExchangeIdentity {
        self.identity.read().clone()
    }
}

impl TradeDispatcher for LiveDispatcher {
    fn execute(&self, request: TradeRequest) -> BoxFuture<'_, TradeResult<TradeConfirmation>> {
        Box::pin(async move {
            let identity = self.identity();
            let exchange_id = identity
                .exchange_id
                .ok_or_else(|| TradeError::MissingIdentity("exchange_id".to_string()))?;
            let exchange_user_id = identity
                .exchange_user_id
                .ok_or_else(|| TradeError::MissingIdentity("exchange_user_id".to_string()))?;

            let params = TradeParams {
                coin: request.coin.clone(),
                side: request.side,
                amount_usd: request.amount_usd,
                news_id: request.news_id.clone(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            };
            let token = self
                .api
                .generate_trade_token(&exchange_id, &exchange_user_id, &params)
                .await?;

            let confirmation = TradeConfirmation {
                trade_id: token.trade_id,
                token: token.token,
                is_sandbox: false,
            };
            info!(
                trade_id = %confirmation.trade_id,
                coin = %request.coin,
                side = %request.side,
                amount_usd = %request.amount_usd,
                "Trade token issued"
            );
            publish(&self.events, TradeEvent::new(&request, &confirmation));
            Ok(confirmation)
        })
    }

    fn is_sandbox(&self) -> bool {
        false
    }
}

/// Mock dispatcher for testing.
#[derive(Debug, Default)]
pub struct MockTradeDispatcher {
    /// Recorded requests for verification.
    requests: Mutex<Vec<TradeRequest>>,
    /// When set, every call fails with this message.
    failure: Mutex<Option<String>>,
}

impl MockTradeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: Option<String>) {
        *self.failure.lock() = message;
    }

    pub fn get_requests(&self) -> Vec<TradeRequest> {
        self.requests.lock().clone()
    }
}

impl TradeDispatcher for MockTradeDispatcher {
    fn execute(&self, request: TradeRequest) -> BoxFuture<'_, TradeResult<TradeConfirmation>> {
        Box::pin(async move {
            let count = {
                let mut requests = self.requests.lock();
                requests.push(request);
                requests.len()
            };
            match self.failure.lock().clone() {
                Some(message) => Err(TradeError::Api(message)),
                None => Ok(TradeConfirmation {
                    trade_id: format!("mock_{count}"),
                    token: format!("mock.{count}"),
                    is_sandbox: true,
                }),
            }
        })
    }

    fn is_sandbox(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> TradeRequest {
        TradeRequest {
            coin: "BTC".into(),
            amount_usd: dec!(100),
            side: TradeSide::Long,
            news_id: "n1".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sandbox_confirmation_and_event() {
        let (tx, mut rx) = trade_event_channel();
        let dispatcher = SandboxDispatcher::new(tx);

        let started = tokio::time::Instant::now();
        let confirmation = dispatcher.execute(request()).await.unwrap();
        assert!(started.elapsed() >= SANDBOX_LATENCY);

        assert!(confirmation.is_sandbox);
        let parts: Vec<&str> = confirmation.trade_id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "sandbox");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.trade_id, confirmation.trade_id);
        assert_eq!(event.news_id, "n1");
        assert!(event.is_sandbox);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sandbox_token_decodes_to_trade_payload() {
        let (tx, _rx) = trade_event_channel();
        let dispatcher = SandboxDispatcher::with_latency(tx, Duration::ZERO);

        let confirmation = dispatcher.execute(request()).await.unwrap();
        let encoded = confirmation.token.strip_prefix("sandbox.").unwrap();
        let payload: serde_json::Value =
            serde_json::from_slice(&hex::decode(encoded).unwrap()).unwrap();

        assert_eq!(payload["trade_id"], confirmation.trade_id.as_str());
        assert_eq!(payload["coin"], "BTC");
        assert_eq!(payload["side"], "long");
        assert_eq!(payload["is_sandbox"], true);
    }

    #[tokio::test]
    async fn test_live_requires_identity() {
        let (tx, _rx) = trade_event_channel();
        let api =
            Arc::new(ApiClient::new("http://127.0.0.1:1", "k", Duration::from_secs(1)).unwrap());
        let dispatcher = LiveDispatcher::new(
            api,
            ExchangeIdentity {
                exchange_id: Some("ex-1".into()),
                exchange_user_id: None,
            },
            tx,
        );

        let err = dispatcher.execute(request()).await.unwrap_err();
        assert!(matches!(err, TradeError::MissingIdentity(ref f) if f == "exchange_user_id"));
    }

    #[tokio::test]
    async fn test_live_dispatch_publishes_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate-trade-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"token": "signed", "trade_id": "t-42"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (tx, mut rx) = trade_event_channel();
        let api = Arc::new(ApiClient::new(server.uri(), "k", Duration::from_secs(5)).unwrap());
        let dispatcher = LiveDispatcher::new(
            api,
            ExchangeIdentity {
                exchange_id: None,
                exchange_user_id: Some("user-9".into()),
            },
            tx,
        );
        dispatcher.set_exchange_id(Some("ex-1".into()));

        let confirmation = dispatcher.execute(request()).await.unwrap();
        assert_eq!(confirmation.trade_id, "t-42");
        assert!(!confirmation.is_sandbox);
        assert!(!dispatcher.is_sandbox());

        let event = rx.try_recv().unwrap();
        assert_eq!(event.token, "signed");
        assert_eq!(event.amount_usd, dec!(100));
        assert!(!event.is_sandbox);
    }

    #[tokio::test]
    async fn test_live_backend_failure_publishes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate-trade-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": "Insufficient balance"
            })))
            .mount(&server)
            .await;

        let (tx, mut rx) = trade_event_channel();
        let api = Arc::new(ApiClient::new(server.uri(), "k", Duration::from_secs(5)).unwrap());
        let dispatcher = LiveDispatcher::new(
            api,
            ExchangeIdentity {
                exchange_id: Some("ex-1".into()),
                exchange_user_id: Some("user-9".into()),
            },
            tx,
        );

        let err = dispatcher.execute(request()).await.unwrap_err();
        assert_eq!(err.to_string(), "API error: Insufficient balance");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mock_dispatcher_records_requests() {
        let dispatcher = MockTradeDispatcher::new();
        let confirmation = dispatcher.execute(request()).await.unwrap();
        assert_eq!(confirmation.trade_id, "mock_1");

        dispatcher.fail_with(Some("rejected".into()));
        assert!(dispatcher.execute(request()).await.is_err());
        assert_eq!(dispatcher.get_requests().len(), 2);
    }
}
