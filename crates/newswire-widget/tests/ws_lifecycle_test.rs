//! Feed lifecycle integration tests.
//!
//! Tests the widget against a scripted feed server:
//! - Authentication and frame delivery into the store
//! - Rejected keys and terminal close codes
//! - Reconnection with re-authentication
//! - Gesture trades tied to the received news

mod integration;
use integration::common::mock_ws::{AuthReply, MockWsServer};
use integration::common::wait_until;

use newswire_core::{ButtonStyle, LongPressDuration, TradeSide};
use newswire_gesture::Point;
use newswire_widget::{AppConfig, InitOptions, InitStatus, Widget};
use newswire_ws::SessionState;
use rust_decimal_macros::dec;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(feed_url: String, api_url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.api.base_url = api_url;
    config.api.timeout_ms = 2_000;
    config.websocket.url = feed_url;
    config.websocket.reconnect_base_delay_ms = 50;
    config.websocket.reconnect_max_delay_ms = 200;
    config.trading.sandbox_mode = true;
    config
}

fn options() -> InitOptions {
    InitOptions {
        api_key: "test-key".to_string(),
        exchange_user_id: Some("user-1".to_string()),
    }
}

fn news(id: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "news",
        "data": {"_id": id, "title": format!("headline {id}"), "time": 1700000000000_i64}
    })
}

/// Test that the widget authenticates and stores pushed news.
#[tokio::test]
async fn test_news_reaches_store_after_auth() {
    let server = MockWsServer::start(AuthReply::Accept).await;
    let widget = Widget::new(config_for(server.url(), "http://127.0.0.1:1".into()));

    widget.initialize(options()).await.unwrap();
    assert_eq!(widget.status(), InitStatus::Ready);

    let store = widget.store();
    assert!(wait_until(|| store.is_connected()).await, "Should authenticate");
    assert_eq!(widget.connection().state(), SessionState::Authenticated);

    let auth = server.auth_frames().await;
    assert_eq!(auth.len(), 1);
    assert_eq!(auth[0]["api_key"], "test-key");

    server.push(news("n1"));
    server.push(serde_json::json!({
        "type": "ai_sentiment",
        "news_id": "n1",
        "sentiment": "positive"
    }));
    server.push(news("n1"));
    assert!(wait_until(|| store.sentiment("n1").is_some()).await);
    assert_eq!(store.news_len(), 1);

    widget.destroy().await;
    assert_eq!(store.news_len(), 0);
    server.shutdown().await;
}

/// Test that a rejected key surfaces an error and is not retried.
#[tokio::test]
async fn test_rejected_key_not_retried() {
    let server = MockWsServer::start(AuthReply::Reject("Invalid API key".into())).await;
    let widget = Widget::new(config_for(server.url(), "http://127.0.0.1:1".into()));

    widget.initialize(options()).await.unwrap();

    let store = widget.store();
    assert!(wait_until(|| store.connection_status().error.is_some()).await);
    assert_eq!(
        store.connection_status().error.as_deref(),
        Some("Authentication failed: Invalid API key")
    );
    assert!(!store.is_connected());

    assert!(wait_until(|| !widget.connection().is_active()).await);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connection_count().await, 1);

    widget.destroy().await;
    server.shutdown().await;
}

/// Test that a terminal close code leaves the client disconnected.
#[tokio::test]
async fn test_terminal_close_code_stops_reconnect() {
    let server = MockWsServer::start(AuthReply::Accept).await;
    let widget = Widget::new(config_for(server.url(), "http://127.0.0.1:1".into()));
    widget.initialize(options()).await.unwrap();

    let store = widget.store();
    assert!(wait_until(|| store.is_connected()).await);

    server.close_all(4001);
    assert!(wait_until(|| !store.is_connected()).await);
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(server.connection_count().await, 1);
    assert_eq!(widget.connection().state(), SessionState::Disconnected);
    assert!(store.connection_status().error.is_none());

    widget.destroy().await;
    server.shutdown().await;
}

/// Test that an abnormal close reconnects and authenticates again.
#[tokio::test]
async fn test_abnormal_close_reconnects_and_reauthenticates() {
    let server = MockWsServer::start(AuthReply::Accept).await;
    let widget = Widget::new(config_for(server.url(), "http://127.0.0.1:1".into()));
    widget.initialize(options()).await.unwrap();

    let store = widget.store();
    assert!(wait_until(|| store.is_connected()).await);

    server.close_all(4500);
    assert!(wait_until(|| widget.connection().reconnect_count() == 1).await);
    assert!(wait_until(|| store.is_connected()).await, "Should reconnect");

    assert_eq!(server.connection_count().await, 2);
    assert_eq!(server.auth_frames().await.len(), 2);

    widget.destroy().await;
    server.shutdown().await;
}

/// Test the full path from backend config to a sandbox trade on live news.
#[tokio::test]
async fn test_gesture_trade_on_received_news() {
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": {
                "exchange_id": "ex-1",
                "display_name": "Example",
                "feature_flags": {"allow_trading": true}
            }
        })))
        .mount(&api)
        .await;
    Mock::given(method("GET"))
        .and(path("/user-preferences"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": {"user_preferences": {
                "trade_amount_presets": [20, 10],
                "button_style": "standard",
                "long_press_duration": 0
            }}
        })))
        .mount(&api)
        .await;

    let server = MockWsServer::start(AuthReply::Accept).await;
    let widget = Widget::new(config_for(server.url(), api.uri()));
    widget.initialize(options()).await.unwrap();

    assert_eq!(widget.widget_config().unwrap().exchange_id, "ex-1");
    let prefs = widget.preferences();
    assert_eq!(prefs.button_style, ButtonStyle::Standard);
    assert_eq!(prefs.long_press_duration, LongPressDuration::Instant);

    let store = widget.store();
    assert!(wait_until(|| store.is_connected()).await);
    server.push(news("n1"));
    server.push(news("n2"));
    assert!(wait_until(|| store.news_len() == 2).await);
    widget.select_news(Some("n1".into()));

    let mut trades = widget.subscribe_trades();
    let ids = widget.mount_controls("ETH", 900.0).unwrap();
    assert_eq!(ids.len(), 4);

    // Long side ascending: index 1 is the 20 USD button.
    widget
        .gestures()
        .pointer_down(&ids[1], Point::new(1.0, 1.0))
        .unwrap();
    widget.gestures().pointer_up(&ids[1]).unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), trades.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.coin, "ETH");
    assert_eq!(event.side, TradeSide::Long);
    assert_eq!(event.amount_usd, dec!(20));
    assert_eq!(event.news_id, "n1");
    assert!(event.trade_id.starts_with("sandbox_"));

    widget.destroy().await;
    server.shutdown().await;
}
