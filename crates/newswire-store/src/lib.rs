//! In-memory widget state.
//!
//! Holds the live news history, sentiment per item, recent volume alerts,
//! the selected item and the feed connection status. The store is an
//! explicit object handed to whoever needs it, and implements
//! [`FeedHandler`] so it can be passed straight to the connection manager.

use dashmap::DashMap;
use newswire_core::{NewsItem, SentimentData, VolumeAlert};
use newswire_ws::FeedHandler;
use parking_lot::RwLock;
use std::collections::VecDeque;
use tracing::debug;

/// News history capacity; oldest items are evicted first.
pub const MAX_NEWS_ITEMS: usize = 100;

/// Volume alert capacity.
pub const MAX_VOLUME_ALERTS: usize = 10;

/// Feed connection status as last reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct NewsStore {
    /// Newest first.
    news: RwLock<VecDeque<NewsItem>>,
    sentiments: DashMap<String, SentimentData>,
    /// Newest first.
    alerts: RwLock<VecDeque<VolumeAlert>>,
    selected: RwLock<Option<String>>,
    status: RwLock<ConnectionStatus>,
}

impl NewsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the front. Returns `false` for a duplicate id.
    pub fn add_news_item(&self, item: NewsItem) -> bool {
        let mut news = self.news.write();
        if news.iter().any(|n| n.id == item.id) {
            debug!(id = %item.id, "Duplicate news item ignored");
            return false;
        }
        news.push_front(item);
        news.truncate(MAX_NEWS_ITEMS);
        true
    }

    /// Last write wins per news id.
    pub fn add_sentiment(&self, data: SentimentData) {
        self.sentiments.insert(data.news_id.clone(), data);
    }

    pub fn add_volume_alert(&self, alert: VolumeAlert) {
        let mut alerts = self.alerts.write();
        alerts.push_front(alert);
        alerts.truncate(MAX_VOLUME_ALERTS);
    }

    pub fn set_selected_news(&self, id: Option<String>) {
        *self.selected.write() = id;
    }

    /// Reporting connected clears any previous error.
    pub fn set_connection_status(&self, connected: bool) {
        let mut status = self.status.write();
        status.connected = connected;
        if connected {
            status.error = None;
        }
    }

    pub fn set_connection_error(&self, error: Option<String>) {
        self.status.write().error = error;
    }

    /// Drop news, sentiment, alerts and selection. Connection status is kept.
    pub fn clear(&self) {
        self.news.write().clear();
        self.sentiments.clear();
        self.alerts.write().clear();
        *self.selected.write() = None;
    }

    /// Snapshot of the history, newest first.
    pub fn news(&self) -> Vec<NewsItem> {
        self.news.read().iter().cloned().collect()
    }

    pub fn news_len(&self) -> usize {
        self.news.read().len()
    }

    pub fn latest_news(&self) -> Option<NewsItem> {
        self.news.read().front().cloned()
    }

    pub fn sentiment(&self, news_id: &str) -> Option<SentimentData> {
        self.sentiments.get(news_id).map(|s| s.clone())
    }

    pub fn volume_alerts(&self) -> Vec<VolumeAlert> {
        self.alerts.read().iter().cloned().collect()
    }

    pub fn selected_news(&self) -> Option<String> {
        self.selected.read().clone()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.status.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.read().connected
    }
}

impl FeedHandler for NewsStore {
    fn on_news(&self, item: NewsItem) {
        self.add_news_item(item);
    }

    fn on_sentiment(&self, data: SentimentData) {
        self.add_sentiment(data);
    }

    fn on_volume_alert(&self, alert: VolumeAlert) {
        self.add_volume_alert(alert);
    }

    fn on_connection_change(&self, connected: bool) {
        self.set_connection_status(connected);
    }

    fn on_error(&self, message: String) {
        self.set_connection_error(Some(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newswire_core::Sentiment;

    fn item(id: &str) -> NewsItem {
        serde_json::from_value(serde_json::json!({
            "_id": id,
            "title": format!("headline {id}"),
            "time": 1,
        }))
        .unwrap()
    }

    fn alert(coin: &str) -> VolumeAlert {
        serde_json::from_value(serde_json::json!({"title": "spike", "coin": coin})).unwrap()
    }

    #[test]
    fn test_news_newest_first() {
        let store = NewsStore::new();
        store.add_news_item(item("a"));
        store.add_news_item(item("b"));

        let ids: Vec<String> = store.news().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(store.latest_news().unwrap().id, "b");
    }

    #[test]
    fn test_duplicate_news_ignored() {
        let store = NewsStore::new();
        assert!(store.add_news_item(item("a")));
        assert!(store.add_news_item(item("b")));
        assert!(!store.add_news_item(item("a")));

        assert_eq!(store.news_len(), 2);
        assert_eq!(store.latest_news().unwrap().id, "b");
    }

    #[test]
    fn test_news_capped_with_oldest_evicted() {
        let store = NewsStore::new();
        for i in 0..(MAX_NEWS_ITEMS + 5) {
            store.add_news_item(item(&i.to_string()));
        }

        let news = store.news();
        assert_eq!(news.len(), MAX_NEWS_ITEMS);
        assert_eq!(news.first().unwrap().id, (MAX_NEWS_ITEMS + 4).to_string());
        assert_eq!(news.last().unwrap().id, "5");
        assert!(!news.iter().any(|n| n.id == "0"));
    }

    #[test]
    fn test_evicted_id_can_return() {
        let store = NewsStore::new();
        for i in 0..=MAX_NEWS_ITEMS {
            store.add_news_item(item(&i.to_string()));
        }
        assert!(store.add_news_item(item("0")));
    }

    #[test]
    fn test_sentiment_last_write_wins() {
        let store = NewsStore::new();
        store.add_sentiment(SentimentData {
            news_id: "a".into(),
            sentiment: Sentiment::Neutral,
            news_time: None,
        });
        store.add_sentiment(SentimentData {
            news_id: "a".into(),
            sentiment: Sentiment::Negative,
            news_time: Some(1),
        });

        assert_eq!(store.sentiment("a").unwrap().sentiment, Sentiment::Negative);
        assert!(store.sentiment("b").is_none());
    }

    #[test]
    fn test_volume_alerts_capped() {
        let store = NewsStore::new();
        for i in 0..15 {
            store.add_volume_alert(alert(&format!("C{i}")));
        }
        let alerts = store.volume_alerts();
        assert_eq!(alerts.len(), MAX_VOLUME_ALERTS);
        assert_eq!(alerts[0].coin, "C14");
    }

    #[test]
    fn test_connection_status_clears_error_on_connect() {
        let store = NewsStore::new();
        store.on_error("Max reconnection attempts reached".into());
        store.on_connection_change(false);
        assert_eq!(
            store.connection_status().error.as_deref(),
            Some("Max reconnection attempts reached")
        );

        store.on_connection_change(true);
        assert_eq!(
            store.connection_status(),
            ConnectionStatus {
                connected: true,
                error: None
            }
        );
    }

    #[test]
    fn test_clear_keeps_connection_status() {
        let store = NewsStore::new();
        store.on_news(item("a"));
        store.add_volume_alert(alert("BTC"));
        store.set_selected_news(Some("a".into()));
        store.set_connection_status(true);

        store.clear();
        assert_eq!(store.news_len(), 0);
        assert!(store.volume_alerts().is_empty());
        assert!(store.selected_news().is_none());
        assert!(store.is_connected());
    }
}
