//! Feed callbacks into the store, metrics and subscribers.

use newswire_core::{FeatureFlags, NewsItem, SentimentData, VolumeAlert};
use newswire_store::NewsStore;
use newswire_telemetry::Metrics;
use newswire_ws::{FeedEvent, FeedHandler};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Capacity of the feed event broadcast.
pub const FEED_EVENT_CAPACITY: usize = 256;

/// Handler installed on the feed connection.
pub struct FeedBridge {
    store: Arc<NewsStore>,
    flags: FeatureFlags,
    events: broadcast::Sender<FeedEvent>,
}

impl FeedBridge {
    pub fn new(
        store: Arc<NewsStore>,
        flags: FeatureFlags,
        events: broadcast::Sender<FeedEvent>,
    ) -> Self {
        Self {
            store,
            flags,
            events,
        }
    }

    fn publish(&self, event: FeedEvent) {
        // No subscribers is normal for an embedded widget.
        let _ = self.events.send(event);
    }
}

impl FeedHandler for FeedBridge {
    fn on_news(&self, item: NewsItem) {
        Metrics::frame_received("news");
        if self.store.add_news_item(item.clone()) {
            self.publish(FeedEvent::News(item));
        }
    }

    fn on_sentiment(&self, data: SentimentData) {
        Metrics::frame_received("ai_sentiment");
        if !self.flags.show_sentiment {
            debug!(news_id = %data.news_id, "Sentiment hidden by feature flag");
            return;
        }
        self.store.add_sentiment(data.clone());
        self.publish(FeedEvent::Sentiment(data));
    }

    fn on_volume_alert(&self, alert: VolumeAlert) {
        Metrics::frame_received("trading_volume_alert");
        if !self.flags.show_volume_alerts {
            debug!(coin = %alert.coin, "Volume alert hidden by feature flag");
            return;
        }
        self.store.add_volume_alert(alert.clone());
        self.publish(FeedEvent::VolumeAlert(alert));
    }

    fn on_connection_change(&self, connected: bool) {
        info!(connected, "Feed connection changed");
        if connected {
            Metrics::feed_connected();
        } else {
            Metrics::feed_disconnected();
        }
        self.store.set_connection_status(connected);
        self.publish(FeedEvent::ConnectionChange(connected));
    }

    fn on_error(&self, message: String) {
        error!(%message, "Feed error");
        Metrics::feed_error();
        self.store.set_connection_error(Some(message.clone()));
        self.publish(FeedEvent::Error(message));
    }
}
