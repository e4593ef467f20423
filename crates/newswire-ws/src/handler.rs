//! Feed callback contract.
//!
//! The connection manager invokes exactly one callback per dispatched frame,
//! in the order frames arrive.

use newswire_core::{NewsItem, SentimentData, VolumeAlert};
use tokio::sync::mpsc;
use tracing::warn;

/// Receiver of feed callbacks.
///
/// Callbacks run on the connection task; implementations must not block.
#[cfg_attr(test, mockall::automock)]
pub trait FeedHandler: Send + Sync {
    fn on_news(&self, item: NewsItem);
    fn on_sentiment(&self, data: SentimentData);
    fn on_volume_alert(&self, alert: VolumeAlert);
    /// Authenticated-ness changed. Never called twice in a row with the same value.
    fn on_connection_change(&self, connected: bool);
    /// Session-level failure, human readable.
    fn on_error(&self, message: String);
}

/// One callback invocation, as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    News(NewsItem),
    Sentiment(SentimentData),
    VolumeAlert(VolumeAlert),
    ConnectionChange(bool),
    Error(String),
}

/// Forwards every callback into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<FeedEvent>,
}

impl ChannelHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FeedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: FeedEvent) {
        if self.tx.send(event).is_err() {
            warn!("Feed event receiver dropped");
        }
    }
}

impl FeedHandler for ChannelHandler {
    fn on_news(&self, item: NewsItem) {
        self.forward(FeedEvent::News(item));
    }

    fn on_sentiment(&self, data: SentimentData) {
        self.forward(FeedEvent::Sentiment(data));
    }

    fn on_volume_alert(&self, alert: VolumeAlert) {
        self.forward(FeedEvent::VolumeAlert(alert));
    }

    fn on_connection_change(&self, connected: bool) {
        self.forward(FeedEvent::ConnectionChange(connected));
    }

    fn on_error(&self, message: String) {
        self.forward(FeedEvent::Error(message));
    }
}
