//! Feed payload types.
//!
//! These mirror the JSON bodies pushed by the news socket. Only the fields the
//! widget consumes are typed; anything else on a volume alert is preserved in
//! `VolumeAlert::extra`.

use serde::{Deserialize, Serialize};

/// A single news/alert/tweet item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Backend identifier, used for de-duplication.
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Publication time (Unix ms).
    pub time: i64,
    /// Item kind as reported by the backend (e.g. "news", "tweet").
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Free-form metadata (tweet author, quoted post, coins mentioned...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_time: Option<i64>,
}

/// AI-derived sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Sentiment attached to a previously delivered news item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentData {
    pub news_id: String,
    pub sentiment: Sentiment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_time: Option<i64>,
}

/// Unusual trading volume notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeAlert {
    pub title: String,
    pub coin: String,
    /// Any additional fields sent with the alert.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_item_minimal() {
        let raw = r#"{"_id": "abc", "title": "BTC ETF approved", "time": 1700000000000}"#;
        let item: NewsItem = serde_json::from_str(raw).unwrap();

        assert_eq!(item.id, "abc");
        assert_eq!(item.time, 1_700_000_000_000);
        assert!(item.body.is_none());
        assert!(item.kind.is_none());
    }

    #[test]
    fn test_news_item_kind_maps_type_field() {
        let raw = r#"{"_id": "t1", "title": "gm", "time": 1, "type": "tweet", "info": {"author": "x"}}"#;
        let item: NewsItem = serde_json::from_str(raw).unwrap();

        assert_eq!(item.kind.as_deref(), Some("tweet"));
        assert_eq!(item.info.unwrap()["author"], "x");
    }

    #[test]
    fn test_sentiment_rejects_unknown_label() {
        let raw = r#"{"news_id": "a", "sentiment": "bullish"}"#;
        assert!(serde_json::from_str::<SentimentData>(raw).is_err());
    }

    #[test]
    fn test_volume_alert_keeps_extra_fields() {
        let raw = r#"{"title": "Volume spike", "coin": "SOL", "ratio": 4.2}"#;
        let alert: VolumeAlert = serde_json::from_str(raw).unwrap();

        assert_eq!(alert.coin, "SOL");
        assert_eq!(alert.extra.get("ratio").and_then(|v| v.as_f64()), Some(4.2));
    }
}
