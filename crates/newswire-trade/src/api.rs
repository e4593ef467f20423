//! HTTP client for the widget backend.
//!
//! Every endpoint answers with a `{success, data, error}` envelope and
//! expects the widget API key in the `X-API-Key` header.

use crate::error::{TradeError, TradeResult};
use newswire_core::{FeatureFlags, TradeSide, UserPreferences};
use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const API_KEY_HEADER: &str = "X-API-Key";

/// Response envelope shared by all endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Exchange configuration returned by `GET /config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub exchange_id: String,
    pub display_name: String,
    /// Opaque theme overrides, passed through to the host.
    #[serde(default)]
    pub theme_config: Option<serde_json::Value>,
    #[serde(default)]
    pub feature_flags: FeatureFlags,
}

/// Parameters of a trade token request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeParams {
    pub coin: String,
    pub side: TradeSide,
    pub amount_usd: Decimal,
    pub news_id: String,
    /// Unix milliseconds.
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
struct TradeTokenRequest<'a> {
    exchange_id: &'a str,
    exchange_user_id: &'a str,
    trade_params: &'a TradeParams,
}

/// Signed token the exchange redeems to place the trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeToken {
    pub token: String,
    pub trade_id: String,
}

#[derive(Debug, Deserialize)]
struct PreferencesData {
    user_preferences: Option<UserPreferences>,
}

#[derive(Debug, Serialize)]
struct SavePreferencesRequest<'a> {
    exchange_user_id: &'a str,
    user_preferences: &'a UserPreferences,
}

/// Client for the widget backend REST API.
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - API root (e.g., "https://api.example.com/v1")
    /// * `api_key` - widget API key sent with every request
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> TradeResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TradeError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the exchange configuration for this API key.
    pub async fn fetch_widget_config(&self) -> TradeResult<WidgetConfig> {
        info!(base_url = %self.base_url, "Fetching widget config");

        let request = self.client.get(self.url("/config"));
        let envelope: Envelope<WidgetConfig> = self.send(request).await?;
        require_data(envelope, "Failed to fetch widget config")
    }

    /// Request a trade token for `params`.
    pub async fn generate_trade_token(
        &self,
        exchange_id: &str,
        exchange_user_id: &str,
        params: &TradeParams,
    ) -> TradeResult<TradeToken> {
        debug!(
            coin = %params.coin,
            side = %params.side,
            amount_usd = %params.amount_usd,
            "Requesting trade token"
        );

        let body = TradeTokenRequest {
            exchange_id,
            exchange_user_id,
            trade_params: params,
        };
        let request = self
            .client
            .post(self.url("/generate-trade-token"))
            .json(&body);
        let envelope: Envelope<TradeToken> = self.send(request).await?;
        require_data(envelope, "Failed to generate trade token")
    }

    /// Stored preferences for a user, `None` when the user has none yet.
    pub async fn fetch_user_preferences(
        &self,
        exchange_user_id: &str,
    ) -> TradeResult<Option<UserPreferences>> {
        let request = self
            .client
            .get(self.url("/user-preferences"))
            .query(&[("exchange_user_id", exchange_user_id)]);
        let envelope: Envelope<PreferencesData> = self.send(request).await?;
        let data = require_data(envelope, "Failed to fetch user preferences")?;
        Ok(data.user_preferences)
    }

    pub async fn save_user_preferences(
        &self,
        exchange_user_id: &str,
        preferences: &UserPreferences,
    ) -> TradeResult<()> {
        let body = SavePreferencesRequest {
            exchange_user_id,
            user_preferences: preferences,
        };
        let request = self.client.put(self.url("/user-preferences")).json(&body);
        let envelope: Envelope<serde_json::Value> = self.send(request).await?;
        if !envelope.success {
            return Err(TradeError::Api(
                envelope
                    .error
                    .unwrap_or_else(|| "Failed to save user preferences".to_string()),
            ));
        }
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> TradeResult<Envelope<T>> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| TradeError::HttpClient(format!("HTTP request failed: {e}")))?;

        parse_envelope(response).await
    }
}

async fn parse_envelope<T: DeserializeOwned>(response: Response) -> TradeResult<Envelope<T>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(%status, "Backend request rejected");
        return Err(TradeError::HttpClient(format!("HTTP {status}: {body}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| TradeError::HttpClient(format!("Failed to read response: {e}")))?;
    Ok(serde_json::from_str(&body)?)
}

fn require_data<T>(envelope: Envelope<T>, fallback: &str) -> TradeResult<T> {
    match envelope {
        Envelope {
            success: true,
            data: Some(data),
            ..
        } => Ok(data),
        Envelope { error, .. } => Err(TradeError::Api(
            error.unwrap_or_else(|| fallback.to_string()),
        )),
    }
}
