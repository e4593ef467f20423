//! Application configuration.

use crate::error::{AppError, AppResult};
use newswire_core::{UserPreferences, MAX_AMOUNT_PRESETS, MIN_AMOUNT_PRESETS};
use newswire_gesture::GestureConfig;
use newswire_ws::{default_terminal_close_codes, ConnectionConfig};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Backend REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_api_timeout_ms() -> u64 {
    30_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_ms: default_api_timeout_ms(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// News feed WebSocket.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_ws_url")]
    pub url: String,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Close codes after which the client stays disconnected.
    #[serde(default = "default_terminal_close_codes")]
    pub terminal_close_codes: Vec<u16>,
}

fn default_ws_url() -> String {
    "ws://localhost:3000/ws".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    16_000
}

fn default_heartbeat_interval_ms() -> u64 {
    25_000
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: default_ws_url(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            terminal_close_codes: default_terminal_close_codes(),
        }
    }
}

impl WebSocketConfig {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.url.clone(),
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_base_delay_ms: self.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.reconnect_max_delay_ms,
            heartbeat_interval_ms: self.heartbeat_interval_ms,
            terminal_close_codes: self.terminal_close_codes.clone(),
        }
    }
}

/// Coin offered on multi-coin controls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CoinConfig {
    pub symbol: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Trading defaults used when the backend has nothing better.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Fallback for `allow_trading` when the widget config is unavailable.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Simulate trades locally instead of requesting trade tokens.
    #[serde(default)]
    pub sandbox_mode: bool,
    #[serde(default = "default_amounts")]
    pub default_amounts: Vec<Decimal>,
    #[serde(default = "default_min_amount_options")]
    pub min_amount_options: usize,
    #[serde(default = "default_max_amount_options")]
    pub max_amount_options: usize,
    #[serde(default = "default_min_trade_amount")]
    pub min_trade_amount: Decimal,
    #[serde(default = "default_coins")]
    pub default_coins: Vec<CoinConfig>,
}

fn default_amounts() -> Vec<Decimal> {
    vec![Decimal::from(100), Decimal::from(250), Decimal::from(500)]
}

fn default_min_amount_options() -> usize {
    MIN_AMOUNT_PRESETS
}

fn default_max_amount_options() -> usize {
    MAX_AMOUNT_PRESETS
}

fn default_min_trade_amount() -> Decimal {
    Decimal::ONE
}

fn default_coins() -> Vec<CoinConfig> {
    [("BTC", "Bitcoin"), ("ETH", "Ethereum"), ("SOL", "Solana")]
        .into_iter()
        .map(|(symbol, name)| CoinConfig {
            symbol: symbol.to_string(),
            name: name.to_string(),
            enabled: true,
        })
        .collect()
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sandbox_mode: false,
            default_amounts: default_amounts(),
            min_amount_options: default_min_amount_options(),
            max_amount_options: default_max_amount_options(),
            min_trade_amount: default_min_trade_amount(),
            default_coins: default_coins(),
        }
    }
}

impl TradingConfig {
    /// Preferences used when the user has none stored.
    pub fn default_preferences(&self) -> UserPreferences {
        UserPreferences::with_presets(self.default_amounts.clone())
    }

    /// Symbols of the enabled coins, in configured order.
    pub fn enabled_coins(&self) -> Vec<String> {
        self.default_coins
            .iter()
            .filter(|c| c.enabled)
            .map(|c| c.symbol.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryConfig {
    /// Overrides the default log filter; `RUST_LOG` still wins.
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    /// Load from `path`, or fall back to defaults when the file does not exist.
    pub fn load_or_default(path: &str) -> AppResult<Self> {
        if !Path::new(path).exists() {
            warn!(path, "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        let trading = &self.trading;
        if trading.min_amount_options < MIN_AMOUNT_PRESETS
            || trading.max_amount_options > MAX_AMOUNT_PRESETS
            || trading.min_amount_options > trading.max_amount_options
        {
            return Err(AppError::Config(format!(
                "amount options must satisfy {MIN_AMOUNT_PRESETS} <= min <= max <= {MAX_AMOUNT_PRESETS}"
            )));
        }

        let count = trading.default_amounts.len();
        if count < trading.min_amount_options || count > trading.max_amount_options {
            return Err(AppError::Config(format!(
                "default_amounts has {count} entries, expected {}..={}",
                trading.min_amount_options, trading.max_amount_options
            )));
        }

        if trading.enabled_coins().is_empty() {
            return Err(AppError::Config("no enabled coins".to_string()));
        }

        Ok(())
    }
}
