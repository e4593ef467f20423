//! Trade intent types.

use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TradeSide {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(Self::Long),
            "short" => Ok(Self::Short),
            other => Err(CoreError::InvalidSide(other.to_string())),
        }
    }
}

/// The finalized (coin, amount, side) tuple produced by a completed gesture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub coin: String,
    /// Notional in USD.
    pub amount: Decimal,
    pub side: TradeSide,
}

impl TradeIntent {
    pub fn new(coin: impl Into<String>, amount: Decimal, side: TradeSide) -> Self {
        Self {
            coin: coin.into(),
            amount,
            side,
        }
    }

    /// Attach the news item the trade reacts to.
    pub fn into_request(self, news_id: impl Into<String>) -> TradeRequest {
        TradeRequest {
            coin: self.coin,
            amount_usd: self.amount,
            side: self.side,
            news_id: news_id.into(),
        }
    }
}

/// Request handed to the trade dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub coin: String,
    pub amount_usd: Decimal,
    pub side: TradeSide,
    pub news_id: String,
}
