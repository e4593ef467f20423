//! Gate in front of the dispatcher.

use crate::dispatcher::{DynTradeDispatcher, TradeConfirmation};
use crate::error::{TradeError, TradeResult};
use newswire_core::{FeatureFlags, TradeRequest};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Rejects trades the widget must not place, then dispatches the rest.
pub struct TradeService {
    dispatcher: DynTradeDispatcher,
    flags: RwLock<FeatureFlags>,
    min_trade_amount: Decimal,
}

impl TradeService {
    pub fn new(
        dispatcher: DynTradeDispatcher,
        flags: FeatureFlags,
        min_trade_amount: Decimal,
    ) -> Self {
        Self {
            dispatcher,
            flags: RwLock::new(flags),
            min_trade_amount,
        }
    }

    pub fn set_feature_flags(&self, flags: FeatureFlags) {
        *self.flags.write() = flags;
    }

    pub fn feature_flags(&self) -> FeatureFlags {
        *self.flags.read()
    }

    pub fn is_sandbox(&self) -> bool {
        self.dispatcher.is_sandbox()
    }

    /// "sandbox" or "live".
    pub fn mode(&self) -> &'static str {
        if self.is_sandbox() {
            "sandbox"
        } else {
            "live"
        }
    }

    pub async fn execute(&self, request: TradeRequest) -> TradeResult<TradeConfirmation> {
        if !self.flags.read().allow_trading {
            warn!(coin = %request.coin, "Trade rejected, trading disabled");
            return Err(TradeError::TradingDisabled);
        }
        if request.amount_usd < self.min_trade_amount {
            return Err(TradeError::InvalidAmount(format!(
                "{} is below minimum {}",
                request.amount_usd, self.min_trade_amount
            )));
        }

        debug!(
            coin = %request.coin,
            side = %request.side,
            amount_usd = %request.amount_usd,
            news_id = %request.news_id,
            mode = self.mode(),
            "Dispatching trade"
        );
        self.dispatcher.execute(request).await
    }
}
