//! Trade dispatch for the newswire widget.
//!
//! - `TradeDispatcher`: execution seam with sandbox, live and mock implementations
//! - `TradeService`: feature-flag and minimum-amount gate
//! - `ApiClient`: widget config, trade tokens and user preferences over REST

pub mod api;
pub mod dispatcher;
pub mod error;
pub mod service;

pub use api::{ApiClient, TradeParams, TradeToken, WidgetConfig};
pub use dispatcher::{
    trade_event_channel, BoxFuture, DynTradeDispatcher, ExchangeIdentity, LiveDispatcher,
    MockTradeDispatcher, SandboxDispatcher, TradeConfirmation, TradeDispatcher, TradeEvent,
};
pub use error::{TradeError, TradeResult};
pub use service::TradeService;
