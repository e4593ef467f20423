//! Widget lifecycle.
//!
//! `initialize` resolves configuration from the backend (falling back to
//! local defaults), connects the news feed with the store as its handler and
//! starts the gesture → trade pipeline. `destroy` undoes all of it and leaves
//! the widget ready to be initialized again.

use crate::bridge::{FeedBridge, FEED_EVENT_CAPACITY};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use newswire_core::{ButtonStyle, FeatureFlags, TokioClock, UserPreferences};
use newswire_gesture::{
    layout_for_width, standard_buttons, ControlId, ControlKind, ControlSpec, GestureDriver,
    GestureEvent,
};
use newswire_store::NewsStore;
use newswire_telemetry::Metrics;
use newswire_trade::{
    trade_event_channel, ApiClient, DynTradeDispatcher, ExchangeIdentity, LiveDispatcher,
    SandboxDispatcher, TradeConfirmation, TradeEvent, TradeService, WidgetConfig,
};
use newswire_ws::{ConnectionManager, FeedEvent, SessionParams, SessionState};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Initialization progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// Host-supplied identity.
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub api_key: String,
    /// Required for live trading and stored preferences.
    pub exchange_user_id: Option<String>,
}

/// Resources owned while initialized.
struct Active {
    api: Arc<ApiClient>,
    trades: Arc<TradeService>,
    exchange_user_id: Option<String>,
    cancel: CancellationToken,
    pipeline: JoinHandle<mpsc::UnboundedReceiver<GestureEvent>>,
    monitor: JoinHandle<()>,
}

/// The embeddable widget.
pub struct Widget {
    config: AppConfig,
    store: Arc<NewsStore>,
    connection: Arc<ConnectionManager>,
    gestures: GestureDriver,
    /// Parked here while no pipeline is running.
    gesture_rx: Mutex<Option<mpsc::UnboundedReceiver<GestureEvent>>>,
    feed_events: broadcast::Sender<FeedEvent>,
    trade_events: broadcast::Sender<TradeEvent>,
    status: RwLock<InitStatus>,
    init_error: RwLock<Option<String>>,
    preferences: RwLock<UserPreferences>,
    widget_config: RwLock<Option<WidgetConfig>>,
    active: Mutex<Option<Active>>,
}

impl Widget {
    pub fn new(config: AppConfig) -> Self {
        let (gestures, gesture_rx) =
            GestureDriver::new(config.gesture.clone(), Arc::new(TokioClock::new()));
        let (feed_events, _) = broadcast::channel(FEED_EVENT_CAPACITY);
        let (trade_events, _) = trade_event_channel();

        Self {
            store: Arc::new(NewsStore::new()),
            connection: Arc::new(ConnectionManager::new(
                config.websocket.connection_config(),
            )),
            gestures,
            gesture_rx: Mutex::new(Some(gesture_rx)),
            feed_events,
            trade_events,
            status: RwLock::new(InitStatus::Idle),
            init_error: RwLock::new(None),
            preferences: RwLock::new(config.trading.default_preferences()),
            widget_config: RwLock::new(None),
            active: Mutex::new(None),
            config,
        }
    }

    pub async fn initialize(&self, options: InitOptions) -> AppResult<()> {
        {
            let mut status = self.status.write();
            if matches!(*status, InitStatus::Loading | InitStatus::Ready) {
                return Err(AppError::AlreadyInitialized);
            }
            *status = InitStatus::Loading;
        }
        *self.init_error.write() = None;

        match self.start(options).await {
            Ok(active) => {
                *self.active.lock() = Some(active);
                *self.status.write() = InitStatus::Ready;
                info!(sandbox = self.config.trading.sandbox_mode, "Widget ready");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Widget initialization failed");
                *self.init_error.write() = Some(e.to_string());
                *self.status.write() = InitStatus::Error;
                Err(e)
            }
        }
    }

    async fn start(&self, options: InitOptions) -> AppResult<Active> {
        let api = Arc::new(ApiClient::new(
            self.config.api.base_url.clone(),
            options.api_key.clone(),
            self.config.api.timeout(),
        )?);

        let widget_config = match api.fetch_widget_config().await {
            Ok(config) => {
                info!(exchange_id = %config.exchange_id, "Widget config loaded");
                Some(config)
            }
            Err(e) => {
                warn!(error = %e, "Widget config unavailable, using local defaults");
                None
            }
        };
        let flags = widget_config
            .as_ref()
            .map(|c| c.feature_flags)
            .unwrap_or(FeatureFlags {
                allow_trading: self.config.trading.enabled,
                ..FeatureFlags::default()
            });

        let preferences = self
            .load_preferences(&api, options.exchange_user_id.as_deref())
            .await;

        let dispatcher: DynTradeDispatcher = if self.config.trading.sandbox_mode {
            Arc::new(SandboxDispatcher::new(self.trade_events.clone()))
        } else {
            Arc::new(LiveDispatcher::new(
                api.clone(),
                ExchangeIdentity {
                    exchange_id: widget_config.as_ref().map(|c| c.exchange_id.clone()),
                    exchange_user_id: options.exchange_user_id.clone(),
                },
                self.trade_events.clone(),
            ))
        };
        let trades = Arc::new(TradeService::new(
            dispatcher,
            flags,
            self.config.trading.min_trade_amount,
        ));

        let Some(gesture_rx) = self.gesture_rx.lock().take() else {
            return Err(AppError::AlreadyInitialized);
        };

        let state_rx = self.connection.subscribe_state();
        let handler = FeedBridge::new(self.store.clone(), flags, self.feed_events.clone());
        if let Err(e) = self.connection.connect(SessionParams {
            api_key: options.api_key,
            handler: Arc::new(handler),
        }) {
            *self.gesture_rx.lock() = Some(gesture_rx);
            return Err(e.into());
        }

        *self.preferences.write() = preferences;
        *self.widget_config.write() = widget_config;

        let cancel = CancellationToken::new();
        let pipeline = tokio::spawn(run_gesture_pipeline(
            gesture_rx,
            self.store.clone(),
            trades.clone(),
            cancel.clone(),
        ));
        let monitor = tokio::spawn(monitor_feed(
            state_rx,
            self.connection.clone(),
            cancel.clone(),
        ));

        Ok(Active {
            api,
            trades,
            exchange_user_id: options.exchange_user_id,
            cancel,
            pipeline,
            monitor,
        })
    }

    async fn load_preferences(
        &self,
        api: &ApiClient,
        exchange_user_id: Option<&str>,
    ) -> UserPreferences {
        let fallback = self.config.trading.default_preferences();
        let Some(user) = exchange_user_id else {
            return fallback;
        };

        match api.fetch_user_preferences(user).await {
            Ok(Some(prefs)) => match prefs.validate(self.config.trading.min_trade_amount) {
                Ok(()) => prefs,
                Err(e) => {
                    warn!(error = %e, "Stored preferences invalid, using defaults");
                    fallback
                }
            },
            Ok(None) => fallback,
            Err(e) => {
                warn!(error = %e, "User preferences unavailable, using defaults");
                fallback
            }
        }
    }

    /// Disconnect, stop the pipeline and clear all widget state.
    pub async fn destroy(&self) {
        let active = self.active.lock().take();
        self.connection.disconnect().await;

        let ids: Vec<ControlId> = self
            .gestures
            .recognizer()
            .lock()
            .control_ids()
            .cloned()
            .collect();
        for id in &ids {
            self.gestures.remove_control(id);
        }
        self.gestures.shutdown();

        if let Some(active) = active {
            active.cancel.cancel();
            match active.pipeline.await {
                Ok(rx) => *self.gesture_rx.lock() = Some(rx),
                Err(e) => warn!(?e, "Gesture pipeline ended abnormally"),
            }
            if let Err(e) = active.monitor.await {
                warn!(?e, "Feed monitor ended abnormally");
            }
        }

        self.store.clear();
        *self.widget_config.write() = None;
        *self.preferences.write() = self.config.trading.default_preferences();
        *self.init_error.write() = None;
        *self.status.write() = InitStatus::Idle;
        info!("Widget destroyed");
    }

    /// Register the trade controls for one coin according to the user's button style.
    pub fn mount_controls(&self, coin: &str, container_width_px: f64) -> AppResult<Vec<ControlId>> {
        let prefs = self.preferences();
        match prefs.button_style {
            ButtonStyle::Standard => {
                let slots = standard_buttons(
                    coin,
                    &prefs.trade_amount_presets,
                    layout_for_width(container_width_px),
                );
                for slot in &slots {
                    self.gestures.register_control(
                        slot.id.clone(),
                        slot.control_spec(prefs.long_press_duration),
                    )?;
                }
                Ok(slots.into_iter().map(|s| s.id).collect())
            }
            ButtonStyle::Swipe => {
                let id = ControlId::new(format!("{coin}-swipe"));
                self.gestures.register_control(
                    id.clone(),
                    ControlSpec {
                        kind: ControlKind::AmountSwipe {
                            coin: coin.to_string(),
                            presets: prefs.trade_amount_presets,
                        },
                        long_press: prefs.long_press_duration,
                        width_px: container_width_px,
                    },
                )?;
                Ok(vec![id])
            }
        }
    }

    /// Register one swipe control cycling through every enabled coin.
    pub fn mount_coin_swipe(&self, width_px: f64) -> AppResult<ControlId> {
        let prefs = self.preferences();
        let id = ControlId::from("coin-swipe");
        self.gestures.register_control(
            id.clone(),
            ControlSpec {
                kind: ControlKind::CoinAndAmountSwipe {
                    coins: self.config.trading.enabled_coins(),
                    presets: prefs.trade_amount_presets,
                },
                long_press: prefs.long_press_duration,
                width_px,
            },
        )?;
        Ok(id)
    }

    /// Validate, persist (when a user is known) and apply new preferences.
    ///
    /// Already-mounted controls keep their old presets until remounted.
    pub async fn save_preferences(&self, preferences: UserPreferences) -> AppResult<()> {
        preferences.validate(self.config.trading.min_trade_amount)?;

        let (api, user) = {
            let active = self.active.lock();
            let active = active.as_ref().ok_or(AppError::NotInitialized)?;
            (active.api.clone(), active.exchange_user_id.clone())
        };
        match user {
            Some(user) => api.save_user_preferences(&user, &preferences).await?,
            None => debug!("No exchange user, preferences kept locally"),
        }

        *self.preferences.write() = preferences;
        Ok(())
    }

    /// Trades placed from gestures refer to this news item.
    pub fn select_news(&self, id: Option<String>) {
        self.store.set_selected_news(id);
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<NewsStore> {
        self.store.clone()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn gestures(&self) -> &GestureDriver {
        &self.gestures
    }

    pub fn status(&self) -> InitStatus {
        *self.status.read()
    }

    pub fn init_error(&self) -> Option<String> {
        self.init_error.read().clone()
    }

    pub fn preferences(&self) -> UserPreferences {
        self.preferences.read().clone()
    }

    pub fn widget_config(&self) -> Option<WidgetConfig> {
        self.widget_config.read().clone()
    }

    /// Effective feature flags, once initialized.
    pub fn feature_flags(&self) -> Option<FeatureFlags> {
        self.active.lock().as_ref().map(|a| a.trades.feature_flags())
    }

    pub fn subscribe_feed(&self) -> broadcast::Receiver<FeedEvent> {
        self.feed_events.subscribe()
    }

    pub fn subscribe_trades(&self) -> broadcast::Receiver<TradeEvent> {
        self.trade_events.subscribe()
    }
}

/// Turn gesture outcomes into trades until cancelled. Returns the receiver
/// so a later pipeline can reuse it.
pub async fn run_gesture_pipeline(
    mut events: mpsc::UnboundedReceiver<GestureEvent>,
    store: Arc<NewsStore>,
    trades: Arc<TradeService>,
    cancel: CancellationToken,
) -> mpsc::UnboundedReceiver<GestureEvent> {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        let Some(event) = event else {
            break;
        };

        match event {
            GestureEvent::Trade { control, intent } => {
                Metrics::gesture_outcome("trade");
                let Some(news_id) = store
                    .selected_news()
                    .or_else(|| store.latest_news().map(|n| n.id))
                else {
                    warn!(control = %control, "Trade gesture with no news item, ignored");
                    continue;
                };
                let side = intent.side;
                let result = trades.execute(intent.into_request(news_id)).await;
                record_trade(&control, side.as_str(), trades.mode(), result);
            }
            GestureEvent::PresetChanged { control, selection } => {
                Metrics::gesture_outcome("preset_changed");
                debug!(
                    control = %control,
                    coin_index = selection.coin_index,
                    amount_index = selection.amount_index,
                    "Preset changed"
                );
            }
            GestureEvent::Progress { .. } => {}
        }
    }
    debug!("Gesture pipeline stopped");
    events
}

fn record_trade(
    control: &ControlId,
    side: &str,
    mode: &str,
    result: newswire_trade::TradeResult<TradeConfirmation>,
) {
    match result {
        Ok(confirmation) => {
            Metrics::trade(side, mode, true);
            info!(control = %control, trade_id = %confirmation.trade_id, "Trade placed");
        }
        Err(e) => {
            Metrics::trade(side, mode, false);
            warn!(control = %control, error = %e, "Trade failed");
        }
    }
}

/// Mirror session state and reconnects into metrics.
async fn monitor_feed(
    mut state_rx: watch::Receiver<SessionState>,
    connection: Arc<ConnectionManager>,
    cancel: CancellationToken,
) {
    let mut reported = connection.reconnect_count();
    Metrics::feed_state_set(state_rx.borrow().as_str());

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *state_rx.borrow_and_update();
                Metrics::feed_state_set(state.as_str());

                let total = connection.reconnect_count();
                if total > reported {
                    Metrics::feed_reconnects(total - reported);
                    reported = total;
                }
            }
        }
    }
}
