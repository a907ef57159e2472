//! [`ChronosGateway`]: one terminal-facing object over the trade and quote
//! adapters, sharing a single instrument registry and event stream.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use cg_core::config::GatewaySettings;
use cg_core::error::Result;
use cg_core::event::{EVENT_TIMER, EventEngine, EventPublisher, GatewayEmitter, Handler, handler};
use cg_core::{
    BarData, CancelRequest, HistoryRequest, InstrumentRegistry, OrderData, OrderRequest,
    SubscribeRequest,
};
use cg_md::{QuoteAdapter, QuoteApi};
use cg_td::{TradeAdapter, TradeApi};
use tracing::{debug, info, warn};

/// Gateway facade.
///
/// # Lifecycle
///
/// 1. [`new`](ChronosGateway::new) with the vendor bindings and an event
///    publisher.
/// 2. [`connect`](ChronosGateway::connect): trade session, then quote
///    session. Quote login starts instrument discovery; once discovery
///    has completed and the trade session is logged in, the trade side
///    issues its initial account, position and order queries.
/// 3. Subscribe, trade, query. Optionally
///    [`start_polling`](ChronosGateway::start_polling) on the engine timer.
/// 4. [`close`](ChronosGateway::close) releases both vendor sessions.
pub struct ChronosGateway {
    gateway_name: String,
    registry: Arc<InstrumentRegistry>,
    trade: Arc<TradeAdapter>,
    quote: Arc<QuoteAdapter>,
    poller: Mutex<Option<Handler>>,
}

impl ChronosGateway {
    pub fn new(
        settings: &GatewaySettings,
        publisher: EventPublisher,
        trade_api: Arc<dyn TradeApi>,
        quote_api: Arc<dyn QuoteApi>,
    ) -> Self {
        let gateway_name = settings.gateway_name.clone();
        let registry = Arc::new(InstrumentRegistry::new());
        let emitter = GatewayEmitter::new(gateway_name.clone(), publisher);

        let trade = Arc::new(TradeAdapter::new(trade_api, registry.clone(), emitter.clone()));
        let quote = Arc::new(QuoteAdapter::new(
            quote_api,
            registry.clone(),
            emitter,
            settings.history_timeout(),
        ));

        // The trade login may land before or after discovery completes;
        // the trade adapter issues its initial queries on the later one.
        let init_trade = trade.clone();
        quote.set_discovery_hook(Box::new(move || {
            if let Err(err) = init_trade.init_query_when_ready() {
                warn!("[cg-gateway] initial trade queries incomplete: {err}");
            }
        }));

        Self { gateway_name, registry, trade, quote, poller: Mutex::new(None) }
    }

    pub fn gateway_name(&self) -> &str {
        &self.gateway_name
    }

    pub fn registry(&self) -> &Arc<InstrumentRegistry> {
        &self.registry
    }

    /// Open the trade session, then the quote session.
    pub fn connect(&self, settings: &GatewaySettings) -> Result<()> {
        info!(
            "[cg-gateway] connecting {} (trade {}, quote {})",
            self.gateway_name, settings.trade_address, settings.quote_address
        );
        self.trade.connect(
            &settings.trade_address,
            &settings.username,
            &settings.password,
            settings.account_id,
        )?;
        self.quote.connect(
            &settings.quote_address,
            &settings.username,
            &settings.password,
            &settings.markets,
        )
    }

    pub fn subscribe(&self, req: &SubscribeRequest) -> Result<()> {
        self.quote.subscribe(req)
    }

    /// Returns the `vt_orderid` of the submitted order.
    pub fn send_order(&self, req: &OrderRequest) -> Result<String> {
        self.trade.send_order(req)
    }

    pub fn cancel_order(&self, req: &CancelRequest) -> Result<()> {
        self.trade.cancel_order(req)
    }

    pub fn query_account(&self) -> Result<()> {
        self.trade.query_account()
    }

    pub fn query_position(&self) -> Result<()> {
        self.trade.query_position()
    }

    pub fn query_order(&self) -> Result<()> {
        self.trade.query_order()
    }

    /// Blocks until every page has arrived, the vendor fails the request,
    /// or the configured deadline passes.
    pub fn query_history(&self, req: &HistoryRequest) -> Result<Vec<BarData>> {
        self.quote.query_history(req)
    }

    pub fn is_history_pending(&self) -> bool {
        self.quote.is_history_pending()
    }

    /// Latest known state of an order by composite id.
    pub fn order(&self, orderid: &str) -> Option<OrderData> {
        self.trade.order(orderid)
    }

    pub fn active_orders(&self) -> Vec<OrderData> {
        self.trade.active_orders()
    }

    pub fn close(&self) {
        self.trade.close();
        self.quote.close();
        info!("[cg-gateway] {} closed", self.gateway_name);
    }

    // -----------------------------------------------------------------------
    // Periodic refresh
    // -----------------------------------------------------------------------

    /// Refresh account and position alternately, one query every
    /// `every_n_timers` timer events.
    ///
    /// Returns `false` if polling is already running or `every_n_timers`
    /// is zero.
    pub fn start_polling(&self, engine: &EventEngine, every_n_timers: u32) -> bool {
        if every_n_timers == 0 {
            return false;
        }
        let mut poller = self.poller.lock().unwrap_or_else(|e| e.into_inner());
        if poller.is_some() {
            return false;
        }

        let trade = self.trade.clone();
        let ticks = AtomicU32::new(0);
        let position_next = AtomicBool::new(false);
        let h = handler(move |_event| {
            if ticks.fetch_add(1, Ordering::Relaxed) + 1 < every_n_timers {
                return;
            }
            ticks.store(0, Ordering::Relaxed);
            let result = if position_next.fetch_xor(true, Ordering::Relaxed) {
                trade.query_position()
            } else {
                trade.query_account()
            };
            if let Err(err) = result {
                debug!("[cg-gateway] periodic query skipped: {err}");
            }
        });

        engine.register(EVENT_TIMER, h.clone());
        *poller = Some(h);
        true
    }

    /// Returns `false` if polling was not running.
    pub fn stop_polling(&self, engine: &EventEngine) -> bool {
        let taken = self.poller.lock().unwrap_or_else(|e| e.into_inner()).take();
        match taken {
            Some(h) => {
                engine.unregister(EVENT_TIMER, &h);
                true
            }
            None => false,
        }
    }
}
