//! Quote adapter: market-data session, instrument discovery, snapshot
//! subscription and historical bar queries.
//!
//! # Discovery
//!
//! After the first successful login one security-master query is issued
//! per configured market. Each request id is recorded before the request
//! goes out; when the last outstanding response has been applied the
//! shared [`InstrumentRegistry`] is marked ready and the discovery hook
//! runs (the gateway uses it to start the trade-side initial queries).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ahash::AHashMap;
use cg_core::error::Result;
use cg_core::event::GatewayEmitter;
use cg_core::types::vendor::{FgsUser, LoginAns, RspCode};
use cg_core::units::{datetime_from_us, now_us, price_from_vendor};
use cg_core::{
    BarData, ContractData, Exchange, GatewayError, HistoryRequest, InstrumentHandle,
    InstrumentRegistry, Interval, SubscribeRequest, TickData,
};
use tracing::{debug, warn};

use crate::api::{QuoteApi, QuoteSpi};
use crate::history::HistoryBridge;
use crate::mapping::{exchange_from_market, market_from_exchange, product_from_variety};
use crate::vendor::{MarketType, MdKLine, MdSnapshot, SecurityInfo, Variety};

/// Callback run once instrument discovery completes.
pub type DiscoveryHook = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct Credentials {
    username: String,
    password: String,
}

/// Quote-side session adapter.
pub struct QuoteAdapter {
    api: Arc<dyn QuoteApi>,
    registry: Arc<InstrumentRegistry>,
    emitter: GatewayEmitter,
    credentials: Mutex<Credentials>,
    markets: Mutex<Vec<Exchange>>,
    connected: AtomicBool,
    logged_in: AtomicBool,
    request_id: AtomicU64,
    /// Outstanding discovery requests, request id -> market.
    discovery: Mutex<AHashMap<u64, MarketType>>,
    /// True while a discovery round has yet to complete.
    discovering: AtomicBool,
    discovery_hook: Mutex<Option<DiscoveryHook>>,
    /// Subscribed handles in subscription order, replayed after re-login.
    subscribed: Mutex<Vec<InstrumentHandle>>,
    history: HistoryBridge,
}

impl QuoteAdapter {
    pub fn new(
        api: Arc<dyn QuoteApi>,
        registry: Arc<InstrumentRegistry>,
        emitter: GatewayEmitter,
        history_timeout: Option<Duration>,
    ) -> Self {
        let history = HistoryBridge::new(emitter.gateway_name(), history_timeout);
        Self {
            api,
            registry,
            emitter,
            credentials: Mutex::new(Credentials::default()),
            markets: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            logged_in: AtomicBool::new(false),
            request_id: AtomicU64::new(0),
            discovery: Mutex::new(AHashMap::new()),
            discovering: AtomicBool::new(false),
            discovery_hook: Mutex::new(None),
            subscribed: Mutex::new(Vec::new()),
            history,
        }
    }

    /// Install the callback run when discovery completes.
    pub fn set_discovery_hook(&self, hook: DiscoveryHook) {
        *lock(&self.discovery_hook) = Some(hook);
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    pub fn connect(
        self: &Arc<Self>,
        address: &str,
        username: &str,
        password: &str,
        markets: &[Exchange],
    ) -> Result<()> {
        *lock(&self.credentials) =
            Credentials { username: username.to_string(), password: password.to_string() };
        *lock(&self.markets) = markets.to_vec();

        if self.connected.load(Ordering::Acquire) {
            return self.login();
        }
        let spi: Arc<dyn QuoteSpi> = self.clone();
        self.api
            .initialize(address, spi)
            .map_err(|code| self.vendor_failure("quote connect", code))
    }

    fn login(&self) -> Result<()> {
        let creds = lock(&self.credentials).clone();
        let user = FgsUser { login_code: creds.username, password: creds.password };
        self.api
            .req_user_login(&user)
            .map_err(|code| self.vendor_failure("quote login request", code))
    }

    pub fn close(&self) {
        self.api.release();
        self.connected.store(false, Ordering::Release);
        self.logged_in.store(false, Ordering::Release);
        self.history.cancel(GatewayError::Connection("quote session closed".into()));
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Acquire)
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn vendor_failure(&self, what: &str, code: i32) -> GatewayError {
        let err = GatewayError::vendor(code);
        self.emitter.error_log(format!("{what} failed: {err}"));
        err
    }

    fn check_rsp(&self, what: &str, rsp: RspCode) -> Result<()> {
        rsp.into_result().map_err(|err| {
            self.emitter.error_log(format!("{what} failed: {err}"));
            err
        })
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    /// Issue one security-master query per configured market.
    ///
    /// Every request id is registered before the first request goes out,
    /// so a response delivered while later requests are still being issued
    /// cannot drain the pending set early.
    fn query_contract(&self) {
        let requests: Vec<(u64, Exchange, MarketType)> = lock(&self.markets)
            .iter()
            .map(|&exchange| (self.next_request_id(), exchange, market_from_exchange(exchange)))
            .collect();

        self.discovering.store(true, Ordering::Release);
        {
            let mut pending = lock(&self.discovery);
            pending.clear();
            pending.extend(requests.iter().map(|&(request_id, _, market)| (request_id, market)));
        }

        let mut issued = 0;
        for (request_id, exchange, market) in requests {
            if let Err(code) = self.api.req_query_secumaster_by_type(market, Variety::All, request_id) {
                self.vendor_failure(&format!("{exchange} contract query"), code);
                let drained = {
                    let mut pending = lock(&self.discovery);
                    pending.remove(&request_id).is_some() && pending.is_empty()
                };
                if drained && issued > 0 {
                    self.finish_discovery();
                }
            } else {
                issued += 1;
            }
        }

        if issued == 0 {
            self.discovering.store(false, Ordering::Release);
            self.emitter.error_log("no contract query could be issued, discovery incomplete");
        }
    }

    fn apply_security(&self, info: &SecurityInfo) {
        let exchange = exchange_from_market(info.market_id);
        self.registry.insert(info.ukey, &info.market_code, exchange, &info.market_abbr);
        self.emitter.on_contract(ContractData {
            symbol: info.market_code.clone(),
            exchange,
            name: info.market_abbr.clone(),
            product: product_from_variety(info.major_type),
            size: info.multiplier,
            pricetick: price_from_vendor(info.tick_size),
            min_volume: info.min_order_size as f64,
            net_position: true,
            history_data: true,
            gateway_name: self.emitter.gateway_name().to_string(),
        });
    }

    /// Completes the current round; later calls in the same round are no-ops.
    fn finish_discovery(&self) {
        if !self.discovering.swap(false, Ordering::AcqRel) {
            return;
        }
        self.registry.mark_ready();
        self.emitter.write_log(format!("instrument discovery complete, {} instruments", self.registry.len()));
        if let Some(hook) = lock(&self.discovery_hook).as_ref() {
            hook();
        }
    }

    // -----------------------------------------------------------------------
    // Market data
    // -----------------------------------------------------------------------

    /// Subscribe to snapshots for one instrument.
    ///
    /// The subscription is remembered and replayed after every login; while
    /// logged out it only takes effect at the next login.
    pub fn subscribe(&self, req: &SubscribeRequest) -> Result<()> {
        let handle = match self.registry.resolve_by_symbol(&req.symbol, req.exchange) {
            Ok(h) => h,
            Err(err) => {
                self.emitter.error_log(format!("subscribe failed, unknown contract {}", req.vt_symbol()));
                return Err(err);
            }
        };
        {
            let mut subscribed = lock(&self.subscribed);
            if !subscribed.contains(&handle) {
                subscribed.push(handle);
            }
        }
        if !self.is_logged_in() {
            debug!("[cg-md] {} queued until quote login", req.vt_symbol());
            return Ok(());
        }
        self.request_snapshots(&[handle])
    }

    /// Fetch the latest snapshot for `handles`, then start streaming them.
    fn request_snapshots(&self, handles: &[InstrumentHandle]) -> Result<()> {
        self.api
            .req_query_md_snapshot_backward(handles, now_us() as i64, 1, self.next_request_id())
            .map_err(|code| self.vendor_failure("snapshot query", code))?;
        self.api
            .subscribe_md_snapshot(handles)
            .map_err(|code| self.vendor_failure("snapshot subscription", code))
    }

    fn resubscribe(&self) -> Result<()> {
        let handles = lock(&self.subscribed).clone();
        if handles.is_empty() {
            return Ok(());
        }
        self.emitter.write_log(format!("re-subscribing {} instruments", handles.len()));
        self.request_snapshots(&handles)
    }

    /// Decode one snapshot and publish it as a tick.
    pub fn update_tick(&self, snapshot: &MdSnapshot) -> Result<()> {
        let (symbol, exchange) = match self.registry.resolve_by_handle(snapshot.ukey) {
            Ok(pair) => pair,
            Err(err) => {
                self.emitter.warn_log(format!("snapshot dropped: {err}"));
                return Err(err);
            }
        };
        self.emitter.on_tick(TickData {
            symbol,
            exchange,
            name: self.registry.name(snapshot.ukey).unwrap_or_default(),
            datetime: datetime_from_us(snapshot.timeus),
            volume: snapshot.volume as f64,
            last_price: price_from_vendor(snapshot.last),
            open_price: price_from_vendor(snapshot.open),
            high_price: price_from_vendor(snapshot.high),
            low_price: price_from_vendor(snapshot.low),
            pre_close: price_from_vendor(snapshot.pre_close),
            limit_up: price_from_vendor(snapshot.upper_limit),
            limit_down: price_from_vendor(snapshot.lower_limit),
            bid_prices: snapshot.bid_price.map(price_from_vendor),
            bid_volumes: snapshot.bid_volume.map(|v| v as f64),
            ask_prices: snapshot.ask_price.map(price_from_vendor),
            ask_volumes: snapshot.ask_volume.map(|v| v as f64),
            gateway_name: self.emitter.gateway_name().to_string(),
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Whether a history query is waiting for its pages.
    pub fn is_history_pending(&self) -> bool {
        self.history.is_pending()
    }

    /// Blocking bar query, routed to the minute or daily k-line request by
    /// `req.interval`.
    pub fn query_history(&self, req: &HistoryRequest) -> Result<Vec<BarData>> {
        if !self.is_logged_in() {
            return Err(GatewayError::Connection("quote session not logged in".into()));
        }
        let handle = self.registry.resolve_by_symbol(&req.symbol, req.exchange)?;
        let request_id = self.next_request_id();
        let (start, end) = (req.start.timestamp(), req.end.timestamp());

        let result = self.history.query(req.clone(), request_id, || {
            let issued = match req.interval {
                Interval::Minute => self.api.req_query_md_kline_minute(&[handle], start, end, request_id),
                Interval::Daily => self.api.req_query_md_kline_day(&[handle], start, end, request_id),
            };
            issued.map_err(GatewayError::vendor)
        });
        match &result {
            Ok(bars) => debug!("[cg-md] history {} returned {} bars", req.symbol, bars.len()),
            Err(err) => self.emitter.error_log(format!("history query for {} failed: {err}", req.symbol)),
        }
        result
    }

    fn on_kline_page(
        &self,
        rsp: RspCode,
        bars: &[MdKLine],
        request_id: u64,
        page_num: u32,
        page_cur: u32,
    ) -> Result<()> {
        self.history.on_page(rsp, bars, request_id, page_num, page_cur)
    }
}

impl QuoteSpi for QuoteAdapter {
    fn on_connected(&self) -> Result<()> {
        self.connected.store(true, Ordering::Release);
        self.emitter.write_log("quote server connected");
        self.login()
    }

    fn on_disconnected(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        self.logged_in.store(false, Ordering::Release);
        self.history.cancel(GatewayError::Connection("quote server disconnected".into()));
        self.emitter.warn_log("quote server disconnected");
        Ok(())
    }

    fn on_rsp_user_login(&self, ans: LoginAns) -> Result<()> {
        self.check_rsp("quote login", RspCode::error(ans.ret_code, ans.ret_msg))?;
        self.logged_in.store(true, Ordering::Release);
        self.emitter.write_log("quote login succeeded");

        if self.registry.is_ready() {
            self.resubscribe()
        } else {
            self.query_contract();
            Ok(())
        }
    }

    fn on_rsp_error(&self, rsp: RspCode, request_id: u64) -> Result<()> {
        self.check_rsp(&format!("quote request {request_id}"), rsp)
    }

    fn on_rsp_query_secumaster(&self, rsp: RspCode, infos: Vec<SecurityInfo>, request_id: u64) -> Result<()> {
        let Some(market) = lock(&self.discovery).get(&request_id).copied() else {
            warn!("[cg-md] secumaster response {request_id} not outstanding, ignored");
            return Ok(());
        };

        let exchange = exchange_from_market(market);
        let result = self.check_rsp(&format!("{exchange} contract query"), rsp);
        if result.is_ok() {
            for info in &infos {
                self.apply_security(info);
            }
            self.emitter.write_log(format!("{exchange} contracts loaded: {}", infos.len()));
        }

        // Removed only after the contracts are registered so the last
        // response to finish is the one that completes discovery.
        let complete = {
            let mut pending = lock(&self.discovery);
            pending.remove(&request_id).is_some() && pending.is_empty()
        };
        if complete {
            self.finish_discovery();
        }
        result
    }

    fn on_rsp_query_md_snapshot(
        &self,
        rsp: RspCode,
        snapshots: Vec<MdSnapshot>,
        request_id: u64,
        _page_num: u32,
        _page_cur: u32,
    ) -> Result<()> {
        self.check_rsp(&format!("snapshot query {request_id}"), rsp)?;
        snapshots.iter().map(|s| self.update_tick(s)).fold(Ok(()), |acc, r| acc.and(r))
    }

    fn on_rsp_query_md_kline_minute(
        &self,
        rsp: RspCode,
        bars: Vec<MdKLine>,
        request_id: u64,
        page_num: u32,
        page_cur: u32,
    ) -> Result<()> {
        self.on_kline_page(rsp, &bars, request_id, page_num, page_cur)
    }

    fn on_rsp_query_md_kline_day(
        &self,
        rsp: RspCode,
        bars: Vec<MdKLine>,
        request_id: u64,
        page_num: u32,
        page_cur: u32,
    ) -> Result<()> {
        self.on_kline_page(rsp, &bars, request_id, page_num, page_cur)
    }

    fn on_rtn_md_snapshot(&self, snapshot: MdSnapshot) -> Result<()> {
        self.update_tick(&snapshot)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
