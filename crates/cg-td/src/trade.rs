//! Trade adapter: order entry, cancellation, account/position/order queries
//! and reconciliation of the vendor's cumulative order callbacks.
//!
//! Requests go out through a [`TradeApi`]; callbacks arrive on vendor
//! threads through the [`TradeSpi`] impl below. Every resulting snapshot is
//! published through the shared [`GatewayEmitter`].

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use cg_core::error::Result;
use cg_core::event::GatewayEmitter;
use cg_core::types::vendor::{FgsUser, LoginAns, RspCode};
use cg_core::units::{format_vendor_time, price_from_vendor, price_to_vendor};
use cg_core::{
    AccountData, CancelRequest, GatewayError, InstrumentRegistry, OrderData, OrderRequest,
    PositionData, Status, TradeData,
};
use tracing::debug;

use crate::api::{TradeApi, TradeSpi};
use crate::mapping::{
    direction_from_position, directive_from_direction, offset_to_vendor, order_type_to_vendor,
};
use crate::order_book::OrderBook;
use crate::reconcile::{FillDelta, TradeReconciler};
use crate::vendor::{CancelOrder, Fund, HedgeFlagType, Order, OrderStatus, Position, TradeUser};

#[derive(Debug, Clone, Default)]
struct Credentials {
    username: String,
    password: String,
}

/// Order book and fill tracker, mutated together under one lock.
#[derive(Debug, Default)]
struct TradeState {
    book: OrderBook,
    reconciler: TradeReconciler,
}

/// Trade-side session adapter.
///
/// Construct with [`TradeAdapter::new`], wrap in an `Arc`, then call
/// [`connect`](TradeAdapter::connect). The adapter hands itself to the
/// vendor as the callback sink; [`close`](TradeAdapter::close) breaks that
/// cycle.
pub struct TradeAdapter {
    api: Arc<dyn TradeApi>,
    registry: Arc<InstrumentRegistry>,
    emitter: GatewayEmitter,
    credentials: Mutex<Credentials>,
    account_id: AtomicU64,
    connected: AtomicBool,
    logged_in: AtomicBool,
    /// Terminal id assigned at login; prefix of every composite order id.
    term_id: AtomicU32,
    order_ref: AtomicU64,
    request_id: AtomicU64,
    /// Armed by each successful login, disarmed once the initial queries
    /// have gone out.
    init_pending: Mutex<bool>,
    state: Mutex<TradeState>,
}

impl TradeAdapter {
    pub fn new(api: Arc<dyn TradeApi>, registry: Arc<InstrumentRegistry>, emitter: GatewayEmitter) -> Self {
        Self {
            api,
            registry,
            emitter,
            credentials: Mutex::new(Credentials::default()),
            account_id: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            logged_in: AtomicBool::new(false),
            term_id: AtomicU32::new(0),
            order_ref: AtomicU64::new(0),
            request_id: AtomicU64::new(0),
            init_pending: Mutex::new(false),
            state: Mutex::new(TradeState::default()),
        }
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Store credentials and open the session. If the transport is already
    /// up, only the login is re-sent.
    pub fn connect(
        self: &Arc<Self>,
        address: &str,
        username: &str,
        password: &str,
        account_id: u64,
    ) -> Result<()> {
        *lock(&self.credentials) =
            Credentials { username: username.to_string(), password: password.to_string() };
        self.account_id.store(account_id, Ordering::Release);

        if self.connected.load(Ordering::Acquire) {
            return self.login();
        }
        let spi: Arc<dyn TradeSpi> = self.clone();
        self.api
            .initialize(address, spi)
            .map_err(|code| self.vendor_failure("trade connect", code))
    }

    fn login(&self) -> Result<()> {
        let creds = lock(&self.credentials).clone();
        let user = TradeUser { id: self.account_id() };
        let fgs = FgsUser { login_code: creds.username, password: creds.password };
        self.api
            .req_user_login(&user, &fgs)
            .map_err(|code| self.vendor_failure("trade login request", code))
    }

    /// Release the vendor session.
    pub fn close(&self) {
        self.api.release();
        self.connected.store(false, Ordering::Release);
        self.logged_in.store(false, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Acquire)
    }

    pub fn term_id(&self) -> u32 {
        self.term_id.load(Ordering::Acquire)
    }

    fn account_id(&self) -> u64 {
        self.account_id.load(Ordering::Acquire)
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn vendor_failure(&self, what: &str, code: i32) -> GatewayError {
        let err = GatewayError::vendor(code);
        self.emitter.error_log(format!("{what} failed: {err}"));
        err
    }

    fn require_login(&self) -> Result<()> {
        if self.is_logged_in() {
            Ok(())
        } else {
            Err(GatewayError::Connection("trade session not logged in".into()))
        }
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    /// Submit an order and return its `"<gateway>.<term_id>.<order_ref>"` id.
    ///
    /// On vendor acceptance a `Submitting` order is published immediately;
    /// the authoritative record is built from the first vendor callback.
    pub fn send_order(&self, req: &OrderRequest) -> Result<String> {
        let handle = match self.registry.resolve_by_symbol(&req.symbol, req.exchange) {
            Ok(h) => h,
            Err(err) => {
                self.emitter.error_log(format!("order rejected locally: {err}"));
                return Err(err);
            }
        };
        let qty = req.volume.trunc() as i64;
        if qty < 1 {
            let err = GatewayError::Validation(format!("order volume {} below 1", req.volume));
            self.emitter.error_log(format!("order rejected locally: {err}"));
            return Err(err);
        }

        let order_ref = self.order_ref.fetch_add(1, Ordering::AcqRel) + 1;
        let order = Order {
            ukey: handle,
            account_id: self.account_id(),
            order_ref,
            directive: directive_from_direction(req.direction),
            offset_flag: offset_to_vendor(req.offset),
            hedge_flag: HedgeFlagType::Speculation,
            execution: order_type_to_vendor(req.order_type),
            qty,
            price: price_to_vendor(req.price),
        };
        self.api
            .req_send_order(&order)
            .map_err(|code| self.vendor_failure("send order", code))?;

        let orderid = format!("{}.{order_ref}", self.term_id());
        let data = req.create_order_data(orderid, self.emitter.gateway_name());
        let vt_orderid = data.vt_orderid();
        self.emitter.on_order(data);
        Ok(vt_orderid)
    }

    /// Cancel by composite order id.
    pub fn cancel_order(&self, req: &CancelRequest) -> Result<()> {
        let (term_id, order_ref) = parse_orderid(&req.orderid)?;
        let cancel = CancelOrder { account_id: self.account_id(), term_id, order_ref };
        self.api
            .req_cancel_order(&cancel)
            .map_err(|code| self.vendor_failure("cancel order", code))
    }

    /// Current record for a composite order id.
    pub fn order(&self, orderid: &str) -> Option<OrderData> {
        lock(&self.state).book.get(orderid).cloned()
    }

    /// Orders still open at the vendor.
    pub fn active_orders(&self) -> Vec<OrderData> {
        lock(&self.state).book.active_orders().cloned().collect()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn query_account(&self) -> Result<()> {
        self.require_login()?;
        self.api
            .req_query_fund(self.account_id(), self.next_request_id())
            .map_err(|code| self.vendor_failure("account query", code))
    }

    pub fn query_position(&self) -> Result<()> {
        self.require_login()?;
        self.api
            .req_query_position(self.account_id(), self.next_request_id())
            .map_err(|code| self.vendor_failure("position query", code))
    }

    pub fn query_order(&self) -> Result<()> {
        self.require_login()?;
        self.api
            .req_query_order(self.account_id(), self.next_request_id())
            .map_err(|code| self.vendor_failure("order query", code))
    }

    /// Initial account, position and order queries. Later queries still
    /// run if one fails.
    pub fn init_query(&self) -> Result<()> {
        let results = [self.query_account(), self.query_position(), self.query_order()];
        results.into_iter().collect()
    }

    /// Run [`init_query`](Self::init_query) once per login, as soon as the
    /// session is logged in and instrument discovery has completed. Called
    /// from both events; whichever arrives second issues the queries.
    ///
    /// Returns `Ok(false)` when the queries were not (yet) due.
    pub fn init_query_when_ready(&self) -> Result<bool> {
        {
            let mut pending = lock(&self.init_pending);
            if !*pending || !self.is_logged_in() || !self.registry.is_ready() {
                return Ok(false);
            }
            *pending = false;
        }
        self.init_query().map(|()| true)
    }

    // -----------------------------------------------------------------------
    // Callback processing
    // -----------------------------------------------------------------------

    /// Merge one cumulative order snapshot: update the book, publish the
    /// order, then synthesize at most one trade from the filled-quantity
    /// delta. `pushed` marks unsolicited updates (as opposed to request
    /// acknowledgements and query results).
    pub fn update_order(&self, status: &OrderStatus, pushed: bool) -> Result<()> {
        let gateway_name = self.emitter.gateway_name();
        let orderid = status.orderid();

        // Held across publish so concurrent callbacks for one order keep
        // their order on the event queue.
        let mut state = lock(&self.state);
        let order = match state.book.apply(status, &self.registry, gateway_name) {
            Ok(order) => order.clone(),
            Err(err) => {
                drop(state);
                self.emitter.error_log(format!("order update dropped: {err}"));
                return Err(err);
            }
        };

        self.emitter.on_order(order.clone());
        if pushed && order.status == Status::Rejected {
            self.emitter.warn_log(format!("order {orderid} rejected: {}", status.message));
        }

        match state.reconciler.observe(&orderid, status.trade_qty, status.trade_amt) {
            FillDelta::None => Ok(()),
            FillDelta::Regressed { previous, current } => {
                self.emitter.warn_log(format!(
                    "order {orderid} cumulative volume regressed {previous} -> {current}, no trade emitted"
                ));
                Ok(())
            }
            FillDelta::Fill { trade_id, volume, amount } => {
                let price = if amount > 0 {
                    price_from_vendor(amount) / volume as f64
                } else {
                    self.emitter.warn_log(format!(
                        "order {orderid} filled {volume} with amount delta {amount}, using order price"
                    ));
                    order.price
                };
                let time = if status.trade_time != 0 {
                    format_vendor_time(status.trade_time)
                } else {
                    order.time.clone()
                };
                self.emitter.on_trade(TradeData {
                    symbol: order.symbol,
                    exchange: order.exchange,
                    orderid,
                    tradeid: trade_id.to_string(),
                    direction: order.direction,
                    offset: order.offset,
                    price,
                    volume: volume as f64,
                    time,
                    gateway_name: gateway_name.to_string(),
                });
                Ok(())
            }
        }
    }

    pub fn update_account(&self, fund: &Fund) {
        self.emitter.on_account(AccountData {
            accountid: fund.account_id.to_string(),
            balance: price_from_vendor(fund.total_amt),
            frozen: price_from_vendor(fund.frozen_amt),
            gateway_name: self.emitter.gateway_name().to_string(),
        });
    }

    pub fn update_position(&self, position: &Position) -> Result<()> {
        let (symbol, exchange) = match self.registry.resolve_by_handle(position.ukey) {
            Ok(pair) => pair,
            Err(err) => {
                self.emitter.error_log(format!("position update dropped: {err}"));
                return Err(err);
            }
        };
        let price = if position.total_qty != 0 {
            price_from_vendor(position.total_cost) / position.total_qty as f64
        } else {
            0.0
        };
        self.emitter.on_position(PositionData {
            symbol,
            exchange,
            direction: direction_from_position(position.direction),
            volume: position.total_qty as f64,
            frozen: position.locked_avl_qty as f64,
            price,
            pnl: price_from_vendor(position.mtm_position_pl),
            yd_volume: position.overnight_qty as f64,
            gateway_name: self.emitter.gateway_name().to_string(),
        });
        Ok(())
    }

    fn check_rsp(&self, what: &str, rsp: RspCode) -> Result<()> {
        rsp.into_result().map_err(|err| {
            self.emitter.error_log(format!("{what} failed: {err}"));
            err
        })
    }
}

impl TradeSpi for TradeAdapter {
    fn on_connected(&self) -> Result<()> {
        self.connected.store(true, Ordering::Release);
        self.emitter.write_log("trade server connected");
        self.login()
    }

    fn on_disconnected(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        self.logged_in.store(false, Ordering::Release);
        self.emitter.warn_log("trade server disconnected");
        Ok(())
    }

    fn on_rsp_user_login(&self, ans: LoginAns) -> Result<()> {
        self.check_rsp("trade login", RspCode::error(ans.ret_code, ans.ret_msg))?;
        self.term_id.store(ans.id, Ordering::Release);
        self.logged_in.store(true, Ordering::Release);
        self.emitter.write_log(format!("trade login succeeded, terminal id {}", ans.id));

        *lock(&self.init_pending) = true;
        self.init_query_when_ready().map(|_| ())
    }

    fn on_rsp_error(&self, rsp: RspCode, request_id: u64) -> Result<()> {
        self.check_rsp(&format!("request {request_id}"), rsp)
    }

    fn on_rsp_send_order(&self, status: OrderStatus) -> Result<()> {
        self.update_order(&status, false)
    }

    fn on_rsp_cancel_order(&self, rsp: RspCode, cancel: CancelOrder) -> Result<()> {
        self.check_rsp(&format!("cancel {}.{}", cancel.term_id, cancel.order_ref), rsp)
    }

    fn on_rtn_order(&self, status: OrderStatus, fund: Option<Fund>, position: Option<Position>) -> Result<()> {
        let order_result = self.update_order(&status, true);
        if let Some(fund) = fund {
            self.update_account(&fund);
        }
        let position_result = match position {
            Some(position) => self.update_position(&position),
            None => Ok(()),
        };
        order_result.and(position_result)
    }

    fn on_rsp_query_fund(&self, rsp: RspCode, funds: Vec<Fund>, request_id: u64) -> Result<()> {
        self.check_rsp("account query", rsp)?;
        debug!("[trade] fund query {request_id}: {} records", funds.len());
        for fund in &funds {
            self.update_account(fund);
        }
        Ok(())
    }

    fn on_rsp_query_position(&self, rsp: RspCode, positions: Vec<Position>, request_id: u64) -> Result<()> {
        self.check_rsp("position query", rsp)?;
        debug!("[trade] position query {request_id}: {} records", positions.len());
        positions.iter().map(|p| self.update_position(p)).fold(Ok(()), |acc, r| acc.and(r))
    }

    fn on_rsp_query_order(&self, rsp: RspCode, orders: Vec<OrderStatus>, request_id: u64) -> Result<()> {
        self.check_rsp("order query", rsp)?;
        let result = orders.iter().map(|o| self.update_order(o, false)).fold(Ok(()), |acc, r| acc.and(r));
        self.emitter.write_log(format!("order query {request_id} returned {} orders", orders.len()));
        result
    }
}

/// Split `"<term_id>.<order_ref>"`.
fn parse_orderid(orderid: &str) -> Result<(u32, u64)> {
    let invalid = || GatewayError::Validation(format!("malformed order id {orderid:?}"));
    let (term, order_ref) = orderid.split_once('.').ok_or_else(invalid)?;
    Ok((term.parse().map_err(|_| invalid())?, order_ref.parse().map_err(|_| invalid())?))
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cg_core::event::{EVENT_ACCOUNT, EVENT_LOG, EVENT_ORDER, EVENT_POSITION, EVENT_TRADE, Event, EventEngine};
    use cg_core::types::vendor::ReqResult;
    use cg_core::units::pack_vendor_time;
    use cg_core::{Direction, Exchange, InstrumentHandle, LogLevel, Offset, OrderType};

    use super::*;
    use crate::vendor::{DirectiveType, ExecutionType, OffsetFlagType, OrderStatusCode, PositionDirection};

    #[derive(Default)]
    struct FakeTradeApi {
        sent: Mutex<Vec<Order>>,
        cancels: Mutex<Vec<CancelOrder>>,
        logins: Mutex<Vec<(TradeUser, FgsUser)>>,
        queries: Mutex<Vec<&'static str>>,
        reject_with: Mutex<Option<i32>>,
    }

    impl FakeTradeApi {
        fn outcome(&self) -> ReqResult {
            match *lock(&self.reject_with) {
                Some(code) => Err(code),
                None => Ok(()),
            }
        }
    }

    impl TradeApi for FakeTradeApi {
        fn initialize(&self, _address: &str, _spi: Arc<dyn TradeSpi>) -> ReqResult {
            Ok(())
        }
        fn req_user_login(&self, user: &TradeUser, fgs: &FgsUser) -> ReqResult {
            lock(&self.logins).push((user.clone(), fgs.clone()));
            Ok(())
        }
        fn req_send_order(&self, order: &Order) -> ReqResult {
            self.outcome()?;
            lock(&self.sent).push(order.clone());
            Ok(())
        }
        fn req_cancel_order(&self, cancel: &CancelOrder) -> ReqResult {
            lock(&self.cancels).push(cancel.clone());
            self.outcome()
        }
        fn req_query_fund(&self, _account_id: u64, _request_id: u64) -> ReqResult {
            lock(&self.queries).push("fund");
            Ok(())
        }
        fn req_query_position(&self, _account_id: u64, _request_id: u64) -> ReqResult {
            lock(&self.queries).push("position");
            Ok(())
        }
        fn req_query_order(&self, _account_id: u64, _request_id: u64) -> ReqResult {
            lock(&self.queries).push("order");
            Ok(())
        }
        fn release(&self) {}
    }

    struct Fixture {
        engine: EventEngine,
        api: Arc<FakeTradeApi>,
        adapter: Arc<TradeAdapter>,
    }

    fn fixture() -> Fixture {
        let engine = EventEngine::default();
        let api = Arc::new(FakeTradeApi::default());
        let registry = Arc::new(InstrumentRegistry::new());
        registry.insert(InstrumentHandle(1001), "600000", Exchange::Sse, "PF Bank");
        let emitter = GatewayEmitter::new("CHRONOS", engine.publisher());
        let adapter = Arc::new(TradeAdapter::new(api.clone(), registry, emitter));
        Fixture { engine, api, adapter }
    }

    fn logged_in() -> Fixture {
        let f = fixture();
        f.adapter.connect("ssl://trade:1", "demo", "secret", 42).unwrap();
        f.adapter.on_connected().unwrap();
        f.adapter.on_rsp_user_login(LoginAns { ret_code: 0, ret_msg: String::new(), id: 7 }).unwrap();
        drain(&f.engine);
        f
    }

    fn drain(engine: &EventEngine) -> Vec<Event> {
        let mut out = Vec::new();
        while let Some(e) = engine.try_next(Duration::from_millis(10)) {
            out.push(e);
        }
        out
    }

    fn of_type<'a>(events: &'a [Event], event_type: &str) -> Vec<&'a Event> {
        events.iter().filter(|e| e.event_type == event_type).collect()
    }

    fn buy_request() -> OrderRequest {
        OrderRequest {
            symbol: "600000".into(),
            exchange: Exchange::Sse,
            direction: Direction::Long,
            order_type: OrderType::Limit,
            volume: 100.0,
            price: 12.34,
            offset: Offset::Open,
            reference: "alpha".into(),
        }
    }

    fn snapshot(code: OrderStatusCode, trade_qty: i64, trade_amt: i64) -> OrderStatus {
        OrderStatus {
            od_term_id: 7,
            od_order_ref: 1,
            od_ukey: InstrumentHandle(1001),
            od_directive: DirectiveType::Buy,
            od_offset_flag: OffsetFlagType::Open,
            od_execution: ExecutionType::Limit,
            od_price: 123_400,
            od_qty: 500,
            od_order_time: pack_vendor_time(9, 30, 0, 20240315),
            trade_qty,
            trade_amt,
            trade_time: 0,
            status: code,
            message: String::new(),
        }
    }

    #[test]
    fn login_flow_assigns_terminal_id() {
        let f = logged_in();
        assert!(f.adapter.is_connected());
        assert!(f.adapter.is_logged_in());
        assert_eq!(f.adapter.term_id(), 7);
        let logins = lock(&f.api.logins);
        assert_eq!(logins[0].0.id, 42);
        assert_eq!(logins[0].1.login_code, "demo");
    }

    #[test]
    fn failed_login_reports_vendor_error() {
        let f = fixture();
        let err = f
            .adapter
            .on_rsp_user_login(LoginAns { ret_code: -1004, ret_msg: String::new(), id: 0 })
            .unwrap_err();
        assert_eq!(err, GatewayError::vendor(-1004));
        assert!(!f.adapter.is_logged_in());
        let events = drain(&f.engine);
        assert_eq!(of_type(&events, EVENT_LOG)[0].log().unwrap().level, LogLevel::Error);
    }

    #[test]
    fn send_order_scales_price_and_publishes_submitting() {
        let f = logged_in();
        let vt_orderid = f.adapter.send_order(&buy_request()).unwrap();
        assert_eq!(vt_orderid, "CHRONOS.7.1");

        let sent = lock(&f.api.sent);
        assert_eq!(sent[0].price, 123_400);
        assert_eq!(sent[0].qty, 100);
        assert_eq!(sent[0].ukey, InstrumentHandle(1001));
        assert_eq!(sent[0].directive, DirectiveType::Buy);

        let events = drain(&f.engine);
        let orders = of_type(&events, EVENT_ORDER);
        assert_eq!(orders.len(), 1);
        let order = orders[0].order().unwrap();
        assert_eq!(order.status, Status::Submitting);
        assert_eq!(order.reference, "alpha");
        assert!(events.iter().any(|e| e.event_type == "eOrder.CHRONOS.7.1"));
    }

    #[test]
    fn unknown_contract_never_reaches_vendor() {
        let f = logged_in();
        let mut req = buy_request();
        req.symbol = "999999".into();
        assert!(matches!(f.adapter.send_order(&req), Err(GatewayError::NotFound(_))));
        assert!(lock(&f.api.sent).is_empty());

        let events = drain(&f.engine);
        assert!(of_type(&events, EVENT_ORDER).is_empty());
        assert_eq!(of_type(&events, EVENT_LOG).len(), 1);
    }

    #[test]
    fn fractional_volume_below_one_rejected() {
        let f = logged_in();
        let mut req = buy_request();
        req.volume = 0.5;
        assert!(matches!(f.adapter.send_order(&req), Err(GatewayError::Validation(_))));
        assert!(lock(&f.api.sent).is_empty());
    }

    #[test]
    fn vendor_rejection_publishes_no_order() {
        let f = logged_in();
        *lock(&f.api.reject_with) = Some(-1012);
        assert_eq!(f.adapter.send_order(&buy_request()).unwrap_err(), GatewayError::vendor(-1012));
        let events = drain(&f.engine);
        assert!(of_type(&events, EVENT_ORDER).is_empty());
    }

    #[test]
    fn cumulative_snapshots_yield_one_trade_per_increase() {
        let f = logged_in();
        let a = &f.adapter;
        a.on_rsp_send_order(snapshot(OrderStatusCode::Reported, 0, 0)).unwrap();
        a.on_rtn_order(snapshot(OrderStatusCode::PartMatched, 100, 12_340_000), None, None).unwrap();
        a.on_rtn_order(snapshot(OrderStatusCode::PartMatched, 100, 12_340_000), None, None).unwrap();
        a.on_rtn_order(snapshot(OrderStatusCode::MatchedAll, 500, 61_700_000), None, None).unwrap();

        let events = drain(&f.engine);
        let trades: Vec<_> = of_type(&events, EVENT_TRADE).iter().map(|e| e.trade().unwrap().clone()).collect();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades.iter().map(|t| t.volume).sum::<f64>(), 500.0);
        assert_eq!(trades[0].price, 12.34);
        assert_eq!(trades[1].tradeid, "2");
        assert_eq!(of_type(&events, EVENT_ORDER).len(), 4);
        assert_eq!(a.order("7.1").unwrap().status, Status::AllTraded);
        assert!(a.active_orders().is_empty());
    }

    #[test]
    fn resent_terminal_snapshot_emits_no_trade() {
        let f = logged_in();
        let done = snapshot(OrderStatusCode::MatchedAll, 500, 61_700_000);
        f.adapter.on_rtn_order(done.clone(), None, None).unwrap();
        drain(&f.engine);

        f.adapter.on_rsp_query_order(RspCode::ok(), vec![done], 3).unwrap();
        let events = drain(&f.engine);
        assert!(of_type(&events, EVENT_TRADE).is_empty());
        assert_eq!(of_type(&events, EVENT_ORDER).len(), 1);
    }

    #[test]
    fn regressed_volume_warns_without_trade() {
        let f = logged_in();
        f.adapter.on_rtn_order(snapshot(OrderStatusCode::PartMatched, 300, 37_020_000), None, None).unwrap();
        drain(&f.engine);

        f.adapter.on_rtn_order(snapshot(OrderStatusCode::PartMatched, 200, 24_680_000), None, None).unwrap();
        let events = drain(&f.engine);
        assert!(of_type(&events, EVENT_TRADE).is_empty());
        let logs = of_type(&events, EVENT_LOG);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].log().unwrap().level, LogLevel::Warn);
        assert_eq!(f.adapter.order("7.1").unwrap().traded, 300.0);
    }

    #[test]
    fn lagging_amount_falls_back_to_order_price() {
        let f = logged_in();
        f.adapter.on_rtn_order(snapshot(OrderStatusCode::PartMatched, 100, 0), None, None).unwrap();
        let events = drain(&f.engine);
        let trades = of_type(&events, EVENT_TRADE);
        assert_eq!(trades[0].trade().unwrap().price, 12.34);
        assert_eq!(of_type(&events, EVENT_LOG).len(), 1);
    }

    #[test]
    fn pushed_rejection_logs_vendor_message() {
        let f = logged_in();
        let mut s = snapshot(OrderStatusCode::RiskBlocked, 0, 0);
        s.message = "exceeds position limit".into();
        f.adapter.on_rtn_order(s, None, None).unwrap();
        let events = drain(&f.engine);
        assert_eq!(of_type(&events, EVENT_ORDER)[0].order().unwrap().status, Status::Rejected);
        assert!(of_type(&events, EVENT_LOG)[0].log().unwrap().msg.contains("exceeds position limit"));
    }

    #[test]
    fn unknown_handle_drops_update() {
        let f = logged_in();
        let mut s = snapshot(OrderStatusCode::Reported, 0, 0);
        s.od_ukey = InstrumentHandle(5);
        assert!(matches!(f.adapter.on_rtn_order(s, None, None), Err(GatewayError::NotFound(_))));
        let events = drain(&f.engine);
        assert!(of_type(&events, EVENT_ORDER).is_empty());
        assert_eq!(of_type(&events, EVENT_LOG)[0].log().unwrap().level, LogLevel::Error);
        assert!(f.adapter.order("7.1").is_none());
    }

    #[test]
    fn pushed_fund_and_position_published() {
        let f = logged_in();
        let fund = Fund { account_id: 42, total_amt: 1_000_000_000, frozen_amt: 50_000_000 };
        let position = Position {
            ukey: InstrumentHandle(1001),
            direction: PositionDirection::Long,
            total_qty: 200,
            locked_avl_qty: 0,
            overnight_qty: 100,
            total_cost: 24_680_000,
            mtm_position_pl: 12_345,
        };
        f.adapter
            .on_rtn_order(snapshot(OrderStatusCode::Reported, 0, 0), Some(fund), Some(position))
            .unwrap();

        let events = drain(&f.engine);
        let account = of_type(&events, EVENT_ACCOUNT)[0].account().unwrap().clone();
        assert_eq!(account.balance, 100_000.0);
        assert_eq!(account.available(), 95_000.0);
        let pos = of_type(&events, EVENT_POSITION)[0].position().unwrap().clone();
        assert_eq!(pos.price, 12.34);
        assert_eq!(pos.yd_volume, 100.0);
        assert_eq!(pos.pnl, 1.2345);
    }

    #[test]
    fn cancel_parses_composite_id() {
        let f = logged_in();
        f.adapter
            .cancel_order(&CancelRequest { orderid: "7.12".into(), symbol: "600000".into(), exchange: Exchange::Sse })
            .unwrap();
        assert_eq!(lock(&f.api.cancels)[0], CancelOrder { account_id: 42, term_id: 7, order_ref: 12 });

        let bad = CancelRequest { orderid: "12".into(), symbol: "600000".into(), exchange: Exchange::Sse };
        assert!(matches!(f.adapter.cancel_order(&bad), Err(GatewayError::Validation(_))));
    }

    #[test]
    fn queries_require_login() {
        let f = fixture();
        assert!(matches!(f.adapter.query_account(), Err(GatewayError::Connection(_))));

        let f = logged_in();
        f.adapter.init_query().unwrap();
        assert_eq!(*lock(&f.api.queries), vec!["fund", "position", "order"]);
    }

    #[test]
    fn initial_queries_wait_for_discovery() {
        let f = logged_in();
        assert!(lock(&f.api.queries).is_empty());
        assert!(!f.adapter.init_query_when_ready().unwrap());

        f.adapter.registry.mark_ready();
        assert!(f.adapter.init_query_when_ready().unwrap());
        assert!(!f.adapter.init_query_when_ready().unwrap());
        assert_eq!(*lock(&f.api.queries), vec!["fund", "position", "order"]);
    }

    #[test]
    fn login_after_discovery_runs_initial_queries() {
        let f = fixture();
        f.adapter.registry.mark_ready();
        f.adapter.connect("ssl://trade:1", "demo", "secret", 42).unwrap();
        f.adapter.on_connected().unwrap();
        assert!(lock(&f.api.queries).is_empty());

        f.adapter.on_rsp_user_login(LoginAns { ret_code: 0, ret_msg: String::new(), id: 7 }).unwrap();
        assert_eq!(*lock(&f.api.queries), vec!["fund", "position", "order"]);
        // Discovery completing afterwards does not repeat them.
        assert!(!f.adapter.init_query_when_ready().unwrap());

        // A re-login issues them again.
        f.adapter.on_disconnected().unwrap();
        f.adapter.on_rsp_user_login(LoginAns { ret_code: 0, ret_msg: String::new(), id: 7 }).unwrap();
        assert_eq!(lock(&f.api.queries).len(), 6);
    }
}
