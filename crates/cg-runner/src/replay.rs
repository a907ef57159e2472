//! Offline vendor session: replays a recorded callback journal through the
//! gateway instead of a live SDK binding.
//!
//! A journal is JSON lines; blank lines and lines starting with `#` are
//! skipped. Each entry is either a vendor callback, delivered to the
//! adapter registered at `initialize`, or a terminal action run against
//! the gateway:
//!
//! ```text
//! {"kind": "trade_connected"}
//! {"kind": "trade_login", "ans": {"ret_code": 0, "id": 7}}
//! {"kind": "send_order", "req": {"symbol": "600000", "exchange": "SSE", ...}}
//! {"kind": "rtn_order", "status": {...}, "fund": null, "position": null}
//! ```

use std::io::BufRead;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use cg_core::types::vendor::{FgsUser, LoginAns, ReqResult, RspCode};
use cg_core::{CancelRequest, GatewayError, HistoryRequest, InstrumentHandle, OrderRequest, SubscribeRequest};
use cg_gateway::ChronosGateway;
use cg_md::vendor::{MarketType, MdKLine, MdSnapshot, SecurityInfo, Variety};
use cg_md::{QuoteApi, QuoteSpi};
use cg_td::vendor::{CancelOrder, Fund, Order, OrderStatus, Position, TradeUser};
use cg_td::{TradeApi, TradeSpi};
use serde::Deserialize;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Journal entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalEntry {
    // Trade callbacks
    TradeConnected,
    TradeDisconnected,
    TradeLogin { ans: LoginAns },
    TradeError { rsp: RspCode, request_id: u64 },
    RspSendOrder { status: OrderStatus },
    RspCancelOrder { rsp: RspCode, cancel: CancelOrder },
    RtnOrder {
        status: OrderStatus,
        #[serde(default)]
        fund: Option<Fund>,
        #[serde(default)]
        position: Option<Position>,
    },
    RspQueryFund { rsp: RspCode, funds: Vec<Fund>, request_id: u64 },
    RspQueryPosition { rsp: RspCode, positions: Vec<Position>, request_id: u64 },
    RspQueryOrder { rsp: RspCode, orders: Vec<OrderStatus>, request_id: u64 },

    // Quote callbacks
    QuoteConnected,
    QuoteDisconnected,
    QuoteLogin { ans: LoginAns },
    QuoteError { rsp: RspCode, request_id: u64 },
    RspSecumaster { rsp: RspCode, infos: Vec<SecurityInfo>, request_id: u64 },
    RspSnapshot {
        rsp: RspCode,
        snapshots: Vec<MdSnapshot>,
        request_id: u64,
        #[serde(default = "one")]
        page_num: u32,
        #[serde(default = "one")]
        page_cur: u32,
    },
    RtnSnapshot { snapshot: MdSnapshot },
    RspKlineMinute { rsp: RspCode, bars: Vec<MdKLine>, request_id: u64, page_num: u32, page_cur: u32 },
    RspKlineDay { rsp: RspCode, bars: Vec<MdKLine>, request_id: u64, page_num: u32, page_cur: u32 },

    // Terminal actions
    Subscribe { req: SubscribeRequest },
    SendOrder { req: OrderRequest },
    CancelOrder { req: CancelRequest },
    /// Runs on its own thread so later journal lines can deliver the pages.
    QueryHistory { req: HistoryRequest },
    Sleep { ms: u64 },
}

fn one() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Replay bindings
// ---------------------------------------------------------------------------

/// `TradeApi` that logs every request and remembers the callback sink.
#[derive(Default)]
pub struct ReplayTradeApi {
    spi: Mutex<Option<Arc<dyn TradeSpi>>>,
}

impl ReplayTradeApi {
    fn spi(&self) -> Result<Arc<dyn TradeSpi>> {
        self.spi
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| anyhow!("trade session not initialized"))
    }
}

impl TradeApi for ReplayTradeApi {
    fn initialize(&self, address: &str, spi: Arc<dyn TradeSpi>) -> ReqResult {
        info!("[replay-td] initialize {address}");
        *self.spi.lock().unwrap_or_else(|e| e.into_inner()) = Some(spi);
        Ok(())
    }

    fn req_user_login(&self, user: &TradeUser, fgs: &FgsUser) -> ReqResult {
        info!("[replay-td] login account={} user={}", user.id, fgs.login_code);
        Ok(())
    }

    fn req_send_order(&self, order: &Order) -> ReqResult {
        info!(
            "[replay-td] send ref={} ukey={} {:?} {}@{}",
            order.order_ref, order.ukey, order.directive, order.qty, order.price
        );
        Ok(())
    }

    fn req_cancel_order(&self, cancel: &CancelOrder) -> ReqResult {
        info!("[replay-td] cancel {}.{}", cancel.term_id, cancel.order_ref);
        Ok(())
    }

    fn req_query_fund(&self, account_id: u64, request_id: u64) -> ReqResult {
        debug!("[replay-td] query fund account={account_id} req={request_id}");
        Ok(())
    }

    fn req_query_position(&self, account_id: u64, request_id: u64) -> ReqResult {
        debug!("[replay-td] query position account={account_id} req={request_id}");
        Ok(())
    }

    fn req_query_order(&self, account_id: u64, request_id: u64) -> ReqResult {
        debug!("[replay-td] query order account={account_id} req={request_id}");
        Ok(())
    }

    fn release(&self) {
        self.spi.lock().unwrap_or_else(|e| e.into_inner()).take();
        info!("[replay-td] released");
    }
}

/// `QuoteApi` counterpart of [`ReplayTradeApi`].
#[derive(Default)]
pub struct ReplayQuoteApi {
    spi: Mutex<Option<Arc<dyn QuoteSpi>>>,
}

impl ReplayQuoteApi {
    fn spi(&self) -> Result<Arc<dyn QuoteSpi>> {
        self.spi
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| anyhow!("quote session not initialized"))
    }
}

impl QuoteApi for ReplayQuoteApi {
    fn initialize(&self, address: &str, spi: Arc<dyn QuoteSpi>) -> ReqResult {
        info!("[replay-md] initialize {address}");
        *self.spi.lock().unwrap_or_else(|e| e.into_inner()) = Some(spi);
        Ok(())
    }

    fn req_user_login(&self, user: &FgsUser) -> ReqResult {
        info!("[replay-md] login user={}", user.login_code);
        Ok(())
    }

    fn req_query_secumaster_by_type(&self, market: MarketType, variety: Variety, request_id: u64) -> ReqResult {
        info!("[replay-md] secumaster {market:?}/{variety:?} req={request_id}");
        Ok(())
    }

    fn req_query_md_snapshot_backward(
        &self,
        ukeys: &[InstrumentHandle],
        end_us: i64,
        count: u32,
        request_id: u64,
    ) -> ReqResult {
        debug!("[replay-md] snapshot backward {ukeys:?} end={end_us} count={count} req={request_id}");
        Ok(())
    }

    fn subscribe_md_snapshot(&self, ukeys: &[InstrumentHandle]) -> ReqResult {
        info!("[replay-md] subscribe {ukeys:?}");
        Ok(())
    }

    fn req_query_md_kline_minute(&self, ukeys: &[InstrumentHandle], start: i64, end: i64, request_id: u64) -> ReqResult {
        info!("[replay-md] minute bars {ukeys:?} {start}..{end} req={request_id}");
        Ok(())
    }

    fn req_query_md_kline_day(&self, ukeys: &[InstrumentHandle], start: i64, end: i64, request_id: u64) -> ReqResult {
        info!("[replay-md] daily bars {ukeys:?} {start}..{end} req={request_id}");
        Ok(())
    }

    fn release(&self) {
        self.spi.lock().unwrap_or_else(|e| e.into_inner()).take();
        info!("[replay-md] released");
    }
}

// ---------------------------------------------------------------------------
// Replayer
// ---------------------------------------------------------------------------

/// Counters reported after a replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub entries: usize,
    /// Entries whose callback or action returned an error.
    pub failed: usize,
    /// Bars returned by completed history queries.
    pub history_bars: usize,
}

/// Feeds journal entries to the replay bindings and the gateway.
pub struct Replayer {
    trade: Arc<ReplayTradeApi>,
    quote: Arc<ReplayQuoteApi>,
    gateway: Arc<ChronosGateway>,
    /// Outstanding history queries; each yields its bar count on success.
    history: Vec<JoinHandle<Option<usize>>>,
}

impl Replayer {
    pub fn new(trade: Arc<ReplayTradeApi>, quote: Arc<ReplayQuoteApi>, gateway: Arc<ChronosGateway>) -> Self {
        Self { trade, quote, gateway, history: Vec::new() }
    }

    /// Replay every entry of `reader`. Malformed lines abort the replay;
    /// entries rejected by the gateway are counted and skipped.
    pub fn run<R: BufRead>(&mut self, reader: R) -> Result<ReplayStats> {
        let mut stats = ReplayStats::default();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry: JournalEntry =
                serde_json::from_str(line).with_context(|| format!("journal line {}", idx + 1))?;
            stats.entries += 1;
            if let Err(err) = self.apply(entry)? {
                stats.failed += 1;
                warn!("[replay] line {}: {err}", idx + 1);
            }
        }
        for handle in self.history.drain(..) {
            match handle.join() {
                Ok(Some(bars)) => stats.history_bars += bars,
                Ok(None) => stats.failed += 1,
                Err(_) => warn!("[replay] history worker panicked"),
            }
        }
        Ok(stats)
    }

    /// Apply one entry. The outer error means the replay itself cannot
    /// continue; the inner one is the gateway's verdict on the entry.
    pub fn apply(&mut self, entry: JournalEntry) -> Result<std::result::Result<(), GatewayError>> {
        let outcome = match entry {
            JournalEntry::TradeConnected => self.trade.spi()?.on_connected(),
            JournalEntry::TradeDisconnected => self.trade.spi()?.on_disconnected(),
            JournalEntry::TradeLogin { ans } => self.trade.spi()?.on_rsp_user_login(ans),
            JournalEntry::TradeError { rsp, request_id } => self.trade.spi()?.on_rsp_error(rsp, request_id),
            JournalEntry::RspSendOrder { status } => self.trade.spi()?.on_rsp_send_order(status),
            JournalEntry::RspCancelOrder { rsp, cancel } => {
                self.trade.spi()?.on_rsp_cancel_order(rsp, cancel)
            }
            JournalEntry::RtnOrder { status, fund, position } => {
                self.trade.spi()?.on_rtn_order(status, fund, position)
            }
            JournalEntry::RspQueryFund { rsp, funds, request_id } => {
                self.trade.spi()?.on_rsp_query_fund(rsp, funds, request_id)
            }
            JournalEntry::RspQueryPosition { rsp, positions, request_id } => {
                self.trade.spi()?.on_rsp_query_position(rsp, positions, request_id)
            }
            JournalEntry::RspQueryOrder { rsp, orders, request_id } => {
                self.trade.spi()?.on_rsp_query_order(rsp, orders, request_id)
            }

            JournalEntry::QuoteConnected => self.quote.spi()?.on_connected(),
            JournalEntry::QuoteDisconnected => self.quote.spi()?.on_disconnected(),
            JournalEntry::QuoteLogin { ans } => self.quote.spi()?.on_rsp_user_login(ans),
            JournalEntry::QuoteError { rsp, request_id } => self.quote.spi()?.on_rsp_error(rsp, request_id),
            JournalEntry::RspSecumaster { rsp, infos, request_id } => {
                self.quote.spi()?.on_rsp_query_secumaster(rsp, infos, request_id)
            }
            JournalEntry::RspSnapshot { rsp, snapshots, request_id, page_num, page_cur } => {
                self.quote.spi()?.on_rsp_query_md_snapshot(rsp, snapshots, request_id, page_num, page_cur)
            }
            JournalEntry::RtnSnapshot { snapshot } => self.quote.spi()?.on_rtn_md_snapshot(snapshot),
            JournalEntry::RspKlineMinute { rsp, bars, request_id, page_num, page_cur } => {
                self.quote.spi()?.on_rsp_query_md_kline_minute(rsp, bars, request_id, page_num, page_cur)
            }
            JournalEntry::RspKlineDay { rsp, bars, request_id, page_num, page_cur } => {
                self.quote.spi()?.on_rsp_query_md_kline_day(rsp, bars, request_id, page_num, page_cur)
            }

            JournalEntry::Subscribe { req } => self.gateway.subscribe(&req),
            JournalEntry::SendOrder { req } => self.gateway.send_order(&req).map(|vt_orderid| {
                info!("[replay] submitted {vt_orderid}");
            }),
            JournalEntry::CancelOrder { req } => self.gateway.cancel_order(&req),
            JournalEntry::QueryHistory { req } => {
                self.spawn_history(req);
                Ok(())
            }
            JournalEntry::Sleep { ms } => {
                std::thread::sleep(Duration::from_millis(ms));
                Ok(())
            }
        };
        Ok(outcome)
    }

    fn spawn_history(&mut self, req: HistoryRequest) {
        let gateway = self.gateway.clone();
        let handle = std::thread::spawn(move || match gateway.query_history(&req) {
            Ok(bars) => {
                info!("[replay] history {}.{}: {} bars", req.symbol, req.exchange, bars.len());
                Some(bars.len())
            }
            Err(err) => {
                warn!("[replay] history {}.{} failed: {err}", req.symbol, req.exchange);
                None
            }
        });
        // Later lines may deliver the pages; wait until the query has
        // registered or already finished (e.g. rejected while logged out).
        while !self.gateway.is_history_pending() && !handle.is_finished() {
            std::thread::sleep(Duration::from_millis(1));
        }
        self.history.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cg_core::config::GatewaySettings;
    use cg_core::event::{EVENT_ACCOUNT, EVENT_ORDER, EVENT_TRADE, Event, EventEngine};
    use cg_core::{Exchange, Status};

    use super::*;

    const JOURNAL: &str = r#"
# bring up both sessions
{"kind": "trade_connected"}
{"kind": "trade_login", "ans": {"ret_code": 0, "id": 7}}
{"kind": "quote_connected"}
{"kind": "quote_login", "ans": {"ret_code": 0}}
{"kind": "rsp_secumaster", "rsp": {}, "request_id": 1, "infos": [{"ukey": 1001, "market_id": "SHA", "market_code": "600000", "market_abbr": "PF Bank", "major_type": "Stock", "tick_size": 100}]}
{"kind": "send_order", "req": {"symbol": "600000", "exchange": "SSE", "direction": "Long", "order_type": "Limit", "volume": 300, "price": 12.34}}
{"kind": "rsp_send_order", "status": {"od_term_id": 7, "od_order_ref": 1, "od_ukey": 1001, "od_directive": "Buy", "od_price": 123400, "od_qty": 300, "status": "Reported"}}
{"kind": "rtn_order", "status": {"od_term_id": 7, "od_order_ref": 1, "od_ukey": 1001, "od_directive": "Buy", "od_price": 123400, "od_qty": 300, "trade_qty": 100, "trade_amt": 12340000, "status": "PartMatched"}}
{"kind": "rtn_order", "status": {"od_term_id": 7, "od_order_ref": 1, "od_ukey": 1001, "od_directive": "Buy", "od_price": 123400, "od_qty": 300, "trade_qty": 300, "trade_amt": 37020000, "status": "MatchedAll"}, "fund": {"account_id": 42, "total_amt": 1000000000, "frozen_amt": 0}}
{"kind": "send_order", "req": {"symbol": "000001", "exchange": "SZSE", "direction": "Short", "order_type": "Market", "volume": 100, "price": 0}}
"#;

    fn settings() -> GatewaySettings {
        GatewaySettings {
            gateway_name: "CHRONOS".into(),
            username: "demo".into(),
            password: "secret".into(),
            account_id: 42,
            trade_address: "replay://trade".into(),
            quote_address: "replay://quote".into(),
            markets: vec![Exchange::Sse],
            history_timeout_secs: 5,
            query_every_n_timers: 0,
        }
    }

    fn replayer(engine: &EventEngine) -> (Replayer, Arc<ChronosGateway>) {
        let trade = Arc::new(ReplayTradeApi::default());
        let quote = Arc::new(ReplayQuoteApi::default());
        let gateway = Arc::new(ChronosGateway::new(&settings(), engine.publisher(), trade.clone(), quote.clone()));
        gateway.connect(&settings()).unwrap();
        (Replayer::new(trade, quote, gateway.clone()), gateway)
    }

    #[test]
    fn journal_drives_order_lifecycle() {
        let engine = EventEngine::default();
        let (mut replayer, gateway) = replayer(&engine);
        let stats = replayer.run(JOURNAL.as_bytes()).unwrap();

        assert_eq!(stats.entries, 10);
        // The SZSE instrument was never discovered.
        assert_eq!(stats.failed, 1);
        assert_eq!(gateway.order("7.1").unwrap().status, Status::AllTraded);

        let mut events: Vec<Event> = Vec::new();
        while let Some(e) = engine.try_next(Duration::from_millis(10)) {
            events.push(e);
        }
        let trades: Vec<f64> = events
            .iter()
            .filter(|e| e.event_type == EVENT_TRADE)
            .map(|e| e.trade().unwrap().volume)
            .collect();
        assert_eq!(trades, vec![100.0, 200.0]);
        assert_eq!(events.iter().filter(|e| e.event_type == EVENT_ACCOUNT).count(), 1);
        assert!(events.iter().any(|e| e.event_type == EVENT_ORDER));
    }

    const HISTORY_JOURNAL: &str = r#"
{"kind": "quote_connected"}
{"kind": "quote_login", "ans": {"ret_code": 0}}
{"kind": "rsp_secumaster", "rsp": {}, "request_id": 1, "infos": [{"ukey": 1001, "market_id": "SHA", "market_code": "600000", "major_type": "Stock"}]}
{"kind": "query_history", "req": {"symbol": "600000", "exchange": "SSE", "start": "2024-03-01T01:30:00Z", "end": "2024-03-01T07:00:00Z", "interval": "Minute"}}
{"kind": "rsp_kline_minute", "rsp": {}, "request_id": 2, "page_num": 2, "page_cur": 1, "bars": [{"ukey": 1001, "timeus": 1709256600000000, "open": 101000, "high": 101500, "low": 100500, "close": 101200, "volume": 1000}, {"ukey": 1001, "timeus": 1709256660000000, "open": 101200, "high": 101300, "low": 101000, "close": 101100, "volume": 800}]}
{"kind": "rsp_kline_minute", "rsp": {}, "request_id": 2, "page_num": 2, "page_cur": 2, "bars": [{"ukey": 1001, "timeus": 1709256720000000, "open": 101100, "high": 101100, "low": 100900, "close": 101000, "volume": 500}]}
"#;

    #[test]
    fn history_pages_following_the_query_are_assembled() {
        let engine = EventEngine::default();
        let (mut replayer, gateway) = replayer(&engine);
        let stats = replayer.run(HISTORY_JOURNAL.as_bytes()).unwrap();

        assert_eq!(stats.entries, 6);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.history_bars, 3);
        assert!(!gateway.is_history_pending());
    }

    #[test]
    fn history_rejected_while_logged_out_counts_as_failed() {
        let engine = EventEngine::default();
        let (mut replayer, gateway) = replayer(&engine);
        let line = r#"{"kind": "query_history", "req": {"symbol": "600000", "exchange": "SSE", "start": "2024-03-01T01:30:00Z", "end": "2024-03-01T07:00:00Z", "interval": "Daily"}}"#;
        let stats = replayer.run(line.as_bytes()).unwrap();
        assert_eq!(stats.failed, 1);
        assert!(!gateway.is_history_pending());
    }

    #[test]
    fn malformed_line_reports_position() {
        let engine = EventEngine::default();
        let (mut replayer, _gateway) = replayer(&engine);
        let err = replayer.run("{\"kind\": \"trade_connected\"}\n{\"kind\": \"warp\"}\n".as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("journal line 2"));
    }

    #[test]
    fn callbacks_before_initialize_abort() {
        let engine = EventEngine::default();
        let trade = Arc::new(ReplayTradeApi::default());
        let quote = Arc::new(ReplayQuoteApi::default());
        let gateway = Arc::new(ChronosGateway::new(&settings(), engine.publisher(), trade.clone(), quote.clone()));
        let mut replayer = Replayer::new(trade, quote, gateway);
        assert!(replayer.apply(JournalEntry::TradeConnected).is_err());
    }
}
