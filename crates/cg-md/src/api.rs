//! Seams between the quote adapter and the vendor SDK binding.
//!
//! [`QuoteApi`] is implemented by the binding, [`QuoteSpi`] by
//! [`QuoteAdapter`](crate::QuoteAdapter). Paged responses carry
//! `page_num` (total pages) and `page_cur` (1-based current page).

use std::sync::Arc;

use cg_core::types::vendor::{FgsUser, LoginAns, ReqResult, RspCode};
use cg_core::{GatewayError, InstrumentHandle};

use crate::vendor::{MarketType, MdKLine, MdSnapshot, SecurityInfo, Variety};

/// Outbound quote requests.
pub trait QuoteApi: Send + Sync {
    fn initialize(&self, address: &str, spi: Arc<dyn QuoteSpi>) -> ReqResult;

    fn req_user_login(&self, user: &FgsUser) -> ReqResult;

    /// Security-master listing for one market segment.
    fn req_query_secumaster_by_type(&self, market: MarketType, variety: Variety, request_id: u64) -> ReqResult;

    /// Last `count` snapshots at or before `end_us`.
    fn req_query_md_snapshot_backward(
        &self,
        ukeys: &[InstrumentHandle],
        end_us: i64,
        count: u32,
        request_id: u64,
    ) -> ReqResult;

    fn subscribe_md_snapshot(&self, ukeys: &[InstrumentHandle]) -> ReqResult;

    /// Minute bars between two epoch-second bounds.
    fn req_query_md_kline_minute(&self, ukeys: &[InstrumentHandle], start: i64, end: i64, request_id: u64) -> ReqResult;

    /// Daily bars between two epoch-second bounds.
    fn req_query_md_kline_day(&self, ukeys: &[InstrumentHandle], start: i64, end: i64, request_id: u64) -> ReqResult;

    fn release(&self);
}

/// Inbound quote callbacks.
pub trait QuoteSpi: Send + Sync {
    fn on_connected(&self) -> Result<(), GatewayError>;

    fn on_disconnected(&self) -> Result<(), GatewayError>;

    fn on_rsp_user_login(&self, ans: LoginAns) -> Result<(), GatewayError>;

    fn on_rsp_error(&self, rsp: RspCode, request_id: u64) -> Result<(), GatewayError>;

    fn on_rsp_query_secumaster(
        &self,
        rsp: RspCode,
        infos: Vec<SecurityInfo>,
        request_id: u64,
    ) -> Result<(), GatewayError>;

    fn on_rsp_query_md_snapshot(
        &self,
        rsp: RspCode,
        snapshots: Vec<MdSnapshot>,
        request_id: u64,
        page_num: u32,
        page_cur: u32,
    ) -> Result<(), GatewayError>;

    fn on_rsp_query_md_kline_minute(
        &self,
        rsp: RspCode,
        bars: Vec<MdKLine>,
        request_id: u64,
        page_num: u32,
        page_cur: u32,
    ) -> Result<(), GatewayError>;

    fn on_rsp_query_md_kline_day(
        &self,
        rsp: RspCode,
        bars: Vec<MdKLine>,
        request_id: u64,
        page_num: u32,
        page_cur: u32,
    ) -> Result<(), GatewayError>;

    fn on_rtn_md_snapshot(&self, snapshot: MdSnapshot) -> Result<(), GatewayError>;
}
