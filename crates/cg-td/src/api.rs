//! Seams between the trade adapter and the vendor SDK binding.
//!
//! [`TradeApi`] is the request side, implemented by the binding (or a
//! replay/test double). [`TradeSpi`] is the callback side, implemented by
//! [`TradeAdapter`](crate::TradeAdapter) and invoked from vendor-owned
//! threads.
//!
//! # Lifecycle
//!
//! 1. [`initialize`](TradeApi::initialize) with the server address and the
//!    callback sink; the binding reports [`on_connected`](TradeSpi::on_connected).
//! 2. The adapter logs in; the answer arrives in
//!    [`on_rsp_user_login`](TradeSpi::on_rsp_user_login).
//! 3. Orders, cancels and queries; results arrive asynchronously.
//! 4. [`release`](TradeApi::release) drops the callback sink.

use std::sync::Arc;

use cg_core::GatewayError;
use cg_core::types::vendor::{FgsUser, LoginAns, ReqResult, RspCode};

use crate::vendor::{CancelOrder, Fund, Order, OrderStatus, Position, TradeUser};

/// Outbound trade requests. All calls return immediately; `Err` carries
/// the vendor's synchronous rejection code.
pub trait TradeApi: Send + Sync {
    fn initialize(&self, address: &str, spi: Arc<dyn TradeSpi>) -> ReqResult;

    fn req_user_login(&self, user: &TradeUser, fgs: &FgsUser) -> ReqResult;

    fn req_send_order(&self, order: &Order) -> ReqResult;

    fn req_cancel_order(&self, cancel: &CancelOrder) -> ReqResult;

    fn req_query_fund(&self, account_id: u64, request_id: u64) -> ReqResult;

    fn req_query_position(&self, account_id: u64, request_id: u64) -> ReqResult;

    fn req_query_order(&self, account_id: u64, request_id: u64) -> ReqResult;

    /// Tear down the session and drop the callback sink.
    fn release(&self);
}

/// Inbound trade callbacks.
///
/// Every callback reports whether it could be applied; the binding may log
/// the error but must keep delivering subsequent callbacks.
pub trait TradeSpi: Send + Sync {
    fn on_connected(&self) -> Result<(), GatewayError>;

    fn on_disconnected(&self) -> Result<(), GatewayError>;

    fn on_rsp_user_login(&self, ans: LoginAns) -> Result<(), GatewayError>;

    /// Asynchronous failure of an earlier request.
    fn on_rsp_error(&self, rsp: RspCode, request_id: u64) -> Result<(), GatewayError>;

    /// Acknowledgement of a submitted order, carrying its first snapshot.
    fn on_rsp_send_order(&self, status: OrderStatus) -> Result<(), GatewayError>;

    fn on_rsp_cancel_order(&self, rsp: RspCode, cancel: CancelOrder) -> Result<(), GatewayError>;

    /// Pushed order update, optionally accompanied by the affected funds
    /// and position.
    fn on_rtn_order(
        &self,
        status: OrderStatus,
        fund: Option<Fund>,
        position: Option<Position>,
    ) -> Result<(), GatewayError>;

    fn on_rsp_query_fund(
        &self,
        rsp: RspCode,
        funds: Vec<Fund>,
        request_id: u64,
    ) -> Result<(), GatewayError>;

    fn on_rsp_query_position(
        &self,
        rsp: RspCode,
        positions: Vec<Position>,
        request_id: u64,
    ) -> Result<(), GatewayError>;

    fn on_rsp_query_order(
        &self,
        rsp: RspCode,
        orders: Vec<OrderStatus>,
        request_id: u64,
    ) -> Result<(), GatewayError>;
}
