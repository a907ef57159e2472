//! Trading-related data structures: requests from the terminal and the
//! order/trade/account/position snapshots flowing back to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Direction, Exchange, Interval, Offset, OrderType, Status};

// ---------------------------------------------------------------------------
// Requests (terminal -> gateway)
// ---------------------------------------------------------------------------

/// Request to stream market snapshots for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub symbol: String,
    pub exchange: Exchange,
}

impl SubscribeRequest {
    pub fn new(symbol: impl Into<String>, exchange: Exchange) -> Self {
        Self { symbol: symbol.into(), exchange }
    }

    pub fn vt_symbol(&self) -> String {
        super::vt_symbol(&self.symbol, self.exchange)
    }
}

/// An order request sent from the terminal to the trade adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub exchange: Exchange,
    pub direction: Direction,
    pub order_type: OrderType,
    /// Order quantity. Must be positive; fractional parts are truncated at
    /// the vendor boundary.
    pub volume: f64,
    /// Limit price (ignored by the vendor for market orders).
    pub price: f64,
    #[serde(default)]
    pub offset: Offset,
    /// Free-form tag for the caller's own bookkeeping.
    #[serde(default)]
    pub reference: String,
}

impl OrderRequest {
    pub fn vt_symbol(&self) -> String {
        super::vt_symbol(&self.symbol, self.exchange)
    }

    /// Build the optimistic `Submitting` order published right after the
    /// vendor accepts the request.
    pub fn create_order_data(&self, orderid: String, gateway_name: &str) -> OrderData {
        OrderData {
            symbol: self.symbol.clone(),
            exchange: self.exchange,
            orderid,
            order_type: self.order_type,
            direction: self.direction,
            offset: self.offset,
            price: self.price,
            volume: self.volume,
            traded: 0.0,
            status: Status::Submitting,
            time: String::new(),
            reference: self.reference.clone(),
            gateway_name: gateway_name.to_string(),
        }
    }
}

/// Request to cancel a previously placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelRequest {
    /// Composite order id `"<term_id>.<order_ref>"`.
    pub orderid: String,
    pub symbol: String,
    pub exchange: Exchange,
}

/// Blocking historical bar query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub symbol: String,
    pub exchange: Exchange,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval: Interval,
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// Snapshot of one order's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderData {
    pub symbol: String,
    pub exchange: Exchange,
    /// Composite id `"<term_id>.<order_ref>"`.
    pub orderid: String,
    pub order_type: OrderType,
    pub direction: Direction,
    pub offset: Offset,
    pub price: f64,
    /// Original order quantity.
    pub volume: f64,
    /// Cumulative filled quantity.
    pub traded: f64,
    pub status: Status,
    /// `HH:MM:SS` of order creation (empty when not yet known).
    pub time: String,
    pub reference: String,
    pub gateway_name: String,
}

impl OrderData {
    pub fn vt_symbol(&self) -> String {
        super::vt_symbol(&self.symbol, self.exchange)
    }

    /// Globally unique id `"<gateway>.<orderid>"`.
    pub fn vt_orderid(&self) -> String {
        format!("{}.{}", self.gateway_name, self.orderid)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn create_cancel_request(&self) -> CancelRequest {
        CancelRequest {
            orderid: self.orderid.clone(),
            symbol: self.symbol.clone(),
            exchange: self.exchange,
        }
    }
}

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

/// A fill synthesized from a positive cumulative-quantity delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeData {
    pub symbol: String,
    pub exchange: Exchange,
    pub orderid: String,
    /// Locally generated, monotonic per trade adapter.
    pub tradeid: String,
    pub direction: Direction,
    pub offset: Offset,
    pub price: f64,
    pub volume: f64,
    pub time: String,
    pub gateway_name: String,
}

impl TradeData {
    pub fn vt_symbol(&self) -> String {
        super::vt_symbol(&self.symbol, self.exchange)
    }

    pub fn vt_tradeid(&self) -> String {
        format!("{}.{}", self.gateway_name, self.tradeid)
    }
}

// ---------------------------------------------------------------------------
// Account / position
// ---------------------------------------------------------------------------

/// Account funds snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountData {
    pub accountid: String,
    pub balance: f64,
    pub frozen: f64,
    pub gateway_name: String,
}

impl AccountData {
    pub fn available(&self) -> f64 {
        self.balance - self.frozen
    }

    pub fn vt_accountid(&self) -> String {
        format!("{}.{}", self.gateway_name, self.accountid)
    }
}

/// Position snapshot for one instrument and direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionData {
    pub symbol: String,
    pub exchange: Exchange,
    pub direction: Direction,
    pub volume: f64,
    pub frozen: f64,
    /// Average cost price.
    pub price: f64,
    pub pnl: f64,
    /// Volume carried over from the previous session.
    pub yd_volume: f64,
    pub gateway_name: String,
}

impl PositionData {
    pub fn vt_symbol(&self) -> String {
        super::vt_symbol(&self.symbol, self.exchange)
    }

    pub fn vt_positionid(&self) -> String {
        format!("{}.{:?}", self.vt_symbol(), self.direction)
    }
}
