//! Trade-side vendor structs and enums.
//!
//! Field names mirror the vendor SDK. Every price-like integer (`od_price`,
//! `trade_amt`, `total_amt`, `total_cost` ...) is scaled by
//! [`PRICE_SCALE`](cg_core::units::PRICE_SCALE).

use cg_core::InstrumentHandle;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Order lifecycle codes reported by the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatusCode {
    NotApproved,
    NotReported,
    WaitReporting,
    Reported,
    PartMatched,
    MatchedAll,
    Canceling,
    MatchedCanceling,
    Canceled,
    MatchedCanceled,
    Bad,
    RiskBlocked,
}

/// Order directive (side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectiveType {
    Buy,
    Sell,
}

/// Direction of a held position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionDirection {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OffsetFlagType {
    #[default]
    None,
    Open,
    Close,
    CloseToday,
    CloseYesterday,
}

/// Price execution instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionType {
    #[default]
    Limit,
    AnyPrice,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HedgeFlagType {
    #[default]
    Speculation,
    Hedge,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Trade-session identity sent with the login request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeUser {
    /// Trading account id.
    pub id: u64,
}

/// New-order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub ukey: InstrumentHandle,
    pub account_id: u64,
    pub order_ref: u64,
    pub directive: DirectiveType,
    pub offset_flag: OffsetFlagType,
    pub hedge_flag: HedgeFlagType,
    pub execution: ExecutionType,
    pub qty: i64,
    pub price: i64,
}

/// Cancel request addressed by terminal id and order ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub account_id: u64,
    pub term_id: u32,
    pub order_ref: u64,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Full cumulative snapshot of one order, delivered on submit, on every
/// state change and in order query responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub od_term_id: u32,
    pub od_order_ref: u64,
    pub od_ukey: InstrumentHandle,
    pub od_directive: DirectiveType,
    #[serde(default)]
    pub od_offset_flag: OffsetFlagType,
    #[serde(default)]
    pub od_execution: ExecutionType,
    pub od_price: i64,
    pub od_qty: i64,
    /// Packed `HHMMSS << 32 | YYYYMMDD`.
    #[serde(default)]
    pub od_order_time: u64,
    /// Cumulative filled quantity.
    #[serde(default)]
    pub trade_qty: i64,
    /// Cumulative filled amount (price * qty, scaled).
    #[serde(default)]
    pub trade_amt: i64,
    #[serde(default)]
    pub trade_time: u64,
    pub status: OrderStatusCode,
    #[serde(default)]
    pub message: String,
}

impl OrderStatus {
    /// Composite order id `"<term_id>.<order_ref>"`.
    pub fn orderid(&self) -> String {
        format!("{}.{}", self.od_term_id, self.od_order_ref)
    }
}

/// Account funds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fund {
    pub account_id: u64,
    pub total_amt: i64,
    #[serde(default)]
    pub frozen_amt: i64,
}

/// One position record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub ukey: InstrumentHandle,
    pub direction: PositionDirection,
    pub total_qty: i64,
    #[serde(default)]
    pub locked_avl_qty: i64,
    #[serde(default)]
    pub overnight_qty: i64,
    /// Total cost of the position (scaled).
    #[serde(default)]
    pub total_cost: i64,
    /// Mark-to-market P&L (scaled).
    #[serde(default)]
    pub mtm_position_pl: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_defaults_optional_fields() {
        let s: OrderStatus = serde_json::from_str(
            r#"{"od_term_id": 7, "od_order_ref": 3, "od_ukey": 1001, "od_directive": "Sell",
                "od_price": 101500, "od_qty": 200, "status": "Reported"}"#,
        )
        .unwrap();
        assert_eq!(s.orderid(), "7.3");
        assert_eq!(s.od_ukey, InstrumentHandle(1001));
        assert_eq!(s.od_execution, ExecutionType::Limit);
        assert_eq!(s.trade_qty, 0);
        assert!(s.message.is_empty());
    }
}
