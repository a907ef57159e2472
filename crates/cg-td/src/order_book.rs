//! Current state of every order seen this session.

use ahash::AHashMap;
use cg_core::error::Result;
use cg_core::units::{format_vendor_time, price_from_vendor};
use cg_core::{GatewayError, InstrumentRegistry, OrderData};
use tracing::warn;

use crate::mapping::{direction_from_directive, offset_from_vendor, order_type_from_vendor, status_from_vendor};
use crate::vendor::OrderStatus;

/// Order records keyed by composite order id.
///
/// A record is created from the first vendor snapshot for an id and
/// mutated in place afterwards. A record in a terminal state never moves
/// back to an active one, and its filled quantity never decreases.
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: AHashMap<String, OrderData>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a vendor snapshot and return the updated record.
    ///
    /// Fails with [`GatewayError::NotFound`] when the order is new and its
    /// instrument handle is not registered; the book is left untouched.
    pub fn apply(
        &mut self,
        status: &OrderStatus,
        registry: &InstrumentRegistry,
        gateway_name: &str,
    ) -> Result<&OrderData> {
        let orderid = status.orderid();
        let new_status = status_from_vendor(status.status);
        let traded = status.trade_qty as f64;

        if !self.orders.contains_key(&orderid) {
            let (symbol, exchange) = registry.resolve_by_handle(status.od_ukey).map_err(|_| {
                GatewayError::NotFound(format!("order {orderid}: unknown instrument {}", status.od_ukey))
            })?;
            let order = OrderData {
                symbol,
                exchange,
                orderid: orderid.clone(),
                order_type: order_type_from_vendor(status.od_execution),
                direction: direction_from_directive(status.od_directive),
                offset: offset_from_vendor(status.od_offset_flag),
                price: price_from_vendor(status.od_price),
                volume: status.od_qty as f64,
                traded,
                status: new_status,
                time: format_vendor_time(status.od_order_time),
                reference: String::new(),
                gateway_name: gateway_name.to_string(),
            };
            return Ok(self.orders.entry(orderid).or_insert(order));
        }

        let Some(order) = self.orders.get_mut(&orderid) else {
            return Err(GatewayError::NotFound(orderid));
        };
        if !order.status.is_active() && new_status.is_active() {
            warn!("[order-book] stale {:?} for {orderid} ignored, already {:?}", new_status, order.status);
        } else {
            order.status = new_status;
        }
        if traded >= order.traded {
            order.traded = traded;
        }
        Ok(order)
    }

    pub fn get(&self, orderid: &str) -> Option<&OrderData> {
        self.orders.get(orderid)
    }

    /// Orders still open at the vendor.
    pub fn active_orders(&self) -> impl Iterator<Item = &OrderData> {
        self.orders.values().filter(|o| o.is_active())
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
