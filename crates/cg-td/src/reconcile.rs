//! Fill synthesis from cumulative order snapshots.
//!
//! The vendor never reports individual fills: every order callback carries
//! the order's cumulative filled quantity and amount. [`TradeReconciler`]
//! keeps a per-order high-water mark and turns each positive increase into
//! exactly one fill, so a re-delivered or out-of-order snapshot can never
//! produce a duplicate trade.

use ahash::AHashMap;

/// Last cumulative counters seen for one order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cumulative {
    qty: i64,
    amt: i64,
}

/// Result of feeding one snapshot into the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillDelta {
    /// Cumulative quantity unchanged.
    None,

    /// Quantity grew; `amount` is the scaled amount delta and may be
    /// non-positive when the vendor's amount lags its quantity.
    Fill { trade_id: u64, volume: i64, amount: i64 },

    /// Quantity went backwards. The high-water mark is kept.
    Regressed { previous: i64, current: i64 },
}

/// Per-order cumulative-delta tracker.
///
/// # Thread safety
///
/// Not thread-safe. The trade adapter owns it behind the same lock as its
/// order book so delta computation and order updates stay atomic.
#[derive(Debug, Default)]
pub struct TradeReconciler {
    last: AHashMap<String, Cumulative>,
    trade_seq: u64,
}

impl TradeReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `traded_qty`/`traded_amt` against the stored snapshot for
    /// `orderid` and record the new high-water mark.
    ///
    /// The first snapshot for an order is measured against zero.
    pub fn observe(&mut self, orderid: &str, traded_qty: i64, traded_amt: i64) -> FillDelta {
        let entry = self.last.entry(orderid.to_string()).or_default();

        if traded_qty < entry.qty {
            return FillDelta::Regressed { previous: entry.qty, current: traded_qty };
        }

        let volume = traded_qty - entry.qty;
        let amount = traded_amt - entry.amt;
        entry.qty = traded_qty;
        entry.amt = entry.amt.max(traded_amt);

        if volume == 0 {
            return FillDelta::None;
        }
        self.trade_seq += 1;
        FillDelta::Fill { trade_id: self.trade_seq, volume, amount }
    }

    /// Last recorded cumulative quantity for an order, or `None`.
    pub fn last_qty(&self, orderid: &str) -> Option<i64> {
        self.last.get(orderid).map(|c| c.qty)
    }

    /// Number of trades synthesized so far.
    pub fn trade_count(&self) -> u64 {
        self.trade_seq
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
