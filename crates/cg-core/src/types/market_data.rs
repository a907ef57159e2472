//! Market data structures published to consumers.
//!
//! Every struct here is a plain snapshot value: adapters build a fresh one
//! per callback and hand ownership to the event engine.
//!
//! # Timestamp convention
//!
//! Vendor market-data timestamps are microseconds since the Unix epoch; they
//! are converted to `DateTime<Utc>` on ingest (see [`crate::units`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Exchange, Interval, Product};

/// Number of book levels carried by a [`TickData`].
pub const TICK_DEPTH: usize = 5;

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// Level-5 market snapshot for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickData {
    pub symbol: String,
    pub exchange: Exchange,
    /// Display name from instrument discovery (empty if unknown).
    pub name: String,
    pub datetime: DateTime<Utc>,
    pub volume: f64,
    pub last_price: f64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub pre_close: f64,
    pub limit_up: f64,
    pub limit_down: f64,
    /// `bid_prices[0]` is the best bid.
    pub bid_prices: [f64; TICK_DEPTH],
    pub bid_volumes: [f64; TICK_DEPTH],
    /// `ask_prices[0]` is the best ask.
    pub ask_prices: [f64; TICK_DEPTH],
    pub ask_volumes: [f64; TICK_DEPTH],
    pub gateway_name: String,
}

impl TickData {
    /// `"<symbol>.<exchange>"` key used for per-instrument event types.
    pub fn vt_symbol(&self) -> String {
        super::vt_symbol(&self.symbol, self.exchange)
    }
}

// ---------------------------------------------------------------------------
// Bar
// ---------------------------------------------------------------------------

/// One OHLCV bar returned by a historical query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarData {
    pub symbol: String,
    pub exchange: Exchange,
    pub datetime: DateTime<Utc>,
    pub interval: Interval,
    pub volume: f64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub gateway_name: String,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Static instrument description produced by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractData {
    pub symbol: String,
    pub exchange: Exchange,
    pub name: String,
    pub product: Product,
    /// Contract multiplier.
    pub size: f64,
    pub pricetick: f64,
    pub min_volume: f64,
    pub net_position: bool,
    pub history_data: bool,
    pub gateway_name: String,
}

impl ContractData {
    pub fn vt_symbol(&self) -> String {
        super::vt_symbol(&self.symbol, self.exchange)
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// Severity of a gateway log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A log line surfaced to consumers through the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogData {
    pub level: LogLevel,
    pub msg: String,
    pub time: DateTime<Utc>,
    pub gateway_name: String,
}

impl std::fmt::Display for LogData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {:?} {}", self.gateway_name, self.level, self.msg)
    }
}
