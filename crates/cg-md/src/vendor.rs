//! Quote-side vendor structs and enums.
//!
//! Prices are integers scaled by [`PRICE_SCALE`](cg_core::units::PRICE_SCALE);
//! timestamps are microseconds since the Unix epoch.

use cg_core::InstrumentHandle;
use serde::{Deserialize, Serialize};

/// Number of book levels carried in a snapshot.
pub const BOOK_LEVELS: usize = 5;

/// Vendor market segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketType {
    Cfe,
    Shf,
    Czc,
    Dce,
    Sha,
    Sza,
}

/// Vendor instrument category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variety {
    /// Query wildcard; never carried by a discovered instrument.
    #[default]
    All,
    Stock,
    Bond,
    Fund,
    Spot,
    MoneyMarket,
    Index,
    Future,
    Option,
    Warrant,
    StockOption,
}

/// Static instrument record returned by the security-master query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityInfo {
    pub ukey: InstrumentHandle,
    pub market_id: MarketType,
    /// Exchange-local code, e.g. `"600000"`.
    pub market_code: String,
    /// Short display name.
    #[serde(default)]
    pub market_abbr: String,
    pub major_type: Variety,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Minimum price increment (scaled).
    #[serde(default)]
    pub tick_size: i64,
    #[serde(default = "default_min_order_size")]
    pub min_order_size: i64,
}

/// Level-5 market snapshot, pushed or returned by a backward query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdSnapshot {
    pub ukey: InstrumentHandle,
    pub timeus: i64,
    pub last: i64,
    #[serde(default)]
    pub open: i64,
    #[serde(default)]
    pub high: i64,
    #[serde(default)]
    pub low: i64,
    #[serde(default)]
    pub pre_close: i64,
    #[serde(default)]
    pub volume: i64,
    #[serde(default)]
    pub bid_price: [i64; BOOK_LEVELS],
    #[serde(default)]
    pub bid_volume: [i64; BOOK_LEVELS],
    #[serde(default)]
    pub ask_price: [i64; BOOK_LEVELS],
    #[serde(default)]
    pub ask_volume: [i64; BOOK_LEVELS],
    #[serde(default)]
    pub upper_limit: i64,
    #[serde(default)]
    pub lower_limit: i64,
}

/// One bar of a minute or daily k-line query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdKLine {
    pub ukey: InstrumentHandle,
    pub timeus: i64,
    pub open: i64,
    pub high: i64,
    pub low: i64,
    pub close: i64,
    pub volume: i64,
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_min_order_size() -> i64 {
    1
}
