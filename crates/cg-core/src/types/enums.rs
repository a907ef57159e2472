//! Enumerations used throughout the gateway.
//!
//! These are the terminal-side (domain) codes. Vendor codes live in the
//! adapter crates' `vendor` modules and are translated at the boundary.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Exchange identifiers
// ---------------------------------------------------------------------------

/// Exchanges reachable through the Chronos service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    /// China Financial Futures Exchange.
    Cffex,
    /// Shanghai Futures Exchange.
    Shfe,
    /// Dalian Commodity Exchange.
    Dce,
    /// Zhengzhou Commodity Exchange.
    Czce,
    /// Shanghai Stock Exchange.
    Sse,
    /// Shenzhen Stock Exchange.
    Szse,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cffex => "CFFEX",
            Self::Shfe => "SHFE",
            Self::Dce => "DCE",
            Self::Czce => "CZCE",
            Self::Sse => "SSE",
            Self::Szse => "SZSE",
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Product types
// ---------------------------------------------------------------------------

/// Product (instrument) category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Product {
    #[default]
    Equity,
    Futures,
    Option,
    Index,
    Fund,
    Bond,
    Spot,
    Warrant,
}

// ---------------------------------------------------------------------------
// Order / trading enums
// ---------------------------------------------------------------------------

/// Order status as seen by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Submitting,
    NotTraded,
    PartTraded,
    AllTraded,
    Cancelled,
    Rejected,
}

impl Status {
    /// Whether an order in this status may still change.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::NotTraded | Self::PartTraded)
    }
}

/// Long or short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

/// Position effect of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Offset {
    #[default]
    None,
    Open,
    Close,
    CloseToday,
    CloseYesterday,
}

/// Order execution type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderType {
    #[default]
    Limit,
    Market,
}

/// Bar interval for historical queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    Minute,
    Daily,
}
