//! # cg-md
//!
//! Quote side of the Chronos gateway.
//!
//! ## Architecture
//!
//! [`QuoteAdapter`] owns the market-data session. After login it discovers
//! instruments market by market into the shared registry, then streams
//! level-5 snapshots as ticks for every subscription. Historical bars go
//! through the [`HistoryBridge`], which turns the vendor's paged k-line
//! callbacks into one blocking call.
//!
//! - [`api`]: `QuoteApi` (requests) / `QuoteSpi` (callbacks)
//! - [`vendor`]: security-master, snapshot and k-line structs
//! - [`mapping`]: market segment and category tables
//! - [`history`]: single-flight blocking history query
//! - [`quote`]: the adapter itself

pub mod api;
pub mod history;
pub mod mapping;
pub mod quote;
pub mod vendor;

pub use api::{QuoteApi, QuoteSpi};
pub use history::HistoryBridge;
pub use quote::{DiscoveryHook, QuoteAdapter};
