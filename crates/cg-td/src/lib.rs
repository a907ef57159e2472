//! # cg-td
//!
//! Trade side of the Chronos gateway.
//!
//! [`TradeAdapter`] turns terminal order requests into vendor calls and
//! merges the vendor's cumulative order callbacks into an [`OrderBook`],
//! synthesizing exactly one trade per positive filled-quantity increase via
//! the [`TradeReconciler`].
//!
//! ## Modules
//!
//! | Module       | Contents                                        |
//! |--------------|-------------------------------------------------|
//! | `api`        | `TradeApi` (requests) / `TradeSpi` (callbacks)  |
//! | `vendor`     | vendor structs and enums                        |
//! | `mapping`    | vendor <-> domain enum tables                   |
//! | `order_book` | per-order state keyed by composite id           |
//! | `reconcile`  | cumulative-delta fill synthesis                 |
//! | `trade`      | the adapter itself                              |

pub mod api;
pub mod mapping;
pub mod order_book;
pub mod reconcile;
pub mod trade;
pub mod vendor;

pub use api::{TradeApi, TradeSpi};
pub use order_book::OrderBook;
pub use reconcile::{FillDelta, TradeReconciler};
pub use trade::TradeAdapter;
