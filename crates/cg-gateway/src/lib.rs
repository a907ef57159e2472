//! # cg-gateway
//!
//! Terminal-facing facade for the Chronos trading service.
//!
//! [`ChronosGateway`] composes the trade adapter (`cg-td`) and the quote
//! adapter (`cg-md`) around one shared instrument registry, wires quote-side
//! discovery completion to the trade-side initial queries, and optionally
//! refreshes account and position on the event engine's timer.

mod gateway;

pub use gateway::ChronosGateway;
