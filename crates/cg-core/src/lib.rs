//! # cg-core
//!
//! Core crate for the Chronos gateway, providing:
//!
//! - **Types** (`types`): domain enums, market data and trading snapshots, shared vendor structs
//! - **Events** (`event`): `Event`, `EventEngine` (queue + dispatch + timer), `GatewayEmitter`
//! - **Instruments** (`instrument`): vendor handle <-> symbol registry with discovery barrier
//! - **Units** (`units`): fixed-point price scaling and packed vendor time decoding
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): domain-specific `GatewayError` via thiserror
//! - **CPU affinity** (`cpu_affinity`): dispatch thread pinning
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod cpu_affinity;
pub mod error;
pub mod event;
pub mod instrument;
pub mod logging;
pub mod types;
pub mod units;

// Re-export types at crate root for convenience.
pub use error::GatewayError;
pub use instrument::{InstrumentHandle, InstrumentRegistry};
pub use types::*;
