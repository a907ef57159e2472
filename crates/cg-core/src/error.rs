//! Typed error definitions for the Chronos gateway.
//!
//! Provides [`GatewayError`], grouped by where a failure originates: the
//! transport, local validation, the vendor, or local lifecycle and config.
//! Upstream data anomalies such as regressing counters are logged, not
//! returned. All variants implement `std::error::Error` via `thiserror`, so
//! they integrate with `anyhow::Result` at the CLI edge.

use std::time::Duration;

use thiserror::Error;

/// Domain-specific errors for the Chronos gateway.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// Transport down or not logged in.
    #[error("connection error: {0}")]
    Connection(String),

    /// Request rejected locally before any vendor call.
    #[error("validation error: {0}")]
    Validation(String),

    /// Instrument (or order) could not be resolved.
    #[error("not found: {0}")]
    NotFound(String),

    /// Non-zero result code reported by the vendor.
    #[error("vendor error {code}: {message}")]
    Vendor { code: i32, message: String },

    /// A single-flight operation is already in progress.
    #[error("busy: {0}")]
    Busy(String),

    /// A blocking wait exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Event engine lifecycle misuse.
    #[error("engine error: {0}")]
    Engine(String),

    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Build a [`GatewayError::Vendor`] from a raw vendor code, translating
    /// it through the fixed message table.
    pub fn vendor(code: i32) -> Self {
        Self::Vendor {
            code,
            message: vendor_message(code).to_string(),
        }
    }
}

/// Convenience alias used throughout the gateway crates.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Translate a vendor result code into a human-readable message.
///
/// Unmapped codes fall back to `"unknown error"`.
pub fn vendor_message(code: i32) -> &'static str {
    match code {
        0 => "success",
        -1001 => "not initialized",
        -1002 => "initialization failed",
        -1003 => "already initialized",
        -1004 => "not connected to server",
        -1005 => "request send failed",
        -1006 => "invalid API call",
        -1007 => "invalid request parameter",
        -1008 => "invalid account",
        -1009 => "invalid response",
        -1010 => "unsupported request",
        -1011 => "not logged in",
        -1012 => "already logged in",
        -1013 => "invalid login",
        -1014 => "invalid terminal id",
        -1015 => "duplicate request id",
        -1016 => "request count exceeds limit",
        -1017 => "invalid instrument handle (subscribe handle must be non-zero)",
        _ => "unknown error",
    }
}
