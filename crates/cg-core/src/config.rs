//! Configuration parsing for the Chronos gateway.
//!
//! Everything is read from a single JSON file with three blocks: module
//! metadata (name, log path), event engine tuning, and the gateway session
//! settings (credentials, addresses, discovery scope).
//!
//! # Example config
//!
//! ```json
//! {
//!   "app": { "module_name": "chronos", "log_path": "/tmp/log" },
//!   "engine": { "timer_interval_ms": 1000, "dispatch_cpu_core": 2 },
//!   "gateway": {
//!     "username": "demo", "password": "secret", "account_id": 10086,
//!     "trade_address": "ssl://127.0.0.1:8001",
//!     "quote_address": "ssl://127.0.0.1:8001",
//!     "markets": ["SSE", "SZSE"]
//!   }
//! }
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::GatewayError;
use crate::types::Exchange;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    #[serde(default)]
    pub app: Option<ModuleMeta>,

    /// Event engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Gateway session settings.
    pub gateway: GatewaySettings,
}

impl AppConfig {
    /// Returns the module name, defaulting to the gateway name.
    pub fn module_name(&self) -> String {
        self.app
            .as_ref()
            .and_then(|m| m.module_name.clone())
            .unwrap_or_else(|| self.gateway.gateway_name.to_lowercase())
    }

    /// Returns the log path.
    pub fn log_path(&self) -> Option<String> {
        self.app.as_ref().and_then(|m| m.log_path.clone())
    }

    /// Reject settings the engine or gateway cannot run with.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.gateway.markets.is_empty() {
            return Err(GatewayError::Config("gateway.markets must not be empty".into()));
        }
        // A zero interval would spin the timer or dispatch loop.
        if self.engine.timer_interval_ms == 0 {
            return Err(GatewayError::Config("engine.timer_interval_ms must be positive".into()));
        }
        if self.engine.poll_interval_ms == 0 {
            return Err(GatewayError::Config("engine.poll_interval_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// Event engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Interval between `eTimer` events.
    #[serde(default = "default_timer_interval_ms")]
    pub timer_interval_ms: u64,

    /// How long the dispatch loop waits on an empty queue before re-checking.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// CPU core to pin the dispatch thread to.
    #[serde(default)]
    pub dispatch_cpu_core: Option<i32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timer_interval_ms: default_timer_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            dispatch_cpu_core: None,
        }
    }
}

/// Session settings for one Chronos gateway instance.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Name stamped on every published snapshot.
    #[serde(default = "default_gateway_name")]
    pub gateway_name: String,

    pub username: String,

    pub password: String,

    /// Trading account (client) id.
    pub account_id: u64,

    pub trade_address: String,

    pub quote_address: String,

    /// Exchanges whose instruments are discovered after quote login.
    #[serde(default = "default_markets")]
    pub markets: Vec<Exchange>,

    /// Deadline for a blocking history query; `0` waits forever.
    #[serde(default = "default_history_timeout_secs")]
    pub history_timeout_secs: u64,

    /// Refresh account/position every N timer events; `0` disables polling.
    #[serde(default = "default_query_every_n_timers")]
    pub query_every_n_timers: u32,
}

impl GatewaySettings {
    /// Effective history deadline (`None` = wait forever).
    pub fn history_timeout(&self) -> Option<Duration> {
        (self.history_timeout_secs > 0).then(|| Duration::from_secs(self.history_timeout_secs))
    }
}

// ---------------------------------------------------------------------------
// Defaults (used by serde)
// ---------------------------------------------------------------------------

fn default_timer_interval_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_gateway_name() -> String {
    "CHRONOS".into()
}

fn default_markets() -> Vec<Exchange> {
    vec![
        Exchange::Cffex,
        Exchange::Shfe,
        Exchange::Dce,
        Exchange::Czce,
        Exchange::Sse,
        Exchange::Szse,
    ]
}

fn default_history_timeout_secs() -> u64 {
    30
}

fn default_query_every_n_timers() -> u32 {
    2
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
