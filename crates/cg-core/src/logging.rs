//! `tracing` subscriber setup.
//!
//! Console output is human-readable. When a log directory is configured, a
//! second layer writes JSON lines to a daily-rotated `<module>.YYYY-MM-DD`
//! file so session logs can be grepped or loaded by tooling.
//!
//! Gateway `eLog` events are mirrored into `tracing` by the emitter, so the
//! one subscriber covers engine internals and gateway messages alike.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `log_level` when set. A second call is a no-op, so
/// tests and embedding applications may call it freely.
pub fn init_logging(log_level: &str, log_dir: Option<&str>, module_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console = fmt::layer().with_thread_names(true).with_target(false);

    let file = log_dir.map(|dir| {
        fmt::layer()
            .json()
            .with_writer(tracing_appender::rolling::daily(dir, module_name))
            .with_thread_names(true)
            .with_current_span(false)
    });

    let _ = tracing_subscriber::registry().with(filter).with(console).with(file).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_logging("debug", None, "chronos");
        init_logging("info", None, "chronos");
        tracing::info!("logging initialized twice");
    }
}
