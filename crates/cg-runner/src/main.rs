//! # cg-runner
//!
//! Offline driver for the Chronos gateway.
//!
//! Loads a JSON configuration file, brings up the event engine and a
//! [`ChronosGateway`] wired to replay bindings, then feeds a recorded vendor
//! callback journal through it. Every published event is logged, so a
//! journal can be used to inspect order, trade and account flow without a
//! vendor SDK.
//!
//! # Usage
//!
//! ```bash
//! cg-runner config.json --journal session.jsonl --log-level debug
//! ```

mod replay;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cg_core::event::{Event, EventEngine, EventPayload, handler};
use cg_gateway::ChronosGateway;
use clap::Parser;
use tracing::{debug, error, info};

use crate::replay::{ReplayQuoteApi, ReplayTradeApi, Replayer};

/// Chronos gateway journal runner.
#[derive(Parser)]
#[command(name = "cg-runner", about = "Chronos gateway journal runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Vendor callback journal (JSON lines) to replay.
    #[arg(short, long)]
    journal: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,
}

fn log_event(event: &Event) {
    match &*event.payload {
        EventPayload::Order(o) => info!(
            "[event] order {} {} {:?} {:?} {}/{} @ {} {:?}",
            o.vt_orderid(),
            o.vt_symbol(),
            o.direction,
            o.order_type,
            o.traded,
            o.volume,
            o.price,
            o.status
        ),
        EventPayload::Trade(t) => info!(
            "[event] trade {} order={} {} {:?} {} @ {}",
            t.tradeid, t.orderid, t.symbol, t.direction, t.volume, t.price
        ),
        EventPayload::Account(a) => {
            info!("[event] account {} balance={} frozen={}", a.accountid, a.balance, a.frozen)
        }
        EventPayload::Position(p) => info!(
            "[event] position {} {:?} volume={} yd={} price={} pnl={}",
            p.symbol, p.direction, p.volume, p.yd_volume, p.price, p.pnl
        ),
        EventPayload::Tick(t) => debug!("[event] tick {} last={} volume={}", t.vt_symbol(), t.last_price, t.volume),
        EventPayload::Contract(c) => debug!("[event] contract {} {:?}", c.vt_symbol(), c.product),
        // Already mirrored into tracing by the emitter.
        EventPayload::Log(_) | EventPayload::None => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration and initialize logging
    let config = cg_core::config::load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    cg_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &config.module_name());

    info!(
        "cg-runner starting, config={} gateway={} markets={:?}",
        cli.config.display(),
        config.gateway.gateway_name,
        config.gateway.markets
    );

    // 2. Event engine with a general logging handler
    let engine = EventEngine::with_config(&config.engine);
    engine.register_general(handler(log_event));
    engine.start()?;

    // 3. Gateway over replay bindings
    let trade_api = Arc::new(ReplayTradeApi::default());
    let quote_api = Arc::new(ReplayQuoteApi::default());
    let gateway = Arc::new(ChronosGateway::new(
        &config.gateway,
        engine.publisher(),
        trade_api.clone(),
        quote_api.clone(),
    ));
    gateway.connect(&config.gateway)?;
    if gateway.start_polling(&engine, config.gateway.query_every_n_timers) {
        info!("polling account and position every {} timer(s)", config.gateway.query_every_n_timers);
    }

    // 4. Replay the journal, or idle until interrupted
    match cli.journal {
        Some(path) => {
            let file = File::open(&path).with_context(|| format!("opening journal {}", path.display()))?;
            let mut replayer = Replayer::new(trade_api, quote_api, gateway.clone());
            let replay = tokio::task::spawn_blocking(move || replayer.run(BufReader::new(file)));

            tokio::select! {
                result = replay => match result? {
                    Ok(stats) => info!(
                        "journal {} replayed: {} entries, {} rejected, {} history bars",
                        path.display(),
                        stats.entries,
                        stats.failed,
                        stats.history_bars
                    ),
                    Err(err) => error!("journal {} aborted: {err:#}", path.display()),
                },
                _ = tokio::signal::ctrl_c() => info!("shutdown signal received during replay"),
            }
        }
        None => {
            info!("no journal given, press Ctrl+C to stop");
            tokio::signal::ctrl_c().await?;
            info!("shutdown signal received");
        }
    }

    // 5. Shut down
    let active = gateway.active_orders();
    if !active.is_empty() {
        info!("{} order(s) still active at shutdown", active.len());
    }
    gateway.stop_polling(&engine);
    gateway.close();
    engine.stop();

    info!("cg-runner stopped");
    Ok(())
}
