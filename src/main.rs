//! GOLDNAV: live fair-value tracker for a gold ETF
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the broker session, resolves the day's anchor, and runs the
//! live sampling loop until Ctrl+C.

use anyhow::{Context, Result};
use secrecy::Secret;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use goldnav::config;
use goldnav::dashboard::{self, DashboardSink, DashboardState};
use goldnav::display::{DisplaySink, LogSink};
use goldnav::engine::resolver::ReferenceResolver;
use goldnav::engine::sampler::{self, LiveSession, LoopSettings};
use goldnav::feeds::bridge::BrokerBridgeClient;
use goldnav::feeds::nse::NseQuoteClient;
use goldnav::feeds::yahoo::YahooFxClient;
use goldnav::feeds::{BrokerSession, LiveFxSource};

const BANNER: &str = r#"
  ____  ___  _     ____  _   _    ___     __
 / ___|/ _ \| |   |  _ \| \ | |  / \ \   / /
| |  _| | | | |   | | | |  \| | / _ \ \ / /
| |_| | |_| | |___| |_| | |\  |/ ___ \ V /
 \____|\___/|_____|____/|_| \_/_/   \_\_/

  Synthetic gold ETF fair value, live
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        etf = %cfg.instrument.etf_symbol,
        gold = %cfg.instrument.gold_symbol,
        fx = %cfg.instrument.fx_pair,
        "GOLDNAV starting up"
    );

    // -- Feed clients ----------------------------------------------------

    let timeout = cfg.feeds.request_timeout();
    let quotes = NseQuoteClient::new(Some(cfg.feeds.exchange_base_url.clone()), timeout)?;
    let fx = Arc::new(YahooFxClient::new(Some(cfg.feeds.fx_base_url.clone()), timeout)?);

    let token = cfg
        .feeds
        .broker_token_env
        .as_deref()
        .and_then(|env| config::AppConfig::resolve_env(env).ok())
        .map(Secret::new);
    if token.is_none() {
        warn!("No broker bridge token configured, connecting without auth");
    }
    let broker = Arc::new(BrokerBridgeClient::new(
        cfg.feeds.broker_base_url.clone(),
        token,
        timeout,
    )?);

    // -- Broker session (the only fatal step) -----------------------------

    if let Err(e) = broker.connect().await {
        error!(error = %e, "Broker session unavailable");
        return Err(e).context("Failed to open broker session");
    }
    if let Err(e) = broker.select_symbol(&cfg.instrument.gold_symbol).await {
        error!(symbol = %cfg.instrument.gold_symbol, error = %e, "Gold symbol unavailable");
        broker.shutdown().await;
        return Err(e).context("Failed to select gold symbol");
    }

    // -- Anchor resolution -------------------------------------------------

    let today = chrono::Local::now().date_naive();
    let resolver = ReferenceResolver::new(
        &quotes,
        &*broker,
        &*broker,
        &*fx,
        cfg.instrument.clone(),
        cfg.anchor.clone(),
    );
    let anchor = resolver.resolve(today).await;
    info!(
        ref_date = %anchor.ref_date(),
        etf_ref = anchor.etf_ref(),
        gold_ref = anchor.gold_ref(),
        gold_source = %anchor.gold_source(),
        fx_ref = anchor.fx_ref(),
        fx_source = %anchor.fx_source(),
        "ENGINE READY"
    );

    // -- Sinks -------------------------------------------------------------

    let mut sinks: Vec<Box<dyn DisplaySink>> =
        vec![Box::new(LogSink::new(Duration::from_secs(cfg.live.log_every_secs.max(1))))];

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(anchor.clone(), cfg.dashboard.chart_points));
        dashboard::spawn_dashboard(state.clone(), cfg.dashboard.port);
        sinks.push(Box::new(DashboardSink::new(state)));
    }

    // -- Live loop ---------------------------------------------------------

    let session = LiveSession::with_volatility(
        anchor,
        cfg.live.volatility_window,
        cfg.live.volatility_min_samples,
    );
    let settings = LoopSettings::from_config(
        &cfg.instrument.gold_symbol,
        &cfg.instrument.fx_pair,
        &cfg.live,
    );
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let broker: Arc<dyn BrokerSession> = broker;
    let fx: Arc<dyn LiveFxSource> = fx;
    let (session, summary) =
        sampler::run_live_loop(broker, fx, &sinks, session, settings, shutdown).await;

    info!(
        ticks = summary.ticks,
        snapshots = summary.snapshots,
        samples = session.history().len(),
        ref_date = %session.anchor().ref_date(),
        "GOLDNAV shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("goldnav=info"));

    if std::env::var("GOLDNAV_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
