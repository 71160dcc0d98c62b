//! Live sampling loop.
//!
//! One control loop owns all mutable live state (price history, trend
//! memory, last engine output) and is driven by three independent sources:
//!
//! - a tick pump task that polls the broker and forwards only new ticks,
//! - an FX refresher task that polls the live FX feed on its own clock and
//!   publishes the last good mid through a `watch` channel,
//! - a UI interval that, when new data has arrived, recomputes volatility
//!   and trends and hands one snapshot to every display sink.
//!
//! The producer tasks only read from feeds and hand over values; every
//! mutation happens on the loop. Nothing in the per-tick path awaits a
//! network call.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::pricing;
use super::tracker::ChangeTracker;
use super::volatility;
use crate::config::LiveConfig;
use crate::display::DisplaySink;
use crate::feeds::{BrokerSession, LiveFxSource, TickSource};
use crate::types::{AnchorSet, EngineResult, PriceSample, Snapshot, Tick, Trends};

/// Bound on ticks buffered between the pump and the loop.
const TICK_CHANNEL_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Latest inputs and output of the pricing engine.
#[derive(Debug, Clone, Copy)]
struct LastPrice {
    result: EngineResult,
    gold_mid: f64,
    fx_mid: f64,
}

/// All mutable state of a live session. Owned by exactly one loop.
#[derive(Debug)]
pub struct LiveSession {
    anchor: AnchorSet,
    history: Vec<PriceSample>,
    tracker: ChangeTracker,
    last: Option<LastPrice>,
    volatility_window: usize,
    volatility_min_samples: usize,
}

impl LiveSession {
    pub fn new(anchor: AnchorSet) -> Self {
        Self::with_volatility(anchor, volatility::DEFAULT_WINDOW, volatility::MIN_SAMPLES)
    }

    pub fn with_volatility(anchor: AnchorSet, window: usize, min_samples: usize) -> Self {
        Self {
            anchor,
            history: Vec::new(),
            tracker: ChangeTracker::new(),
            last: None,
            volatility_window: window,
            volatility_min_samples: min_samples,
        }
    }

    pub fn anchor(&self) -> &AnchorSet {
        &self.anchor
    }

    /// Time-ordered history, oldest first.
    pub fn history(&self) -> &[PriceSample] {
        &self.history
    }

    /// Price one tick against the current FX mid and record the sample.
    pub fn ingest(&mut self, tick: &Tick, fx_mid: f64, at: DateTime<Utc>) -> EngineResult {
        let gold_mid = tick.mid();
        let result = pricing::calculate(&self.anchor, gold_mid, fx_mid);

        self.history.push(PriceSample {
            timestamp: at,
            synthetic_price: result.synthetic_price,
            gold_price: gold_mid,
        });
        self.last = Some(LastPrice { result, gold_mid, fx_mid });
        result
    }

    /// Volatility of the synthetic price over the trailing window, in bps.
    pub fn volatility_bps(&self) -> f64 {
        let tail = &self.history[self.history.len().saturating_sub(self.volatility_window)..];
        let prices: Vec<f64> = tail.iter().map(|s| s.synthetic_price).collect();
        volatility::estimate_with(&prices, self.volatility_window, self.volatility_min_samples)
    }

    /// Build the display snapshot and advance every trend. `None` until
    /// the first tick has been ingested.
    pub fn snapshot(&mut self, at: DateTime<Utc>) -> Option<Snapshot> {
        let last = self.last?;
        let etf_ref = self.anchor.etf_ref();
        let premium_vs_close = last.result.synthetic_price / etf_ref - 1.0;
        let volatility_bps = self.volatility_bps();

        let trends = Trends {
            synthetic: self.tracker.observe("synthetic", last.result.synthetic_price),
            gold_mid: self.tracker.observe("gold_mid", last.gold_mid),
            fx_mid: self.tracker.observe("fx_mid", last.fx_mid),
            gold_return: self.tracker.observe("gold_return", last.result.gold_return),
            fx_return: self.tracker.observe("fx_return", last.result.fx_return),
            premium_vs_close: self.tracker.observe("premium_vs_close", premium_vs_close),
            volatility: self.tracker.observe("volatility", volatility_bps),
        };

        Some(Snapshot {
            timestamp: at,
            synthetic_price: last.result.synthetic_price,
            gold_mid: last.gold_mid,
            fx_mid: last.fx_mid,
            gold_return: last.result.gold_return,
            fx_return: last.result.fx_return,
            premium_vs_close,
            premium_close: self.anchor.premium_close(),
            volatility_bps,
            ref_date: self.anchor.ref_date(),
            etf_ref,
            gold_ref: self.anchor.gold_ref(),
            fx_ref: self.anchor.fx_ref(),
            samples: self.history.len(),
            trends,
        })
    }
}

// ---------------------------------------------------------------------------
// Producer tasks
// ---------------------------------------------------------------------------

/// Poll `source` for `pair` every `every` and publish usable mids. The
/// receiver starts at `initial` and keeps the last good value on failure.
pub fn spawn_fx_refresher(
    source: Arc<dyn LiveFxSource>,
    pair: String,
    every: Duration,
    initial: f64,
) -> (watch::Receiver<f64>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(initial);

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match source.latest_mid(&pair).await {
                Ok(mid) if mid.is_finite() && mid > 0.0 => {
                    debug!(pair = %pair, mid, "FX mid refreshed");
                    if tx.send(mid).is_err() {
                        break;
                    }
                }
                Ok(mid) => warn!(pair = %pair, mid, "Ignoring unusable FX mid"),
                Err(e) => debug!(pair = %pair, error = %e, "FX refresh failed, keeping last value"),
            }
            if tx.is_closed() {
                break;
            }
        }
    });

    (rx, handle)
}

/// Whether `tick` differs from the last forwarded one. Quotes sharing a
/// timestamp still count when bid or ask moved; older quotes never do.
fn is_new_tick(last: Option<&Tick>, tick: &Tick) -> bool {
    match last {
        None => true,
        Some(prev) if tick.time > prev.time => true,
        Some(prev) if tick.time == prev.time => tick.bid != prev.bid || tick.ask != prev.ask,
        Some(_) => false,
    }
}

/// Poll `source` for `symbol` and forward every new quote.
/// Sleeps `backoff` whenever there is nothing new.
pub fn spawn_tick_pump<T>(
    source: Arc<T>,
    symbol: String,
    backoff: Duration,
) -> (mpsc::Receiver<Tick>, JoinHandle<()>)
where
    T: TickSource + ?Sized + 'static,
{
    let (tx, rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        let mut last: Option<Tick> = None;
        loop {
            match source.latest_tick(&symbol).await {
                Ok(Some(tick)) if is_new_tick(last.as_ref(), &tick) => {
                    last = Some(tick);
                    if tx.send(tick).await.is_err() {
                        break;
                    }
                    continue;
                }
                Ok(_) => {}
                Err(e) => debug!(symbol = %symbol, error = %e, "Tick poll failed"),
            }
            if tx.is_closed() {
                break;
            }
            tokio::time::sleep(backoff).await;
        }
    });

    (rx, handle)
}

// ---------------------------------------------------------------------------
// Control loop
// ---------------------------------------------------------------------------

/// Cadence settings for `run_live_loop`.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub gold_symbol: String,
    pub fx_pair: String,
    pub fx_refresh: Duration,
    pub ui_interval: Duration,
    pub idle_backoff: Duration,
    pub initial_fx_mid: f64,
}

impl LoopSettings {
    pub fn from_config(gold_symbol: &str, fx_pair: &str, live: &LiveConfig) -> Self {
        Self {
            gold_symbol: gold_symbol.to_string(),
            fx_pair: fx_pair.to_string(),
            fx_refresh: live.fx_refresh(),
            ui_interval: live.ui_interval(),
            idle_backoff: live.idle_backoff(),
            initial_fx_mid: live.initial_fx_mid,
        }
    }
}

/// What a finished loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub snapshots: u64,
}

/// Run the live loop until `shutdown` resolves (or the tick feed ends),
/// then stop the producers and shut the broker session down.
pub async fn run_live_loop<S>(
    broker: Arc<dyn BrokerSession>,
    fx: Arc<dyn LiveFxSource>,
    sinks: &[Box<dyn DisplaySink>],
    mut session: LiveSession,
    settings: LoopSettings,
    shutdown: S,
) -> (LiveSession, LoopSummary)
where
    S: Future<Output = ()>,
{
    let (fx_rx, fx_task) = spawn_fx_refresher(
        fx,
        settings.fx_pair.clone(),
        settings.fx_refresh,
        settings.initial_fx_mid,
    );
    let (mut ticks, pump_task) =
        spawn_tick_pump(broker.clone(), settings.gold_symbol.clone(), settings.idle_backoff);

    let mut ui = tokio::time::interval(settings.ui_interval);
    ui.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tokio::pin!(shutdown);
    let mut summary = LoopSummary::default();
    let mut dirty = false;

    let sink_names: Vec<&str> = sinks.iter().map(|s| s.name()).collect();
    info!(
        gold = %settings.gold_symbol,
        fx = %settings.fx_pair,
        sinks = ?sink_names,
        ui_ms = settings.ui_interval.as_millis() as u64,
        "Entering live loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }

            received = ticks.recv() => {
                let Some(tick) = received else {
                    warn!("Tick feed ended");
                    break;
                };
                let fx_mid = *fx_rx.borrow();
                session.ingest(&tick, fx_mid, Utc::now());
                summary.ticks += 1;
                dirty = true;
            }

            _ = ui.tick(), if dirty => {
                if let Some(snapshot) = session.snapshot(Utc::now()) {
                    for sink in sinks {
                        sink.publish(&snapshot, session.history()).await;
                    }
                    summary.snapshots += 1;
                }
                dirty = false;
            }
        }
    }

    pump_task.abort();
    fx_task.abort();
    broker.shutdown().await;

    info!(ticks = summary.ticks, snapshots = summary.snapshots, "Live loop stopped");
    (session, summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
