//! Display sinks.
//!
//! The core hands a consolidated `Snapshot` plus a read-only view of the
//! price history to every sink on the UI cadence. How the numbers are
//! rendered is the sink's business; the core never waits on rendering
//! beyond the `publish` call itself.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::types::{PriceSample, Snapshot};

/// Consumer of live snapshots.
#[async_trait]
pub trait DisplaySink: Send + Sync {
    /// Receive one refresh. `history` is the full, time-ordered session
    /// history, oldest first.
    async fn publish(&self, snapshot: &Snapshot, history: &[PriceSample]);

    /// Sink name for logging and identification.
    fn name(&self) -> &str;
}

/// Console sink: a structured log line per refresh, throttled so the
/// 10 Hz UI cadence does not flood the terminal. Skipped refreshes are
/// still logged at debug level.
pub struct LogSink {
    every: Duration,
    last: Mutex<Option<Instant>>,
}

impl LogSink {
    pub fn new(every: Duration) -> Self {
        Self { every, last: Mutex::new(None) }
    }

    /// Whether a summary line is due, recording the time if so.
    fn due(&self, now: Instant) -> bool {
        let Ok(mut last) = self.last.lock() else {
            return true;
        };
        match *last {
            Some(prev) if now.duration_since(prev) < self.every => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

#[async_trait]
impl DisplaySink for LogSink {
    async fn publish(&self, snapshot: &Snapshot, history: &[PriceSample]) {
        if !self.due(Instant::now()) {
            debug!(synthetic = snapshot.synthetic_price, "Snapshot");
            return;
        }
        info!(
            synthetic = format!("{:.2}", snapshot.synthetic_price),
            synthetic_trend = %snapshot.trends.synthetic,
            gold_mid = format!("{:.2}", snapshot.gold_mid),
            fx_mid = format!("{:.3}", snapshot.fx_mid),
            gold_pct = format!("{:+.3}", snapshot.gold_return * 100.0),
            fx_pct = format!("{:+.3}", snapshot.fx_return * 100.0),
            vs_close_pct = format!("{:+.2}", snapshot.premium_vs_close * 100.0),
            vol_bps = format!("{:.2}", snapshot.volatility_bps),
            ref_date = %snapshot.ref_date,
            samples = history.len(),
            "{snapshot}"
        );
    }

    fn name(&self) -> &str {
        "log"
    }
}
