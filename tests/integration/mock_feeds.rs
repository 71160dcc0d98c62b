//! In-memory feeds for integration testing.
//!
//! Deterministic implementations of every feed trait. Ticks are served
//! from a script, histories from fixed bar lists, and every call is
//! recorded so tests can assert on what the core asked for.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use goldnav::display::DisplaySink;
use goldnav::feeds::{BrokerSession, ExchangeQuoteSource, LiveFxSource, PriceHistory, TickSource};
use goldnav::types::{Bar, ExchangeQuote, FeedError, PriceSample, Snapshot, Tick};

/// Exchange quote source returning a fixed quote.
pub struct StaticQuotes(pub ExchangeQuote);

#[async_trait]
impl ExchangeQuoteSource for StaticQuotes {
    async fn fetch_quote(&self, _symbol: &str) -> ExchangeQuote {
        self.0.clone()
    }
}

/// History returning whatever bars fall in the requested range.
pub struct StaticHistory {
    bars: Vec<Bar>,
    fail: bool,
}

impl StaticHistory {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars, fail: false }
    }

    pub fn failing() -> Self {
        Self { bars: Vec::new(), fail: true }
    }
}

#[async_trait]
impl PriceHistory for StaticHistory {
    async fn range_query(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, FeedError> {
        if self.fail {
            return Err(FeedError::Transport {
                feed: "mock",
                message: format!("history for {symbol} unavailable"),
            });
        }
        Ok(self.bars.iter().copied().filter(|b| b.time >= start && b.time <= end).collect())
    }
}

/// Broker that replays a tick script, then reports "no new tick".
pub struct MockBroker {
    script: Mutex<VecDeque<Tick>>,
    last: Mutex<Option<Tick>>,
    history: Vec<Bar>,
    connected: bool,
    pub shutdown_called: AtomicBool,
    pub tick_polls: AtomicUsize,
}

impl MockBroker {
    pub fn new(ticks: Vec<Tick>) -> Self {
        Self {
            script: Mutex::new(ticks.into()),
            last: Mutex::new(None),
            history: Vec::new(),
            connected: true,
            shutdown_called: AtomicBool::new(false),
            tick_polls: AtomicUsize::new(0),
        }
    }

    pub fn with_history(mut self, bars: Vec<Bar>) -> Self {
        self.history = bars;
        self
    }

    pub fn disconnected() -> Self {
        Self { connected: false, ..Self::new(Vec::new()) }
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl TickSource for MockBroker {
    async fn latest_tick(&self, _symbol: &str) -> Result<Option<Tick>, FeedError> {
        self.tick_polls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        // Like a real terminal, keeps reporting the last tick.
        Ok(*last)
    }
}

#[async_trait]
impl PriceHistory for MockBroker {
    async fn range_query(
        &self,
        _symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, FeedError> {
        Ok(self.history.iter().copied().filter(|b| b.time >= start && b.time <= end).collect())
    }
}

#[async_trait]
impl BrokerSession for MockBroker {
    async fn connect(&self) -> Result<(), FeedError> {
        if self.connected {
            Ok(())
        } else {
            Err(FeedError::SessionUnavailable("mock terminal offline".into()))
        }
    }

    async fn select_symbol(&self, symbol: &str) -> Result<(), FeedError> {
        if symbol == "XAUUSD" {
            Ok(())
        } else {
            Err(FeedError::UnknownSymbol(symbol.to_string()))
        }
    }

    async fn shutdown(&self) {
        self.shutdown_called.store(true, Ordering::SeqCst);
    }
}

/// FX source returning a fixed mid.
pub struct FixedFx(pub f64);

#[async_trait]
impl LiveFxSource for FixedFx {
    async fn latest_mid(&self, _pair: &str) -> Result<f64, FeedError> {
        Ok(self.0)
    }
}

/// Sink that keeps every snapshot it receives.
#[derive(Default, Clone)]
pub struct CollectingSink {
    pub snapshots: Arc<Mutex<Vec<Snapshot>>>,
    pub history_lens: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl DisplaySink for CollectingSink {
    async fn publish(&self, snapshot: &Snapshot, history: &[PriceSample]) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
        self.history_lens.lock().unwrap().push(history.len());
    }

    fn name(&self) -> &str {
        "collecting"
    }
}
