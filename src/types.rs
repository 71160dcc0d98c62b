//! Shared types for the GOLDNAV tracker.
//!
//! These types form the data model used across all modules: the anchor
//! set resolved at startup, the raw collaborator payloads (ticks, bars,
//! exchange quotes), the per-tick engine output, and the snapshot handed
//! to display sinks. They are kept free of I/O so that feeds, engine and
//! display modules can depend on them without circular references.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Anchor set
// ---------------------------------------------------------------------------

/// Where a reference value ultimately came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefSource {
    /// A historical sample near the anchor instant.
    Historical,
    /// The broker's current tick, taken at startup.
    LiveTick,
    /// The configured hardcoded constant.
    Constant,
}

impl fmt::Display for RefSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefSource::Historical => write!(f, "historical"),
            RefSource::LiveTick => write!(f, "live-tick"),
            RefSource::Constant => write!(f, "constant"),
        }
    }
}

/// The day's anchor values. Immutable once built; the only way to get a
/// different anchor is to build a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorSet {
    etf_ref: f64,
    nav_ref: f64,
    gold_ref: f64,
    fx_ref: f64,
    ref_date: NaiveDate,
    premium_close: f64,
    gold_source: RefSource,
    fx_source: RefSource,
}

impl AnchorSet {
    /// Build an anchor set. A non-positive or non-finite `etf_ref` is
    /// replaced by `1.0`; `premium_close` is derived here and is `0` when
    /// `nav_ref <= 0`.
    pub fn new(
        etf_ref: f64,
        nav_ref: f64,
        gold_ref: f64,
        fx_ref: f64,
        ref_date: NaiveDate,
    ) -> Self {
        let etf_ref = if etf_ref.is_finite() && etf_ref > 0.0 { etf_ref } else { 1.0 };
        let premium_close = if nav_ref > 0.0 { etf_ref / nav_ref - 1.0 } else { 0.0 };
        Self {
            etf_ref,
            nav_ref,
            gold_ref,
            fx_ref,
            ref_date,
            premium_close,
            gold_source: RefSource::Historical,
            fx_source: RefSource::Historical,
        }
    }

    /// Record where the gold and FX references came from.
    pub fn with_sources(mut self, gold: RefSource, fx: RefSource) -> Self {
        self.gold_source = gold;
        self.fx_source = fx;
        self
    }

    pub fn etf_ref(&self) -> f64 {
        self.etf_ref
    }

    pub fn nav_ref(&self) -> f64 {
        self.nav_ref
    }

    pub fn gold_ref(&self) -> f64 {
        self.gold_ref
    }

    pub fn fx_ref(&self) -> f64 {
        self.fx_ref
    }

    pub fn ref_date(&self) -> NaiveDate {
        self.ref_date
    }

    /// ETF close relative to its iNAV at the close.
    pub fn premium_close(&self) -> f64 {
        self.premium_close
    }

    pub fn gold_source(&self) -> RefSource {
        self.gold_source
    }

    pub fn fx_source(&self) -> RefSource {
        self.fx_source
    }
}

impl fmt::Display for AnchorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Date={} | ETF={:.2} | NAV={:.2} | GoldRef={:.2} ({}) | FxRef={:.3} ({})",
            self.ref_date,
            self.etf_ref,
            self.nav_ref,
            self.gold_ref,
            self.gold_source,
            self.fx_ref,
            self.fx_source,
        )
    }
}

// ---------------------------------------------------------------------------
// Collaborator payloads
// ---------------------------------------------------------------------------

/// Top-of-book quote from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
    pub time: DateTime<Utc>,
}

impl Tick {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// One historical sample (a one-minute bar close).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub close: f64,
}

/// Raw, unvalidated text scraped for the ETF. Fields may hold locale
/// separators, currency glyphs, or the sentinel `"0"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeQuote {
    pub inav: String,
    pub last_close: String,
    pub as_of: String,
}

impl ExchangeQuote {
    /// The quote returned when the exchange could not be read at all.
    pub fn sentinel(today: NaiveDate) -> Self {
        Self {
            inav: "0".to_string(),
            last_close: "0".to_string(),
            as_of: today.format("%d-%b-%Y").to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine output and history
// ---------------------------------------------------------------------------

/// Output of one pricing pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    pub synthetic_price: f64,
    /// `gold_now / gold_ref - 1`.
    pub gold_return: f64,
    /// `fx_now / fx_ref - 1`.
    pub fx_return: f64,
}

/// One entry in the session's price history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub synthetic_price: f64,
    pub gold_price: f64,
}

// ---------------------------------------------------------------------------
// Trend and display snapshot
// ---------------------------------------------------------------------------

/// Direction of a scalar since its previous observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    /// Glyph shown next to a value.
    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::Flat => " ",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Up => write!(f, "up"),
            Trend::Down => write!(f, "down"),
            Trend::Flat => write!(f, "flat"),
        }
    }
}

/// Trend tag for each changing scalar in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trends {
    pub synthetic: Trend,
    pub gold_mid: Trend,
    pub fx_mid: Trend,
    pub gold_return: Trend,
    pub fx_return: Trend,
    pub premium_vs_close: Trend,
    pub volatility: Trend,
}

/// Everything a display sink needs for one refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub synthetic_price: f64,
    pub gold_mid: f64,
    pub fx_mid: f64,
    pub gold_return: f64,
    pub fx_return: f64,
    /// Synthetic price relative to the ETF close.
    pub premium_vs_close: f64,
    /// ETF close relative to iNAV at the close.
    pub premium_close: f64,
    pub volatility_bps: f64,
    pub ref_date: NaiveDate,
    pub etf_ref: f64,
    pub gold_ref: f64,
    pub fx_ref: f64,
    pub samples: usize,
    pub trends: Trends,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Synth ₹{}{:.2} | Gold ${}{:.2} ({:+.3}%) | USD/INR {}{:.3} ({:+.3}%) | vs Close {:+.2}% | Vol {:.2}bps",
            self.trends.synthetic.arrow(),
            self.synthetic_price,
            self.trends.gold_mid.arrow(),
            self.gold_mid,
            self.gold_return * 100.0,
            self.trends.fx_mid.arrow(),
            self.fx_mid,
            self.fx_return * 100.0,
            self.premium_vs_close * 100.0,
            self.volatility_bps,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures reported by external feeds.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeedError {
    #[error("{feed} request failed: {message}")]
    Transport { feed: &'static str, message: String },

    #[error("{feed} returned HTTP {status}")]
    Status { feed: &'static str, status: u16 },

    #[error("{feed} payload could not be decoded: {message}")]
    Decode { feed: &'static str, message: String },

    #[error("{feed} has no data for {symbol}")]
    NoData { feed: &'static str, symbol: String },

    #[error("Broker session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Unknown instrument: {0}")]
    UnknownSymbol(String),
}

impl FeedError {
    /// Errors that must stop startup before the live loop begins.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FeedError::SessionUnavailable(_) | FeedError::UnknownSymbol(_))
    }
}

/// Why one step of a reference fallback chain produced no value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReferenceError {
    #[error("no samples returned for {symbol}")]
    NoSamples { symbol: String },

    #[error("no sample for {symbol} at or before {anchor}")]
    NoneAtOrBefore { symbol: String, anchor: DateTime<Utc> },

    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("could not parse price from {0:?}")]
    Parse(String),

    #[error("no live tick available")]
    NoTick,

    #[error("unusable reference value {0}")]
    Unusable(f64),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
