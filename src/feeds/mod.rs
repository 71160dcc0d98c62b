//! External feed collaborators.
//!
//! Defines the traits the core needs from the outside world and provides
//! HTTP implementations:
//! - `nse`: exchange quote scrape for the ETF's close, iNAV and as-of date
//! - `yahoo`: historical and live USD/INR
//! - `bridge`: broker terminal bridge for gold ticks, gold history and the
//!   broker session lifecycle

pub mod nse;
pub mod yahoo;
pub mod bridge;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Bar, ExchangeQuote, FeedError, Tick};

/// Source of the ETF's end-of-day quote text.
///
/// Must not fail past this boundary: implementations return
/// `ExchangeQuote::sentinel` when nothing could be read.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeQuoteSource: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> ExchangeQuote;
}

/// Historical closes over a time range, ordered by time. An empty vector
/// means the feed answered but had nothing in range.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceHistory: Send + Sync {
    async fn range_query(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, FeedError>;
}

/// Latest top-of-book tick. Returns `Ok(None)` rather than blocking when
/// no tick is ready.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TickSource: Send + Sync {
    async fn latest_tick(&self, symbol: &str) -> Result<Option<Tick>, FeedError>;
}

/// Latest FX mid-rate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LiveFxSource: Send + Sync {
    async fn latest_mid(&self, pair: &str) -> Result<f64, FeedError>;
}

/// A broker session: the tick feed plus its lifecycle.
///
/// `connect` and `select_symbol` failures are the only fatal errors in the
/// system; everything else degrades.
#[async_trait]
pub trait BrokerSession: TickSource + PriceHistory {
    /// Establish the session.
    async fn connect(&self) -> Result<(), FeedError>;

    /// Make `symbol` available for ticks. Unknown symbols are an error.
    async fn select_symbol(&self, symbol: &str) -> Result<(), FeedError>;

    /// Close the session. Best effort.
    async fn shutdown(&self);
}

/// Strip non-ASCII characters (currency glyphs and the like) so scraped
/// text can be logged safely on any console.
pub fn ascii_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii()).collect::<String>().trim().to_string()
}

/// Map a reqwest transport failure into a `FeedError` for `feed`.
pub(crate) fn transport(feed: &'static str) -> impl FnOnce(reqwest::Error) -> FeedError {
    move |e| FeedError::Transport { feed, message: e.to_string() }
}

/// Map a body decoding failure into a `FeedError` for `feed`.
pub(crate) fn decode(feed: &'static str) -> impl FnOnce(reqwest::Error) -> FeedError {
    move |e| FeedError::Decode { feed, message: e.to_string() }
}
