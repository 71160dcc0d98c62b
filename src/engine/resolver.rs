//! Reference resolver.
//!
//! Builds the day's `AnchorSet` before live operation starts, from three
//! independently failing lookups:
//!
//! 1. the exchange quote (ETF close, iNAV, as-of date text),
//! 2. gold history around the 15:30 exchange-local anchor instant,
//! 3. FX history around the same instant.
//!
//! Every lookup has a terminal fallback, so `resolve` never fails. Each
//! reference is settled by walking an ordered list of attempts and taking
//! the first that produced a usable value:
//!
//! - gold: historical sample at or before the anchor → current broker tick → constant
//! - FX:   historical sample nearest the anchor → constant
//!
//! Gold uses a strictly at-or-before policy while FX tolerates the nearest
//! sample on either side. FX minute data is sparser, so a near-miss after
//! the anchor is accepted there and not for gold.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{info, warn};

use crate::config::{AnchorConfig, InstrumentConfig};
use crate::feeds::{ascii_only, ExchangeQuoteSource, PriceHistory, TickSource};
use crate::types::{AnchorSet, Bar, RefSource, ReferenceError};

/// Price used for both close and iNAV when the quote text is unparseable.
const UNPARSEABLE_PRICE: f64 = 1.0;

// ---------------------------------------------------------------------------
// Text parsing
// ---------------------------------------------------------------------------

/// Parse a displayed price, ignoring thousands separators, whitespace and
/// currency glyphs.
pub fn parse_price(text: &str) -> Result<f64, ReferenceError> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '₹' | '$') && !c.is_whitespace())
        .collect();

    // Decimal validates the text; the float comes from its normalized form
    // so "68.2543" maps to the nearest f64.
    Decimal::from_str(&cleaned)
        .ok()
        .and_then(|d| f64::from_str(&d.normalize().to_string()).ok())
        .ok_or_else(|| ReferenceError::Parse(ascii_only(text)))
}

/// Parse the ETF close and iNAV together. If either is unparseable both
/// become `1.0`; a zero close becomes `1.0`.
pub fn parse_closing_prices(close_text: &str, inav_text: &str) -> (f64, f64) {
    let (close, inav) = match (parse_price(close_text), parse_price(inav_text)) {
        (Ok(close), Ok(inav)) => (close, inav),
        (close, inav) => {
            warn!(
                close = ?close.err(),
                inav = ?inav.err(),
                "Could not parse exchange prices, defaulting to 1.0"
            );
            (UNPARSEABLE_PRICE, UNPARSEABLE_PRICE)
        }
    };

    let close = if close == 0.0 { UNPARSEABLE_PRICE } else { close };
    (close, inav)
}

/// Find the first `DD-Mon-YYYY` token anywhere in `raw`.
fn find_day_month_year(raw: &str) -> Option<NaiveDate> {
    const LEN: usize = "27-Jan-2025".len();
    let bytes = raw.as_bytes();
    if bytes.len() < LEN {
        return None;
    }

    (0..=bytes.len() - LEN).find_map(|i| {
        let w = &bytes[i..i + LEN];
        let shaped = w[0].is_ascii_digit()
            && w[1].is_ascii_digit()
            && w[2] == b'-'
            && w[3..6].iter().all(u8::is_ascii_alphabetic)
            && w[6] == b'-'
            && w[7..].iter().all(u8::is_ascii_digit);
        if !shaped {
            return None;
        }
        // The window is pure ASCII, so slicing at i is on a char boundary.
        NaiveDate::parse_from_str(&raw[i..i + LEN], "%d-%b-%Y").ok()
    })
}

/// Parse the exchange's "as of" text into a calendar date.
///
/// Tries a `DD-Mon-YYYY` token anywhere in the text, then the whole text as
/// `DD-Mon-YYYY HH:MM:SS`, then gives up and returns `today`.
pub fn parse_as_of_date(raw: &str, today: NaiveDate) -> NaiveDate {
    if let Some(date) = find_day_month_year(raw) {
        return date;
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw.trim(), "%d-%b-%Y %H:%M:%S") {
        return dt.date();
    }
    warn!(raw = %ascii_only(raw), %today, "Unrecognised as-of date, using today");
    today
}

// ---------------------------------------------------------------------------
// Sample selection
// ---------------------------------------------------------------------------

/// The exchange-local `hour:minute` on `date`, in UTC.
pub fn anchor_instant(date: NaiveDate, hour: u32, minute: u32, offset: FixedOffset) -> DateTime<Utc> {
    let local = date
        .and_hms_opt(hour, minute, 0)
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN));
    match offset.from_local_datetime(&local).single() {
        Some(dt) => dt.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&local),
    }
}

/// Latest sample whose time is at or before `anchor`.
pub fn latest_at_or_before(bars: &[Bar], anchor: DateTime<Utc>) -> Option<Bar> {
    bars.iter().filter(|b| b.time <= anchor).max_by_key(|b| b.time).copied()
}

/// Latest sample at or before `anchor`, else the sample closest to it.
pub fn nearest_to(bars: &[Bar], anchor: DateTime<Utc>) -> Option<Bar> {
    latest_at_or_before(bars, anchor)
        .or_else(|| bars.iter().min_by_key(|b| (b.time - anchor).abs()).copied())
}

fn usable(value: f64) -> Result<f64, ReferenceError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ReferenceError::Unusable(value))
    }
}

/// Take the first successful attempt, or `terminal` as a `Constant`.
fn settle(
    reference: &'static str,
    attempts: Vec<(RefSource, Result<f64, ReferenceError>)>,
    terminal: f64,
) -> (f64, RefSource) {
    for (source, outcome) in attempts {
        match outcome {
            Ok(value) => return (value, source),
            Err(e) => warn!(reference, %source, error = %e, "Reference attempt failed"),
        }
    }
    warn!(reference, value = terminal, "Using constant fallback");
    (terminal, RefSource::Constant)
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves the anchor set from the exchange quote and the two histories.
pub struct ReferenceResolver<'a> {
    quotes: &'a dyn ExchangeQuoteSource,
    gold_history: &'a dyn PriceHistory,
    gold_ticks: &'a dyn TickSource,
    fx_history: &'a dyn PriceHistory,
    instrument: InstrumentConfig,
    anchor: AnchorConfig,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(
        quotes: &'a dyn ExchangeQuoteSource,
        gold_history: &'a dyn PriceHistory,
        gold_ticks: &'a dyn TickSource,
        fx_history: &'a dyn PriceHistory,
        instrument: InstrumentConfig,
        anchor: AnchorConfig,
    ) -> Self {
        Self { quotes, gold_history, gold_ticks, fx_history, instrument, anchor }
    }

    /// Resolve the anchor set. `today` is the fallback reference date.
    pub async fn resolve(&self, today: NaiveDate) -> AnchorSet {
        let quote = self.quotes.fetch_quote(&self.instrument.etf_symbol).await;
        let (etf_ref, nav_ref) = parse_closing_prices(&quote.last_close, &quote.inav);
        let ref_date = parse_as_of_date(&quote.as_of, today);

        let at = anchor_instant(
            ref_date,
            self.anchor.hour,
            self.anchor.minute,
            self.anchor.exchange_offset(),
        );
        info!(%ref_date, anchor = %at, etf_ref, nav_ref, "Resolving references");

        let (gold_hist, fx_hist) = futures::join!(self.historical_gold(at), self.historical_fx(at));

        let mut gold_attempts = vec![(RefSource::Historical, gold_hist)];
        if gold_attempts[0].1.is_err() {
            gold_attempts.push((RefSource::LiveTick, self.live_gold().await));
        }
        let (gold_ref, gold_source) = settle("gold", gold_attempts, self.anchor.fallback_gold_ref);

        let (fx_ref, fx_source) = settle(
            "fx",
            vec![(RefSource::Historical, fx_hist)],
            self.anchor.fallback_fx_ref,
        );

        let anchor = AnchorSet::new(etf_ref, nav_ref, gold_ref, fx_ref, ref_date)
            .with_sources(gold_source, fx_source);
        info!(%anchor, premium_close = anchor.premium_close(), "Anchor set resolved");
        anchor
    }

    async fn historical_gold(&self, at: DateTime<Utc>) -> Result<f64, ReferenceError> {
        let symbol = &self.instrument.gold_symbol;
        let bars = self
            .gold_history
            .range_query(
                symbol,
                at - Duration::minutes(self.anchor.gold_lookback_mins),
                at + Duration::minutes(self.anchor.gold_lookahead_mins),
            )
            .await?;
        if bars.is_empty() {
            return Err(ReferenceError::NoSamples { symbol: symbol.clone() });
        }

        let bar = latest_at_or_before(&bars, at)
            .ok_or_else(|| ReferenceError::NoneAtOrBefore { symbol: symbol.clone(), anchor: at })?;
        info!(price = bar.close, time = %bar.time, "Gold reference from history");
        usable(bar.close)
    }

    async fn historical_fx(&self, at: DateTime<Utc>) -> Result<f64, ReferenceError> {
        let pair = &self.instrument.fx_pair;
        let bars = self
            .fx_history
            .range_query(
                pair,
                at - Duration::minutes(self.anchor.fx_lookback_mins),
                at + Duration::minutes(self.anchor.fx_lookahead_mins),
            )
            .await?;

        let bar = nearest_to(&bars, at).ok_or_else(|| ReferenceError::NoSamples { symbol: pair.clone() })?;
        info!(rate = bar.close, time = %bar.time, "FX reference from history");
        usable(bar.close)
    }

    async fn live_gold(&self) -> Result<f64, ReferenceError> {
        let tick = self
            .gold_ticks
            .latest_tick(&self.instrument.gold_symbol)
            .await?
            .ok_or(ReferenceError::NoTick)?;
        usable(tick.ask)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
