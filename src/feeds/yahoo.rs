//! Yahoo Finance FX feed.
//!
//! Serves both the one-off historical lookup used to resolve the FX
//! reference and the periodic live mid-rate refresh, from the same chart
//! endpoint with one-minute bars.
//!
//! API: `https://query1.finance.yahoo.com/v8/finance/chart/{symbol}`
//! Auth: None required.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{decode, transport, LiveFxSource, PriceHistory};
use crate::types::{Bar, FeedError};

const FEED: &str = "yahoo";
const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

// ---------------------------------------------------------------------------
// Chart API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Flatten a chart response into time-ordered bars, dropping empty minutes.
pub fn bars_from_chart(resp: &ChartResponse) -> Vec<Bar> {
    let Some(result) = resp.chart.result.as_ref().and_then(|r| r.first()) else {
        return Vec::new();
    };
    let Some(series) = result.indicators.quote.first() else {
        return Vec::new();
    };

    let mut bars: Vec<Bar> = result
        .timestamp
        .iter()
        .zip(series.close.iter())
        .filter_map(|(ts, close)| {
            let close = (*close)?;
            let time = Utc.timestamp_opt(*ts, 0).single()?;
            close.is_finite().then_some(Bar { time, close })
        })
        .collect();
    bars.sort_by_key(|b| b.time);
    bars
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct YahooFxClient {
    http: Client,
    base_url: String,
}

impl YahooFxClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("GOLDNAV/0.1.0")
            .build()
            .context("Failed to build HTTP client for Yahoo")?;
        Ok(Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    async fn fetch_chart(&self, symbol: &str, query: &str) -> Result<Vec<Bar>, FeedError> {
        let url = format!(
            "{}/v8/finance/chart/{}?{query}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(symbol),
        );
        debug!(url = %url, "Fetching Yahoo chart");

        let resp = self.http.get(&url).send().await.map_err(transport(FEED))?;
        if !resp.status().is_success() {
            return Err(FeedError::Status { feed: FEED, status: resp.status().as_u16() });
        }

        let chart: ChartResponse = resp.json().await.map_err(decode(FEED))?;
        if let Some(err) = chart.chart.error.as_ref().filter(|e| !e.is_null()) {
            return Err(FeedError::Decode { feed: FEED, message: err.to_string() });
        }
        Ok(bars_from_chart(&chart))
    }
}

#[async_trait]
impl PriceHistory for YahooFxClient {
    async fn range_query(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, FeedError> {
        let query = format!(
            "period1={}&period2={}&interval=1m",
            start.timestamp(),
            end.timestamp()
        );
        let bars = self.fetch_chart(symbol, &query).await?;
        // Yahoo pads the range to whole minutes; keep what was asked for.
        Ok(bars.into_iter().filter(|b| b.time >= start && b.time <= end).collect())
    }
}

#[async_trait]
impl LiveFxSource for YahooFxClient {
    async fn latest_mid(&self, pair: &str) -> Result<f64, FeedError> {
        let bars = self.fetch_chart(pair, "range=1d&interval=1m").await?;
        bars.last()
            .map(|b| b.close)
            .ok_or_else(|| FeedError::NoData { feed: FEED, symbol: pair.to_string() })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
