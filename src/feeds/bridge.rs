//! Broker terminal bridge.
//!
//! The gold tick feed and gold history come from a broker trading terminal
//! exposed over a small local REST bridge. The bridge owns the terminal
//! login; this client only checks that the session is up, selects the
//! symbol, polls ticks, pulls one-minute rates, and closes the session.
//!
//! Endpoints (relative to the configured base URL):
//! - `GET  /api/v1/status`                  → `{ "connected": bool, "account": str? }`
//! - `POST /api/v1/symbols/{symbol}/select` → 200, or 404 for unknown symbols
//! - `GET  /api/v1/ticks/{symbol}`          → `{ "bid", "ask", "time", "time_msc"? }`, or 204 when none
//! - `GET  /api/v1/rates/{symbol}?timeframe=M1&from=&to=` → `[{ "time", "close" }]`
//! - `POST /api/v1/session/close`
//!
//! Times are Unix seconds, UTC. Ticks may also carry `time_msc` in Unix
//! milliseconds, which is preferred when present.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{decode, transport, BrokerSession, PriceHistory, TickSource};
use crate::types::{Bar, FeedError, Tick};

const FEED: &str = "bridge";

// ---------------------------------------------------------------------------
// Bridge response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    connected: bool,
    #[serde(default)]
    account: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickResponse {
    bid: f64,
    ask: f64,
    time: i64,
    #[serde(default)]
    time_msc: Option<i64>,
}

impl TickResponse {
    fn tick_time(&self) -> Option<DateTime<Utc>> {
        match self.time_msc {
            Some(ms) => Utc.timestamp_millis_opt(ms).single(),
            None => unix_time(self.time),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RateRow {
    time: i64,
    close: f64,
}

fn unix_time(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct BrokerBridgeClient {
    http: Client,
    base_url: String,
    token: Option<Secret<String>>,
}

impl BrokerBridgeClient {
    pub fn new(base_url: String, token: Option<Secret<String>>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("GOLDNAV/0.1.0")
            .build()
            .context("Failed to build HTTP client for broker bridge")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base_url)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }
}

#[async_trait]
impl TickSource for BrokerBridgeClient {
    async fn latest_tick(&self, symbol: &str) -> Result<Option<Tick>, FeedError> {
        let url = self.url(&format!("ticks/{}", urlencoding::encode(symbol)));
        let resp = self.authed(self.http.get(&url)).send().await.map_err(transport(FEED))?;

        match resp.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => return Ok(None),
            s if !s.is_success() => {
                return Err(FeedError::Status { feed: FEED, status: s.as_u16() })
            }
            _ => {}
        }

        let tick: TickResponse = resp.json().await.map_err(decode(FEED))?;
        Ok(tick.tick_time().map(|time| Tick { bid: tick.bid, ask: tick.ask, time }))
    }
}

#[async_trait]
impl PriceHistory for BrokerBridgeClient {
    async fn range_query(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, FeedError> {
        let url = format!(
            "{}?timeframe=M1&from={}&to={}",
            self.url(&format!("rates/{}", urlencoding::encode(symbol))),
            start.timestamp(),
            end.timestamp(),
        );
        debug!(url = %url, "Fetching broker rates");

        let resp = self.authed(self.http.get(&url)).send().await.map_err(transport(FEED))?;
        if !resp.status().is_success() {
            return Err(FeedError::Status { feed: FEED, status: resp.status().as_u16() });
        }

        let rows: Vec<RateRow> = resp.json().await.map_err(decode(FEED))?;
        let mut bars: Vec<Bar> = rows
            .into_iter()
            .filter_map(|r| unix_time(r.time).map(|time| Bar { time, close: r.close }))
            .collect();
        bars.sort_by_key(|b| b.time);
        Ok(bars)
    }
}

#[async_trait]
impl BrokerSession for BrokerBridgeClient {
    async fn connect(&self) -> Result<(), FeedError> {
        let resp = self
            .authed(self.http.get(self.url("status")))
            .send()
            .await
            .map_err(|e| FeedError::SessionUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(FeedError::SessionUnavailable(format!(
                "bridge status returned HTTP {}",
                resp.status()
            )));
        }

        let status: StatusResponse = resp
            .json()
            .await
            .map_err(|e| FeedError::SessionUnavailable(e.to_string()))?;
        if !status.connected {
            return Err(FeedError::SessionUnavailable(
                "terminal is not logged in".to_string(),
            ));
        }

        info!(account = ?status.account, "Broker session established");
        Ok(())
    }

    async fn select_symbol(&self, symbol: &str) -> Result<(), FeedError> {
        let url = self.url(&format!("symbols/{}/select", urlencoding::encode(symbol)));
        let resp = self.authed(self.http.post(&url)).send().await.map_err(transport(FEED))?;

        match resp.status() {
            s if s.is_success() => {
                debug!(symbol, "Symbol selected");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(FeedError::UnknownSymbol(symbol.to_string())),
            s => Err(FeedError::Status { feed: FEED, status: s.as_u16() }),
        }
    }

    async fn shutdown(&self) {
        match self.authed(self.http.post(self.url("session/close"))).send().await {
            Ok(resp) if resp.status().is_success() => info!("Broker session closed"),
            Ok(resp) => warn!(status = %resp.status(), "Broker session close rejected"),
            Err(e) => warn!(error = %e, "Broker session close failed"),
        }
    }
}
