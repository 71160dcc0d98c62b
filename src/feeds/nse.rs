//! NSE exchange quote scrape.
//!
//! Reads the ETF's last close, its indicative NAV, and the "as of" stamp
//! from the NSE equity quote JSON. Values are passed on as raw text; the
//! resolver owns all parsing.
//!
//! API: `https://www.nseindia.com/api/quote-equity?symbol={symbol}`
//! Auth: None, but the site rejects requests without browser-like headers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ascii_only, decode, transport, ExchangeQuoteSource};
use crate::types::{ExchangeQuote, FeedError};

const FEED: &str = "nse";
const DEFAULT_BASE_URL: &str = "https://www.nseindia.com";
const BROWSER_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// NSE quote client.
pub struct NseQuoteClient {
    http: Client,
    base_url: String,
}

impl NseQuoteClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_UA)
            .build()
            .context("Failed to build HTTP client for NSE")?;
        Ok(Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    async fn fetch_payload(&self, symbol: &str) -> Result<Value, FeedError> {
        let url = format!(
            "{}/api/quote-equity?symbol={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(symbol)
        );
        debug!(url = %url, "Fetching NSE quote");

        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .header("Referer", format!("{}/get-quotes/equity?symbol={symbol}", self.base_url))
            .send()
            .await
            .map_err(transport(FEED))?;

        if !resp.status().is_success() {
            return Err(FeedError::Status { feed: FEED, status: resp.status().as_u16() });
        }

        resp.json::<Value>().await.map_err(decode(FEED))
    }
}

/// Render a JSON leaf as the text a page would show. Missing fields become
/// the sentinel `"0"`.
fn text_of(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "0".to_string(),
    }
}

/// Pull the three quote fields out of an NSE `quote-equity` payload.
pub fn quote_from_payload(payload: &Value, today_text: &str) -> ExchangeQuote {
    let price_info = payload.get("priceInfo");
    let as_of = match payload.pointer("/metadata/lastUpdateTime") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => today_text.to_string(),
    };

    ExchangeQuote {
        inav: text_of(price_info.and_then(|p| p.get("iNavValue"))),
        last_close: text_of(price_info.and_then(|p| p.get("lastPrice"))),
        as_of,
    }
}

#[async_trait]
impl ExchangeQuoteSource for NseQuoteClient {
    async fn fetch_quote(&self, symbol: &str) -> ExchangeQuote {
        let today = Local::now().date_naive();
        match self.fetch_payload(symbol).await {
            Ok(payload) => {
                let quote = quote_from_payload(&payload, &today.format("%d-%b-%Y").to_string());
                info!(
                    symbol,
                    close = %ascii_only(&quote.last_close),
                    inav = %ascii_only(&quote.inav),
                    as_of = %ascii_only(&quote.as_of),
                    "NSE quote fetched"
                );
                quote
            }
            Err(e) => {
                warn!(symbol, error = %ascii_only(&e.to_string()), "NSE quote unavailable, using sentinel");
                ExchangeQuote::sentinel(today)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
