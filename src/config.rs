//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section carries defaults, so a partial file (or none of a
//! section) still yields a runnable configuration. Secrets (the broker
//! bridge token) are referenced by env-var name and resolved at runtime.

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub instrument: InstrumentConfig,
    pub anchor: AnchorConfig,
    pub live: LiveConfig,
    pub feeds: FeedsConfig,
    pub dashboard: DashboardConfig,
}

/// The three instruments the tracker is wired to.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Exchange symbol of the ETF whose close anchors the day.
    pub etf_symbol: String,
    /// Broker symbol of the gold spot driver.
    pub gold_symbol: String,
    /// FX pair symbol on the FX feed.
    pub fx_pair: String,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            etf_symbol: "GOLDIETF".to_string(),
            gold_symbol: "XAUUSD".to_string(),
            fx_pair: "USDINR=X".to_string(),
        }
    }
}

/// Anchor instant, search windows and terminal fallbacks for the resolver.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnchorConfig {
    pub hour: u32,
    pub minute: u32,
    /// Exchange-local offset from UTC in minutes (330 = IST).
    pub utc_offset_minutes: i32,
    pub gold_lookback_mins: i64,
    pub gold_lookahead_mins: i64,
    pub fx_lookback_mins: i64,
    pub fx_lookahead_mins: i64,
    pub fallback_gold_ref: f64,
    pub fallback_fx_ref: f64,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            hour: 15,
            minute: 30,
            utc_offset_minutes: 330,
            gold_lookback_mins: 20,
            gold_lookahead_mins: 5,
            fx_lookback_mins: 30,
            fx_lookahead_mins: 5,
            fallback_gold_ref: 2650.0,
            fallback_fx_ref: 84.50,
        }
    }
}

impl AnchorConfig {
    /// The exchange timezone as a fixed offset. Out-of-range values fall
    /// back to UTC.
    pub fn exchange_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

/// Cadences and statistics settings for the live loop.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LiveConfig {
    pub fx_refresh_secs: u64,
    pub ui_interval_ms: u64,
    pub idle_backoff_ms: u64,
    /// FX mid used until the first successful refresh.
    pub initial_fx_mid: f64,
    pub volatility_window: usize,
    pub volatility_min_samples: usize,
    /// Minimum spacing between console summary lines.
    pub log_every_secs: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            fx_refresh_secs: 30,
            ui_interval_ms: 100,
            idle_backoff_ms: 100,
            initial_fx_mid: 84.0,
            volatility_window: 150,
            volatility_min_samples: 10,
            log_every_secs: 5,
        }
    }
}

impl LiveConfig {
    pub fn fx_refresh(&self) -> Duration {
        Duration::from_secs(self.fx_refresh_secs.max(1))
    }

    pub fn ui_interval(&self) -> Duration {
        Duration::from_millis(self.ui_interval_ms.max(1))
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms.max(1))
    }
}

/// Endpoints of the external collaborators.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedsConfig {
    pub exchange_base_url: String,
    pub fx_base_url: String,
    pub broker_base_url: String,
    /// Name of the env var holding the broker bridge bearer token.
    pub broker_token_env: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            exchange_base_url: "https://www.nseindia.com".to_string(),
            fx_base_url: "https://query1.finance.yahoo.com".to_string(),
            broker_base_url: "http://127.0.0.1:8228".to_string(),
            broker_token_env: None,
            request_timeout_secs: 15,
        }
    }
}

impl FeedsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
    /// Number of recent samples kept for the chart endpoint.
    pub chart_points: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8090,
            chart_points: 600,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
