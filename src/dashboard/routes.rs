//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::display::DisplaySink;
use crate::types::{AnchorSet, PriceSample, Snapshot};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Bounded copy of the session history for charting.
#[derive(Debug, Default)]
pub struct ChartBuffer {
    points: VecDeque<PriceSample>,
    /// How many history entries have been copied so far.
    seen: usize,
}

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub anchor: AnchorSet,
    pub latest: RwLock<Option<Snapshot>>,
    pub chart: RwLock<ChartBuffer>,
    chart_points: usize,
    started: chrono::DateTime<chrono::Utc>,
}

impl DashboardState {
    pub fn new(anchor: AnchorSet, chart_points: usize) -> Self {
        Self {
            anchor,
            latest: RwLock::new(None),
            chart: RwLock::new(ChartBuffer::default()),
            chart_points: chart_points.max(1),
            started: chrono::Utc::now(),
        }
    }

    /// Store the snapshot and copy any history entries not yet charted.
    pub async fn record(&self, snapshot: &Snapshot, history: &[PriceSample]) {
        *self.latest.write().await = Some(snapshot.clone());

        let mut chart = self.chart.write().await;
        let start = chart.seen.min(history.len());
        // Only the last `chart_points` of the new entries can survive.
        let fresh = &history[start..];
        let fresh = &fresh[fresh.len().saturating_sub(self.chart_points)..];
        chart.points.extend(fresh.iter().copied());
        while chart.points.len() > self.chart_points {
            chart.points.pop_front();
        }
        chart.seen = history.len();
    }
}

pub type AppState = Arc<DashboardState>;

/// Display sink that feeds the dashboard.
pub struct DashboardSink {
    state: AppState,
}

impl DashboardSink {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl DisplaySink for DashboardSink {
    async fn publish(&self, snapshot: &Snapshot, history: &[PriceSample]) {
        self.state.record(snapshot, history).await;
    }

    fn name(&self) -> &str {
        "dashboard"
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ChartPoint {
    pub timestamp: String,
    pub synthetic_price: f64,
    pub gold_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: i64,
    pub has_snapshot: bool,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/snapshot
pub async fn get_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    match state.latest.read().await.clone() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "no live data yet" })),
        )
            .into_response(),
    }
}

/// GET /api/history
pub async fn get_history(State(state): State<AppState>) -> Json<Vec<ChartPoint>> {
    let chart = state.chart.read().await;
    Json(
        chart
            .points
            .iter()
            .map(|p| ChartPoint {
                timestamp: p.timestamp.to_rfc3339(),
                synthetic_price: p.synthetic_price,
                gold_price: p.gold_price,
            })
            .collect(),
    )
}

/// GET /api/anchor
pub async fn get_anchor(State(state): State<AppState>) -> Json<AnchorSet> {
    Json(state.anchor.clone())
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: (chrono::Utc::now() - state.started).num_seconds(),
        has_snapshot: state.latest.read().await.is_some(),
    })
}
