//! Dashboard: Axum web server for live monitoring.
//!
//! Serves the latest snapshot, the chart series and the day's anchor as
//! JSON. CORS is open for GET so a local page can poll it.

pub mod routes;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::{AppState, DashboardSink, DashboardState};

/// Start the dashboard web server.
///
/// Spawns a background task and returns immediately. Bind or serve
/// failures are logged; the live loop keeps running without a dashboard.
pub fn spawn_dashboard(state: AppState, port: u16) -> tokio::task::JoinHandle<()> {
    let app = build_router(state);

    tokio::spawn(async move {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                error!(port, error = %e, "Failed to bind dashboard port");
                return;
            }
        };
        info!(port, "Dashboard server listening on http://localhost:{port}");

        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    })
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/snapshot", get(routes::get_snapshot))
        .route("/api/history", get(routes::get_history))
        .route("/api/anchor", get(routes::get_anchor))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
