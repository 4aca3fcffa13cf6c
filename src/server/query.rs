//! HTTP query endpoint
//!
//! Read-only diagnostics over plain HTTP:
//!
//! - `GET /` and `GET /ping`: liveness check
//! - `GET /stations`: JSON snapshot of every station
//! - `GET /stats`: server counters

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;

use crate::controller::BroadcastController;
use crate::error::Result;
use crate::registry::Station;
use crate::stats::{ServerStats, StatsSnapshot};

/// Body returned by the liveness routes
pub const PING_RESPONSE: &str = "We have a signal!";

#[derive(Clone)]
struct QueryState {
    controller: Arc<BroadcastController>,
    stats: Arc<ServerStats>,
}

/// Build the query router
pub fn router(controller: Arc<BroadcastController>, stats: Arc<ServerStats>) -> Router {
    Router::new()
        .route("/", get(ping))
        .route("/ping", get(ping))
        .route("/stations", get(stations))
        .route("/stats", get(server_stats))
        .with_state(QueryState { controller, stats })
}

/// Serve the router until the listener fails
pub async fn serve(listener: TcpListener, router: Router) -> Result<()> {
    axum::serve(listener, router).await?;
    Ok(())
}

async fn ping() -> &'static str {
    PING_RESPONSE
}

async fn stations(State(state): State<QueryState>) -> Json<Vec<Station>> {
    Json(state.controller.get_stations().await)
}

async fn server_stats(State(state): State<QueryState>) -> Json<StatsSnapshot> {
    let stations = state.controller.get_stations().await;
    Json(state.stats.snapshot().with_stations(&stations))
}
