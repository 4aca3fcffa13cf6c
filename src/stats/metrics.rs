//! Server-wide counters
//!
//! Updated by the transport, read by the query endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use crate::registry::Station;

/// Live counters shared by all connections
#[derive(Debug)]
pub struct ServerStats {
    started_at: Instant,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_connections: AtomicU64,
    commands_processed: AtomicU64,
    command_errors: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            commands_processed: AtomicU64::new(0),
            command_errors: AtomicU64::new(0),
        }
    }

    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        // Saturate so an unmatched close can't wrap the gauge
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    pub fn connection_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a handled command and whether it failed
    pub fn command(&self, failed: bool) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.command_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs(),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            commands_processed: self.commands_processed.load(Ordering::Relaxed),
            command_errors: self.command_errors.load(Ordering::Relaxed),
            stations: 0,
            listeners: 0,
        }
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of the server counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub total_connections: u64,
    pub active_connections: u64,
    pub rejected_connections: u64,
    pub commands_processed: u64,
    pub command_errors: u64,
    /// Active stations
    pub stations: usize,
    /// Listeners across all stations
    pub listeners: usize,
}

impl StatsSnapshot {
    /// Fill in station and listener totals
    pub fn with_stations(mut self, stations: &[Station]) -> Self {
        self.stations = stations.len();
        self.listeners = stations.iter().map(Station::listener_count).sum();
        self
    }
}
