//! Station record
//!
//! This module defines the per-station state stored in the registry.

use serde::{Deserialize, Serialize};

use super::state::{ClientId, PlayerState};

/// Geographic position attached to a station (informational only)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A named broadcast owned by one client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    /// Unique station name
    pub name: String,

    /// The broadcasting client
    pub owner_id: ClientId,

    /// Listeners in join order, never containing the owner
    pub listeners: Vec<ClientId>,

    /// Optional position of the broadcaster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,

    /// Latest player state, absent until the owner publishes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_state: Option<PlayerState>,
}

impl Station {
    /// Create a new station with no listeners and no player state
    pub(super) fn new(name: String, owner_id: ClientId, coordinate: Option<Coordinate>) -> Self {
        Self {
            name,
            owner_id,
            listeners: Vec::new(),
            coordinate,
            player_state: None,
        }
    }

    /// Number of listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Check if the owner has published at least one player state
    pub fn is_ready(&self) -> bool {
        self.player_state.is_some()
    }

    /// Check if a client is listening to this station
    pub fn has_listener(&self, id: &ClientId) -> bool {
        self.listeners.contains(id)
    }
}
