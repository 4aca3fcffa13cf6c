//! Identity and playback types shared by the registry and the controller
//!
//! `ClientId` identifies a connected client; `PlayerState` is the snapshot a
//! broadcaster publishes and listeners receive.

use serde::{Deserialize, Serialize};

/// Opaque identifier for a connected client
///
/// Assigned by the transport before any command is accepted and stable for
/// the lifetime of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Create a new client id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a client id from a transport session id
    pub fn from_session(session_id: u64) -> Self {
        Self(format!("client-{}", session_id))
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Playback snapshot published by a station's owner
///
/// Replaced wholesale on every update; fields are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Producer-supplied monotonic marker, any JSON number
    pub timestamp: f64,
    /// Whether playback is paused
    pub is_paused: bool,
    /// Opaque track identifier
    #[serde(rename = "trackURI")]
    pub track_uri: String,
    /// Offset into the track
    pub playback_position: f64,
}

impl PlayerState {
    /// Create a new player state
    pub fn new(
        timestamp: f64,
        is_paused: bool,
        track_uri: impl Into<String>,
        playback_position: f64,
    ) -> Self {
        Self {
            timestamp,
            is_paused,
            track_uri: track_uri.into(),
            playback_position,
        }
    }
}
