//! Events delivered to clients
//!
//! On the wire an event is `{"type": <tag>, "payload": <value>}`, with the
//! payload omitted for `broadcast-ended`.

use serde::Serialize;

use crate::registry::PlayerState;

/// Kind of event, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    BroadcastChanged,
    BroadcastEnded,
    ListenerCountChanged,
}

impl EventType {
    /// Wire tag for this event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::BroadcastChanged => "player-state-updated",
            EventType::BroadcastEnded => "broadcast-ended",
            EventType::ListenerCountChanged => "listener",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification pushed into a client's channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// The station's owner published a new player state
    #[serde(rename = "player-state-updated")]
    BroadcastChanged(PlayerState),

    /// The station was torn down
    #[serde(rename = "broadcast-ended")]
    BroadcastEnded,

    /// The station's listener count changed
    ///
    /// Never emitted by the controller's own operations; the transport layer
    /// sends it through `ControllerState::announce_listener_count`.
    #[serde(rename = "listener")]
    ListenerCountChanged(usize),
}

impl Event {
    /// Get the event type
    pub fn event_type(&self) -> EventType {
        match self {
            Event::BroadcastChanged(_) => EventType::BroadcastChanged,
            Event::BroadcastEnded => EventType::BroadcastEnded,
            Event::ListenerCountChanged(_) => EventType::ListenerCountChanged,
        }
    }
}
