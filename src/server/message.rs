//! Wire protocol
//!
//! Newline-delimited JSON in both directions. Each inbound line is a
//! [`Request`]; the server answers every request with an `ack` and pushes
//! `event` messages as they are emitted for the client.
//!
//! ```text
//! -> {"id":1,"type":"start-broadcast","name":"jazz"}
//! <- {"kind":"ack","id":1}
//! -> {"id":2,"type":"join-broadcast","name":"rock"}
//! <- {"kind":"ack","id":2,"error":"Broadcast doesn't exist"}
//! <- {"kind":"event","event":{"type":"broadcast-ended"}}
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::controller::{Event, StationRequest};
use crate::error::Result;
use crate::registry::{PlayerState, Station};

/// Inbound message
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Request {
    /// Correlation id echoed in the ack
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(flatten)]
    pub command: Command,
}

/// Command carried by a request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    StartBroadcast(StationRequest),
    EndBroadcast,
    JoinBroadcast {
        name: String,
    },
    LeaveBroadcast,
    PlayerStateChanged {
        #[serde(default)]
        state: Option<PlayerState>,
    },
    ListStations,
}

impl Command {
    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Command::StartBroadcast(_) => "start-broadcast",
            Command::EndBroadcast => "end-broadcast",
            Command::JoinBroadcast { .. } => "join-broadcast",
            Command::LeaveBroadcast => "leave-broadcast",
            Command::PlayerStateChanged { .. } => "player-state-changed",
            Command::ListStations => "list-stations",
        }
    }
}

/// Outbound message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Reply to a request
    Ack {
        id: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        state: Option<PlayerState>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stations: Option<Vec<Station>>,
    },

    /// Event from the client's notification channel
    Event { event: Event },
}

impl ServerMessage {
    /// Successful ack with no payload
    pub fn ack(id: Option<u64>) -> Self {
        ServerMessage::Ack {
            id,
            error: None,
            state: None,
            stations: None,
        }
    }

    /// Ack carrying an error message
    pub fn rejected(id: Option<u64>, error: impl std::fmt::Display) -> Self {
        ServerMessage::Ack {
            id,
            error: Some(error.to_string()),
            state: None,
            stations: None,
        }
    }

    /// Ack for a successful join
    pub fn joined(id: Option<u64>, state: PlayerState) -> Self {
        ServerMessage::Ack {
            id,
            error: None,
            state: Some(state),
            stations: None,
        }
    }

    /// Ack carrying the station list
    pub fn stations(id: Option<u64>, stations: Vec<Station>) -> Self {
        ServerMessage::Ack {
            id,
            error: None,
            state: None,
            stations: Some(stations),
        }
    }

    pub fn event(event: Event) -> Self {
        ServerMessage::Event { event }
    }

    /// Encode as one newline-terminated line
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(128).writer();
        serde_json::to_writer(&mut buf, self)?;

        let mut buf = buf.into_inner();
        buf.put_u8(b'\n');
        Ok(buf.freeze())
    }
}
