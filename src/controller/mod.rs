//! Broadcast controller
//!
//! The controller is the public surface of the core. It owns the station
//! registry and one bounded notification channel per client, applies the
//! lifecycle rules and fans events out to listeners.
//!
//! # Client states
//!
//! ```text
//!          start                          join
//!   Idle ──────────► Broadcasting   Idle ──────────► Listening
//!    ▲                    │          ▲                   │
//!    └─── stop / remove ──┘          └── leave / remove ─┘
//!
//!   Broadcasting ── join ──► implicit stop ──► Listening
//!   Listening ──── start ──► implicit leave ─► Broadcasting
//! ```
//!
//! Broadcasting and listening are mutually exclusive: moving between them
//! always passes through the implicit stop or leave, so listeners of a
//! replaced station receive `BroadcastEnded` exactly as for an explicit stop.
//!
//! # Fan-out
//!
//! Events are pushed with `try_send`. A full or closed channel drops the
//! event; the controller never waits for a slow client.
//!
//! # Transactions
//!
//! `BroadcastController::transaction` hands a closure the `ControllerState`
//! under the write lock. The transport uses it to read a client's role, run
//! the command and queue the reply without another operation slipping in.

pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod event;

pub use broadcast::{BroadcastController, ClientRole, ControllerState, StationRequest};
pub use client::{ClientHandle, EventSink};
pub use config::ControllerConfig;
pub use error::ClientError;
pub use event::{Event, EventType};
