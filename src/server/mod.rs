//! Radio server
//!
//! The transport around the controller: a TCP listener speaking
//! newline-delimited JSON to clients, plus an optional HTTP query endpoint.
//!
//! ```text
//!   TcpListener ──accept──► Connection (one task per client)
//!                             │  read:  Request ──► BroadcastController
//!                             │  write: one queue of acks + events
//!                             └─ on close: remove_client
//!
//!   query TcpListener ──► axum Router ──► get_stations() / stats
//! ```

pub mod config;
pub mod connection;
pub mod listener;
pub mod message;
pub mod query;

pub use config::ServerConfig;
pub use listener::RadioServer;
pub use message::{Command, Request, ServerMessage};
