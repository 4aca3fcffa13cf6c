//! Station registry
//!
//! The registry is the canonical in-memory table of stations and their
//! listener sets. It is pure data: no I/O, no locking and no user-facing
//! errors. The controller checks business rules before it mutates anything.
//!
//! # Layout
//!
//! ```text
//!                       StationRegistry
//!              ┌──────────────────────────────┐
//!              │ stations:  name ─► Station   │
//!              │ owners:    id   ─► name      │
//!              │ listeners: id   ─► name      │
//!              └──────────────────────────────┘
//! ```
//!
//! The two id indices make "which station does this client own / listen to"
//! a map lookup instead of a scan, and guarantee that a client appears in at
//! most one role per station table.

pub mod state;
pub mod station;
pub mod store;

pub use state::{ClientId, PlayerState};
pub use station::{Coordinate, Station};
pub use store::StationRegistry;
