//! Ad-hoc radio stations over TCP
//!
//! One client broadcasts a continuously updated player state (track,
//! position, pause flag) under a station name; any number of other clients
//! join that station and receive every update plus an end-of-broadcast
//! notification. Only playback state is relayed, never media.
//!
//! The crate is layered:
//!
//! - [`registry`]: the station table and its invariants, pure data
//! - [`controller`]: client lifecycle, role rules and event fan-out
//! - [`server`]: TCP transport and HTTP query endpoint
//! - [`stats`]: server counters
//!
//! # Example
//!
//! ```no_run
//! use radio_relay::{RadioServer, ServerConfig};
//!
//! # async fn example() -> radio_relay::error::Result<()> {
//! let server = RadioServer::new(ServerConfig::from_env());
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! The controller can also be driven directly:
//!
//! ```
//! use radio_relay::controller::{BroadcastController, Event, StationRequest};
//! use radio_relay::registry::{ClientId, PlayerState};
//!
//! # tokio_test::block_on(async {
//! let controller = BroadcastController::new();
//! let dj = ClientId::new("dj");
//! let fan = ClientId::new("fan");
//! let _dj_events = controller.add_client(dj.clone()).await;
//! let mut fan_events = controller.add_client(fan.clone()).await;
//!
//! controller.start_broadcasting(&dj, StationRequest::new("jazz")).await.unwrap();
//! let state = PlayerState::new(1.0, false, "t1", 0.0);
//! controller.update_player_state(&dj, Some(state.clone())).await.unwrap();
//! assert_eq!(controller.join_broadcast(&fan, "jazz").await, Ok(state));
//!
//! controller.remove_client(&dj).await;
//! assert_eq!(fan_events.recv().await, Some(Event::BroadcastEnded));
//! # });
//! ```

pub mod controller;
pub mod error;
pub mod registry;
pub mod server;
pub mod stats;

pub use controller::{BroadcastController, ClientError, ControllerConfig, Event};
pub use error::{Error, Result};
pub use registry::{ClientId, PlayerState, Station};
pub use server::{RadioServer, ServerConfig};
