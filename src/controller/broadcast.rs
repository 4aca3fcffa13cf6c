//! Broadcast controller implementation
//!
//! Tracks connected clients, applies the station lifecycle rules on top of
//! the registry and fans events out to each client's notification channel.

use std::collections::HashMap;

use serde::Deserialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

use super::client::{ClientHandle, EventSink};
use super::config::ControllerConfig;
use super::error::ClientError;
use super::event::Event;
use crate::registry::{ClientId, Coordinate, PlayerState, Station, StationRegistry};

/// Station a client asks to start broadcasting
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationRequest {
    pub name: String,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
}

impl StationRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            coordinate: None,
        }
    }

    pub fn with_coordinate(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }
}

/// What a client is currently doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRole {
    /// Neither broadcasting nor listening
    Idle,
    /// Owns the named station
    Broadcasting(String),
    /// Listens to the named station
    Listening(String),
}

/// Clients, stations and their sinks
///
/// Every method runs to completion without awaiting, so holding the
/// controller's write lock makes each operation a critical section. Callers
/// that need several steps to happen atomically get a `&mut ControllerState`
/// through [`BroadcastController::transaction`].
pub struct ControllerState {
    registry: StationRegistry,
    clients: HashMap<ClientId, Box<dyn EventSink>>,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            registry: StationRegistry::new(),
            clients: HashMap::new(),
        }
    }

    /// Deliver an event to one client, dropping it if the client is unknown
    pub fn notify_client(&self, id: &ClientId, event: Event) {
        let Some(sink) = self.clients.get(id) else {
            return;
        };

        let event_type = event.event_type();
        match sink.try_deliver(event) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                tracing::warn!(
                    client = %id,
                    event = %event_type,
                    "Notification channel full, event dropped"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(client = %id, "Notification channel closed, event dropped");
            }
        }
    }

    /// Deliver an event to every listener of a station, in join order
    pub fn notify_station(&self, name: &str, event: &Event) {
        let Some(station) = self.registry.find_by_name(name) else {
            return;
        };

        for listener in &station.listeners {
            self.notify_client(listener, event.clone());
        }
    }

    /// Tell a station's owner and its listeners, except `changed_by`, how
    /// many listeners the station now has
    pub fn announce_listener_count(&self, name: &str, changed_by: &ClientId) {
        let Some(station) = self.registry.find_by_name(name) else {
            return;
        };

        let event = Event::ListenerCountChanged(station.listener_count());
        self.notify_client(&station.owner_id, event.clone());
        for listener in station.listeners.iter().filter(|l| *l != changed_by) {
            self.notify_client(listener, event.clone());
        }
    }

    fn add_sink(&mut self, id: ClientId, sink: Box<dyn EventSink>) {
        if self.clients.insert(id.clone(), sink).is_some() {
            tracing::warn!(client = %id, "Client re-added, previous channel closed");
        }

        tracing::debug!(client = %id, clients = self.clients.len(), "Client added");
    }

    /// Leave, stop broadcasting, drop the sink and forget the client
    pub fn remove_client(&mut self, id: &ClientId) {
        self.leave_broadcast(id);
        self.stop_broadcasting(id);

        // Dropping the sink closes the channel
        if self.clients.remove(id).is_some() {
            tracing::debug!(client = %id, clients = self.clients.len(), "Client removed");
        }
    }

    /// Start broadcasting a station
    pub fn start_broadcasting(
        &mut self,
        id: &ClientId,
        request: StationRequest,
    ) -> Result<(), ClientError> {
        if let Some(station) = self.registry.find_by_owner(id) {
            if station.name == request.name {
                return Ok(());
            }
        }

        if request.name.is_empty() {
            return Err(ClientError::InvalidName);
        }

        if let Some(station) = self.registry.find_by_name(&request.name) {
            if station.owner_id != *id {
                return Err(ClientError::NameTaken);
            }
        }

        self.leave_broadcast(id);
        self.stop_broadcasting(id);

        let created = self.registry.create(&request.name, id, request.coordinate);
        debug_assert!(created, "station checks passed but create failed");
        tracing::info!(station = %request.name, owner = %id, "Broadcast started");
        Ok(())
    }

    /// Stop the client's broadcast, notifying its listeners
    pub fn stop_broadcasting(&mut self, id: &ClientId) {
        let Some(name) = self.registry.find_by_owner(id).map(|s| s.name.clone()) else {
            return;
        };

        self.notify_station(&name, &Event::BroadcastEnded);

        if let Some(station) = self.registry.delete(&name) {
            tracing::info!(
                station = %name,
                listeners = station.listener_count(),
                "Broadcast ended"
            );
        }
    }

    /// Join a station as a listener, returning its current player state
    pub fn join_broadcast(&mut self, id: &ClientId, name: &str) -> Result<PlayerState, ClientError> {
        if let Some(station) = self.registry.find_by_listener(id) {
            if station.name == name {
                return station.player_state.clone().ok_or(ClientError::NotStarted);
            }
        }

        let station = self.registry.find_by_name(name).ok_or(ClientError::NotFound)?;
        if station.owner_id == *id {
            return Err(ClientError::OwnStation);
        }
        let state = station.player_state.clone().ok_or(ClientError::NotStarted)?;

        self.stop_broadcasting(id);
        self.leave_broadcast(id);

        let added = self.registry.add_listener(name, id);
        debug_assert!(added, "join checks passed but add_listener failed");
        tracing::info!(
            station = %name,
            client = %id,
            listeners = self.registry.listener_count(name).unwrap_or(0),
            "Client joined broadcast"
        );

        Ok(state)
    }

    /// Publish a new player state to the client's station
    pub fn update_player_state(
        &mut self,
        id: &ClientId,
        state: Option<PlayerState>,
    ) -> Result<(), ClientError> {
        let name = self
            .registry
            .find_by_owner(id)
            .map(|s| s.name.clone())
            .ok_or(ClientError::NotBroadcasting)?;
        let state = state.ok_or(ClientError::InvalidPayload)?;

        self.registry.set_player_state(&name, state.clone());

        tracing::debug!(
            station = %name,
            timestamp = state.timestamp,
            paused = state.is_paused,
            "Player state updated"
        );

        self.notify_station(&name, &Event::BroadcastChanged(state));
        Ok(())
    }

    /// Stop listening to the current station, if any
    pub fn leave_broadcast(&mut self, id: &ClientId) {
        let Some(name) = self.registry.find_by_listener(id).map(|s| s.name.clone()) else {
            return;
        };

        self.registry.remove_listener(&name, id);
        tracing::info!(station = %name, client = %id, "Client left broadcast");
    }

    /// Copy of all station records
    pub fn stations(&self) -> Vec<Station> {
        self.registry.snapshot()
    }

    /// What the client is currently doing
    pub fn role(&self, id: &ClientId) -> ClientRole {
        if let Some(station) = self.registry.find_by_owner(id) {
            ClientRole::Broadcasting(station.name.clone())
        } else if let Some(station) = self.registry.find_by_listener(id) {
            ClientRole::Listening(station.name.clone())
        } else {
            ClientRole::Idle
        }
    }
}

/// Central coordinator for clients and stations
///
/// Construct one per server and share it as `Arc<BroadcastController>`.
/// Every mutating operation takes the write lock for its whole duration;
/// snapshots and role queries take the read lock.
pub struct BroadcastController {
    state: RwLock<ControllerState>,
    config: ControllerConfig,
}

impl BroadcastController {
    /// Create a new controller with default configuration
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    /// Create a new controller with custom configuration
    pub fn with_config(config: ControllerConfig) -> Self {
        Self {
            state: RwLock::new(ControllerState::new()),
            config,
        }
    }

    /// Get the controller configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Register a client and open its notification channel
    pub async fn add_client(&self, id: ClientId) -> ClientHandle {
        let (tx, rx) = mpsc::channel::<Event>(self.config.channel_capacity);
        self.state.write().await.add_sink(id.clone(), Box::new(tx));
        ClientHandle::new(id, rx)
    }

    /// Register a client whose events go to a caller-supplied sink
    ///
    /// The sink is dropped when the client is removed.
    pub async fn add_client_with_sink(&self, id: ClientId, sink: impl EventSink) {
        self.state.write().await.add_sink(id, Box::new(sink));
    }

    /// Run several steps as one critical section
    ///
    /// The closure holds the write lock, so no other operation can interleave
    /// with it. It must not block.
    pub async fn transaction<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ControllerState) -> R,
    {
        f(&mut *self.state.write().await)
    }

    /// Leave, stop broadcasting, close the channel and forget the client
    ///
    /// Safe to call repeatedly and for ids that were never added.
    pub async fn remove_client(&self, id: &ClientId) {
        self.state.write().await.remove_client(id);
    }

    /// Start broadcasting a station
    ///
    /// Implicitly leaves any station the client listens to and tears down any
    /// other station it owns.
    pub async fn start_broadcasting(
        &self,
        id: &ClientId,
        request: StationRequest,
    ) -> Result<(), ClientError> {
        self.state.write().await.start_broadcasting(id, request)
    }

    /// Stop the client's broadcast, notifying its listeners
    pub async fn stop_broadcasting(&self, id: &ClientId) {
        self.state.write().await.stop_broadcasting(id);
    }

    /// Join a station as a listener
    ///
    /// Returns the station's current player state.
    pub async fn join_broadcast(
        &self,
        id: &ClientId,
        name: &str,
    ) -> Result<PlayerState, ClientError> {
        self.state.write().await.join_broadcast(id, name)
    }

    /// Publish a new player state to the client's station
    pub async fn update_player_state(
        &self,
        id: &ClientId,
        state: Option<PlayerState>,
    ) -> Result<(), ClientError> {
        self.state.write().await.update_player_state(id, state)
    }

    /// Stop listening to the current station, if any
    pub async fn leave_broadcast(&self, id: &ClientId) {
        self.state.write().await.leave_broadcast(id);
    }

    /// Copy of all station records
    pub async fn get_stations(&self) -> Vec<Station> {
        self.state.read().await.stations()
    }

    /// Deliver an event to one client, dropping it if the client is unknown
    pub async fn notify_client(&self, id: &ClientId, event: Event) {
        self.state.read().await.notify_client(id, event);
    }

    /// Deliver an event to every listener of a station, in join order
    pub async fn notify_station(&self, name: &str, event: Event) {
        self.state.read().await.notify_station(name, &event);
    }

    /// What the client is currently doing
    pub async fn role(&self, id: &ClientId) -> ClientRole {
        self.state.read().await.role(id)
    }

    /// Number of listeners on a station
    pub async fn listener_count(&self, name: &str) -> Option<usize> {
        self.state.read().await.registry.listener_count(name)
    }

    /// Number of registered clients
    pub async fn client_count(&self) -> usize {
        self.state.read().await.clients.len()
    }

    /// Check if a client is registered
    pub async fn is_registered(&self, id: &ClientId) -> bool {
        self.state.read().await.clients.contains_key(id)
    }
}

impl Default for BroadcastController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn id(s: &str) -> ClientId {
        ClientId::new(s)
    }

    fn state(timestamp: u64, track: &str) -> PlayerState {
        PlayerState::new(timestamp as f64, false, track, 0.0)
    }

    /// Controller with `owner` broadcasting a started station `name`
    async fn started_station(
        controller: &BroadcastController,
        owner: &str,
        name: &str,
    ) -> ClientHandle {
        let handle = controller.add_client(id(owner)).await;
        assert_ok!(
            controller
                .start_broadcasting(&id(owner), StationRequest::new(name))
                .await
        );
        assert_ok!(
            controller
                .update_player_state(&id(owner), Some(state(1, "t1")))
                .await
        );
        handle
    }

    #[tokio::test]
    async fn test_start_broadcasting() {
        let controller = BroadcastController::new();
        let _a = controller.add_client(id("a")).await;

        let request = StationRequest::new("jazz").with_coordinate(Coordinate::new(1.0, 2.0));
        assert_ok!(controller.start_broadcasting(&id("a"), request).await);

        let stations = controller.get_stations().await;
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].owner_id, id("a"));
        assert_eq!(stations[0].coordinate, Some(Coordinate::new(1.0, 2.0)));
        assert!(stations[0].player_state.is_none());
        assert_eq!(
            controller.role(&id("a")).await,
            ClientRole::Broadcasting("jazz".into())
        );
    }

    #[tokio::test]
    async fn test_start_broadcasting_blank_name() {
        let controller = BroadcastController::new();

        let result = controller
            .start_broadcasting(&id("a"), StationRequest::new(""))
            .await;
        assert_eq!(result, Err(ClientError::InvalidName));
        assert!(controller.get_stations().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_broadcasting_name_taken() {
        let controller = BroadcastController::new();
        controller
            .start_broadcasting(&id("a"), StationRequest::new("jazz"))
            .await
            .unwrap();

        let result = controller
            .start_broadcasting(&id("b"), StationRequest::new("jazz"))
            .await;
        assert_eq!(result, Err(ClientError::NameTaken));
        assert_eq!(controller.role(&id("b")).await, ClientRole::Idle);
    }

    #[tokio::test]
    async fn test_start_broadcasting_twice_is_idempotent() {
        let controller = BroadcastController::new();
        let mut owner = started_station(&controller, "a", "jazz").await;
        let _b = controller.add_client(id("b")).await;
        controller.join_broadcast(&id("b"), "jazz").await.unwrap();

        let before = controller.get_stations().await;
        assert_ok!(
            controller
                .start_broadcasting(&id("a"), StationRequest::new("jazz"))
                .await
        );

        assert_eq!(controller.get_stations().await, before);
        assert!(owner.drain().is_empty());
    }

    #[tokio::test]
    async fn test_start_broadcasting_replaces_own_station() {
        let controller = BroadcastController::new();
        let _owner = started_station(&controller, "a", "jazz").await;
        let mut listener = controller.add_client(id("b")).await;
        controller.join_broadcast(&id("b"), "jazz").await.unwrap();

        assert_ok!(
            controller
                .start_broadcasting(&id("a"), StationRequest::new("rock"))
                .await
        );

        let stations = controller.get_stations().await;
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].name, "rock");
        assert_eq!(listener.drain(), vec![Event::BroadcastEnded]);
        assert_eq!(controller.role(&id("b")).await, ClientRole::Idle);
    }

    #[tokio::test]
    async fn test_start_broadcasting_leaves_listened_station() {
        let controller = BroadcastController::new();
        let mut owner = started_station(&controller, "a", "jazz").await;
        let mut client = controller.add_client(id("b")).await;
        controller.join_broadcast(&id("b"), "jazz").await.unwrap();

        assert_ok!(
            controller
                .start_broadcasting(&id("b"), StationRequest::new("rock"))
                .await
        );

        let jazz = controller.get_stations().await;
        assert!(jazz.iter().find(|s| s.name == "jazz").unwrap().listeners.is_empty());
        assert_eq!(
            controller.role(&id("b")).await,
            ClientRole::Broadcasting("rock".into())
        );
        assert!(client.drain().is_empty());
        assert!(owner.drain().is_empty());
    }

    #[tokio::test]
    async fn test_join_before_first_update() {
        let controller = BroadcastController::new();
        controller
            .start_broadcasting(&id("a"), StationRequest::new("jazz"))
            .await
            .unwrap();

        let result = controller.join_broadcast(&id("b"), "jazz").await;
        assert_eq!(result, Err(ClientError::NotStarted));
        assert_eq!(controller.listener_count("jazz").await, Some(0));

        let published = state(7, "t7");
        controller
            .update_player_state(&id("a"), Some(published.clone()))
            .await
            .unwrap();

        assert_eq!(controller.join_broadcast(&id("b"), "jazz").await, Ok(published));
    }

    #[tokio::test]
    async fn test_join_errors() {
        let controller = BroadcastController::new();
        let _owner = started_station(&controller, "a", "jazz").await;

        assert_eq!(
            controller.join_broadcast(&id("b"), "rock").await,
            Err(ClientError::NotFound)
        );
        assert_eq!(
            controller.join_broadcast(&id("a"), "jazz").await,
            Err(ClientError::OwnStation)
        );
        assert_eq!(
            controller.role(&id("a")).await,
            ClientRole::Broadcasting("jazz".into())
        );
    }

    #[tokio::test]
    async fn test_join_again_returns_current_state() {
        let controller = BroadcastController::new();
        let _owner = started_station(&controller, "a", "jazz").await;
        let mut listener = controller.add_client(id("b")).await;

        controller.join_broadcast(&id("b"), "jazz").await.unwrap();
        controller
            .update_player_state(&id("a"), Some(state(2, "t2")))
            .await
            .unwrap();

        assert_eq!(
            controller.join_broadcast(&id("b"), "jazz").await,
            Ok(state(2, "t2"))
        );
        assert_eq!(controller.listener_count("jazz").await, Some(1));
        assert_eq!(listener.drain(), vec![Event::BroadcastChanged(state(2, "t2"))]);
    }

    #[tokio::test]
    async fn test_join_tears_down_own_station() {
        let controller = BroadcastController::new();
        let _a = started_station(&controller, "a", "jazz").await;
        let mut b = started_station(&controller, "b", "rock").await;
        let mut c = controller.add_client(id("c")).await;
        controller.join_broadcast(&id("c"), "rock").await.unwrap();

        let joined = controller.join_broadcast(&id("b"), "jazz").await;
        assert_eq!(joined, Ok(state(1, "t1")));

        let names: Vec<_> = controller
            .get_stations()
            .await
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["jazz".to_string()]);
        assert_eq!(c.drain(), vec![Event::BroadcastEnded]);
        assert!(b.drain().is_empty());
        assert_eq!(
            controller.role(&id("b")).await,
            ClientRole::Listening("jazz".into())
        );
    }

    #[tokio::test]
    async fn test_join_switches_stations() {
        let controller = BroadcastController::new();
        let _a = started_station(&controller, "a", "jazz").await;
        let _b = started_station(&controller, "b", "rock").await;
        let _c = controller.add_client(id("c")).await;

        controller.join_broadcast(&id("c"), "jazz").await.unwrap();
        controller.join_broadcast(&id("c"), "rock").await.unwrap();

        assert_eq!(controller.listener_count("jazz").await, Some(0));
        assert_eq!(controller.listener_count("rock").await, Some(1));
    }

    #[tokio::test]
    async fn test_stop_broadcasting_notifies_each_listener_once() {
        let controller = BroadcastController::new();
        let mut owner = started_station(&controller, "a", "jazz").await;

        let mut listeners = Vec::new();
        for name in ["b", "c", "d"] {
            listeners.push(controller.add_client(id(name)).await);
            controller.join_broadcast(&id(name), "jazz").await.unwrap();
        }

        controller.stop_broadcasting(&id("a")).await;

        for listener in &mut listeners {
            assert_eq!(listener.drain(), vec![Event::BroadcastEnded]);
            assert_eq!(controller.role(listener.id()).await, ClientRole::Idle);
        }
        assert!(owner.drain().is_empty());
        assert!(controller.get_stations().await.is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_station_is_noop() {
        let controller = BroadcastController::new();
        let _a = controller.add_client(id("a")).await;

        controller.stop_broadcasting(&id("a")).await;
        controller.stop_broadcasting(&id("unknown")).await;
        assert!(controller.get_stations().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_reaches_only_listeners() {
        let controller = BroadcastController::new();
        let mut owner = started_station(&controller, "a", "jazz").await;
        let mut other_owner = started_station(&controller, "x", "rock").await;
        let mut listener1 = controller.add_client(id("b")).await;
        let mut listener2 = controller.add_client(id("c")).await;
        let mut bystander = controller.add_client(id("d")).await;
        let mut elsewhere = controller.add_client(id("e")).await;

        controller.join_broadcast(&id("b"), "jazz").await.unwrap();
        controller.join_broadcast(&id("c"), "jazz").await.unwrap();
        controller.join_broadcast(&id("e"), "rock").await.unwrap();

        let update = state(2, "t2");
        assert_ok!(
            controller
                .update_player_state(&id("a"), Some(update.clone()))
                .await
        );

        let expected = vec![Event::BroadcastChanged(update.clone())];
        assert_eq!(listener1.drain(), expected);
        assert_eq!(listener2.drain(), expected);
        assert!(owner.drain().is_empty());
        assert!(other_owner.drain().is_empty());
        assert!(bystander.drain().is_empty());
        assert!(elsewhere.drain().is_empty());

        let stations = controller.get_stations().await;
        assert_eq!(stations[0].player_state, Some(update));
    }

    #[tokio::test]
    async fn test_update_errors() {
        let controller = BroadcastController::new();

        assert_eq!(
            controller
                .update_player_state(&id("a"), Some(state(1, "t1")))
                .await,
            Err(ClientError::NotBroadcasting)
        );

        controller
            .start_broadcasting(&id("a"), StationRequest::new("jazz"))
            .await
            .unwrap();
        let result = controller.update_player_state(&id("a"), None).await;
        assert_err!(result.clone());
        assert_eq!(result, Err(ClientError::InvalidPayload));
        assert!(controller.get_stations().await[0].player_state.is_none());
    }

    #[tokio::test]
    async fn test_leave_broadcast() {
        let controller = BroadcastController::new();
        let mut owner = started_station(&controller, "a", "jazz").await;
        let mut b = controller.add_client(id("b")).await;
        let mut c = controller.add_client(id("c")).await;
        controller.join_broadcast(&id("b"), "jazz").await.unwrap();
        controller.join_broadcast(&id("c"), "jazz").await.unwrap();

        controller.leave_broadcast(&id("b")).await;
        controller.leave_broadcast(&id("b")).await;

        let stations = controller.get_stations().await;
        assert_eq!(stations[0].listeners, vec![id("c")]);
        assert!(owner.drain().is_empty());
        assert!(b.drain().is_empty());
        assert!(c.drain().is_empty());
    }

    #[tokio::test]
    async fn test_remove_broadcasting_client() {
        let controller = BroadcastController::new();
        let mut owner = started_station(&controller, "a", "jazz").await;
        let mut listener = controller.add_client(id("b")).await;
        controller.join_broadcast(&id("b"), "jazz").await.unwrap();

        controller.remove_client(&id("a")).await;

        assert_eq!(listener.drain(), vec![Event::BroadcastEnded]);
        assert!(controller.get_stations().await.is_empty());
        assert!(!controller.is_registered(&id("a")).await);
        // Channel is closed once removed
        assert_eq!(owner.recv().await, None);
    }

    #[tokio::test]
    async fn test_remove_listening_client() {
        let controller = BroadcastController::new();
        let mut owner = started_station(&controller, "a", "jazz").await;
        let mut b = controller.add_client(id("b")).await;
        let mut c = controller.add_client(id("c")).await;
        controller.join_broadcast(&id("b"), "jazz").await.unwrap();
        controller.join_broadcast(&id("c"), "jazz").await.unwrap();

        controller.remove_client(&id("b")).await;

        assert_eq!(controller.get_stations().await[0].listeners, vec![id("c")]);
        assert!(owner.drain().is_empty());
        assert!(c.drain().is_empty());
        assert_eq!(b.recv().await, None);
    }

    #[tokio::test]
    async fn test_remove_client_is_idempotent() {
        let controller = BroadcastController::new();
        let _a = started_station(&controller, "a", "jazz").await;

        controller.remove_client(&id("a")).await;
        controller.remove_client(&id("a")).await;
        controller.remove_client(&id("never-added")).await;

        assert_eq!(controller.client_count().await, 0);
        assert!(controller.get_stations().await.is_empty());
    }

    #[tokio::test]
    async fn test_notify_unknown_client_is_dropped() {
        let controller = BroadcastController::new();
        controller
            .notify_client(&id("ghost"), Event::BroadcastEnded)
            .await;
        controller
            .notify_station("nowhere", Event::ListenerCountChanged(1))
            .await;
    }

    #[tokio::test]
    async fn test_announce_listener_count_skips_the_changing_client() {
        let controller = BroadcastController::new();
        let mut owner = started_station(&controller, "a", "jazz").await;
        let mut b = controller.add_client(id("b")).await;
        let mut c = controller.add_client(id("c")).await;
        controller.join_broadcast(&id("b"), "jazz").await.unwrap();

        controller
            .transaction(|state| {
                state.join_broadcast(&id("c"), "jazz").unwrap();
                state.announce_listener_count("jazz", &id("c"));
            })
            .await;

        assert_eq!(owner.drain(), vec![Event::ListenerCountChanged(2)]);
        assert_eq!(b.drain(), vec![Event::ListenerCountChanged(2)]);
        assert!(c.drain().is_empty());

        controller
            .transaction(|state| state.announce_listener_count("rock", &id("c")))
            .await;
        assert!(owner.drain().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_sees_role_change_atomically() {
        let controller = BroadcastController::new();
        let _owner = started_station(&controller, "a", "jazz").await;
        let _b = controller.add_client(id("b")).await;
        controller.join_broadcast(&id("b"), "jazz").await.unwrap();

        let (before, after) = controller
            .transaction(|state| {
                let before = state.role(&id("b"));
                state.remove_client(&id("b"));
                (before, state.role(&id("b")))
            })
            .await;

        assert_eq!(before, ClientRole::Listening("jazz".into()));
        assert_eq!(after, ClientRole::Idle);
        assert_eq!(controller.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_add_client_with_sink() {
        let controller = BroadcastController::new();
        let _owner = started_station(&controller, "a", "jazz").await;
        let (tx, mut rx) = mpsc::channel::<Event>(4);
        controller.add_client_with_sink(id("b"), tx).await;
        controller.join_broadcast(&id("b"), "jazz").await.unwrap();

        controller.stop_broadcasting(&id("a")).await;
        assert_eq!(rx.recv().await, Some(Event::BroadcastEnded));

        controller.remove_client(&id("b")).await;
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_full_channel_drops_events() {
        let controller =
            BroadcastController::with_config(ControllerConfig::default().channel_capacity(2));
        let _owner = started_station(&controller, "a", "jazz").await;
        let mut listener = controller.add_client(id("b")).await;
        controller.join_broadcast(&id("b"), "jazz").await.unwrap();

        for ts in 2..6 {
            controller
                .update_player_state(&id("a"), Some(state(ts, "t")))
                .await
                .unwrap();
        }

        let received = listener.drain();
        assert_eq!(
            received,
            vec![
                Event::BroadcastChanged(state(2, "t")),
                Event::BroadcastChanged(state(3, "t")),
            ]
        );
    }

    #[tokio::test]
    async fn test_radio_scenario() {
        let controller = BroadcastController::new();
        let _a = controller.add_client(id("A")).await;
        let _b = controller.add_client(id("B")).await;
        let mut c = controller.add_client(id("C")).await;

        assert_ok!(
            controller
                .start_broadcasting(&id("A"), StationRequest::new("jazz"))
                .await
        );
        assert_eq!(
            controller
                .start_broadcasting(&id("B"), StationRequest::new("jazz"))
                .await,
            Err(ClientError::NameTaken)
        );

        let first = PlayerState::new(1.0, false, "t1", 0.0);
        controller
            .update_player_state(&id("A"), Some(first.clone()))
            .await
            .unwrap();
        assert_eq!(controller.join_broadcast(&id("C"), "jazz").await, Ok(first));

        let second = PlayerState::new(2.0, false, "t1", 5.0);
        controller
            .update_player_state(&id("A"), Some(second.clone()))
            .await
            .unwrap();
        assert_eq!(c.recv().await, Some(Event::BroadcastChanged(second)));

        controller.remove_client(&id("A")).await;
        assert_eq!(c.recv().await, Some(Event::BroadcastEnded));
        assert!(controller.get_stations().await.is_empty());
    }

    fn assert_invariants(stations: &[Station]) {
        let mut names = HashSet::new();
        let mut owners = HashSet::new();
        let mut listeners = HashSet::new();

        for station in stations {
            assert!(!station.name.is_empty());
            assert!(names.insert(station.name.clone()), "duplicate station name");
            assert!(owners.insert(station.owner_id.clone()), "client owns two stations");
            assert!(!station.has_listener(&station.owner_id), "owner listens to itself");
            for listener in &station.listeners {
                assert!(listeners.insert(listener.clone()), "client listens twice");
            }
            if !station.listeners.is_empty() {
                assert!(station.is_ready(), "listeners on a station that never started");
            }
        }

        assert!(owners.is_disjoint(&listeners), "client both owns and listens");
    }

    #[tokio::test]
    async fn test_random_operation_sequences_keep_invariants() {
        let clients: Vec<ClientId> = (0..8).map(|n| id(&format!("c{}", n))).collect();
        let names = ["", "jazz", "rock", "blues", "news"];

        for seed in 0..16u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let controller = BroadcastController::new();
            let mut handles: HashMap<ClientId, ClientHandle> = HashMap::new();

            for step in 0..400u64 {
                let client = &clients[rng.random_range(0..clients.len())];
                let name = names[rng.random_range(0..names.len())];

                match rng.random_range(0..8) {
                    0 => {
                        let handle = controller.add_client(client.clone()).await;
                        handles.insert(client.clone(), handle);
                    }
                    1 => {
                        controller.remove_client(client).await;
                        handles.remove(client);
                    }
                    2 => {
                        let _ = controller
                            .start_broadcasting(client, StationRequest::new(name))
                            .await;
                    }
                    3 => controller.stop_broadcasting(client).await,
                    4 => {
                        let _ = controller.join_broadcast(client, name).await;
                    }
                    5 => controller.leave_broadcast(client).await,
                    _ => {
                        let update = rng
                            .random_bool(0.9)
                            .then(|| PlayerState::new(step as f64, rng.random_bool(0.5), name, 0.0));
                        let _ = controller.update_player_state(client, update).await;
                    }
                }

                assert_invariants(&controller.get_stations().await);

                for handle in handles.values_mut() {
                    handle.drain();
                }
            }
        }
    }
}
