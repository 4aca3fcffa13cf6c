//! Station registry implementation
//!
//! The canonical table of stations, indexed by name, owner and listener.

use std::collections::HashMap;

use super::state::{ClientId, PlayerState};
use super::station::{Coordinate, Station};

/// In-memory table of all stations
///
/// Not synchronized: the controller owns it behind its own lock. Every
/// mutator keeps the owner and listener indices consistent with `stations`.
#[derive(Debug, Default)]
pub struct StationRegistry {
    /// Map of station name to station record
    stations: HashMap<String, Station>,

    /// Owner id to the name of the station it broadcasts
    owners: HashMap<ClientId, String>,

    /// Listener id to the name of the station it listens to
    listeners: HashMap<ClientId, String>,
}

impl StationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a station owned by `owner`
    ///
    /// Returns `false` without changing anything if the name is taken or the
    /// owner already owns or listens to a station.
    pub fn create(
        &mut self,
        name: &str,
        owner: &ClientId,
        coordinate: Option<Coordinate>,
    ) -> bool {
        if self.stations.contains_key(name)
            || self.owners.contains_key(owner)
            || self.listeners.contains_key(owner)
        {
            return false;
        }

        self.stations.insert(
            name.to_string(),
            Station::new(name.to_string(), owner.clone(), coordinate),
        );
        self.owners.insert(owner.clone(), name.to_string());
        true
    }

    /// Delete a station by name, unlinking its owner and listeners
    pub fn delete(&mut self, name: &str) -> Option<Station> {
        let station = self.stations.remove(name)?;

        self.owners.remove(&station.owner_id);
        for listener in &station.listeners {
            self.listeners.remove(listener);
        }

        Some(station)
    }

    /// Find a station by name
    pub fn find_by_name(&self, name: &str) -> Option<&Station> {
        self.stations.get(name)
    }

    /// Find the station a client broadcasts
    pub fn find_by_owner(&self, id: &ClientId) -> Option<&Station> {
        self.owners.get(id).and_then(|name| self.stations.get(name))
    }

    /// Find the station a client listens to
    pub fn find_by_listener(&self, id: &ClientId) -> Option<&Station> {
        self.listeners.get(id).and_then(|name| self.stations.get(name))
    }

    /// Add a listener to a station
    ///
    /// A client listens to at most one station, so any previous membership is
    /// dropped first. Returns `false` if the station does not exist, the
    /// client owns any station, or the client is already listening to it.
    pub fn add_listener(&mut self, name: &str, id: &ClientId) -> bool {
        if self.owners.contains_key(id) {
            return false;
        }

        match self.stations.get(name) {
            Some(station) if station.owner_id != *id && !station.has_listener(id) => {}
            _ => return false,
        }

        if let Some(previous) = self.listeners.get(id).cloned() {
            self.remove_listener(&previous, id);
        }

        if let Some(station) = self.stations.get_mut(name) {
            station.listeners.push(id.clone());
            self.listeners.insert(id.clone(), name.to_string());
            return true;
        }
        false
    }

    /// Remove a listener from a station
    pub fn remove_listener(&mut self, name: &str, id: &ClientId) -> bool {
        let Some(station) = self.stations.get_mut(name) else {
            return false;
        };

        let before = station.listeners.len();
        station.listeners.retain(|listener| listener != id);
        if station.listeners.len() == before {
            return false;
        }

        self.listeners.remove(id);
        true
    }

    /// Replace a station's player state
    pub fn set_player_state(&mut self, name: &str, state: PlayerState) -> bool {
        match self.stations.get_mut(name) {
            Some(station) => {
                station.player_state = Some(state);
                true
            }
            None => false,
        }
    }

    /// Number of listeners on a station
    pub fn listener_count(&self, name: &str) -> Option<usize> {
        self.stations.get(name).map(Station::listener_count)
    }

    /// Copy of every station, sorted by name
    pub fn snapshot(&self) -> Vec<Station> {
        let mut stations: Vec<Station> = self.stations.values().cloned().collect();
        stations.sort_by(|a, b| a.name.cmp(&b.name));
        stations
    }

    /// Number of stations
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// Check if there are no stations
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
