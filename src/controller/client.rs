//! Per-client notification handle

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::event::Event;
use crate::registry::ClientId;

/// Destination for the events addressed to one client
///
/// Delivery must not block: a sink that cannot take the event right away
/// reports `Full` and the event is dropped.
pub trait EventSink: Send + Sync + 'static {
    fn try_deliver(&self, event: Event) -> Result<(), TrySendError<()>>;
}

impl EventSink for mpsc::Sender<Event> {
    fn try_deliver(&self, event: Event) -> Result<(), TrySendError<()>> {
        self.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => TrySendError::Full(()),
            TrySendError::Closed(_) => TrySendError::Closed(()),
        })
    }
}

/// Receiving end of a client's notification channel
///
/// Returned by `BroadcastController::add_client` and drained by the
/// transport. `recv` yields `None` once the client has been removed and all
/// buffered events have been read.
#[derive(Debug)]
pub struct ClientHandle {
    id: ClientId,
    rx: mpsc::Receiver<Event>,
}

impl ClientHandle {
    pub(super) fn new(id: ClientId, rx: mpsc::Receiver<Event>) -> Self {
        Self { id, rx }
    }

    /// The client this handle belongs to
    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take the next event if one is buffered
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Take every buffered event
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}
