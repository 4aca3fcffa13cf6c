//! Per-connection session
//!
//! Registers the client with the controller, reads newline-delimited
//! requests, dispatches them and writes acks and events back. The client is
//! always removed from the controller when the connection ends, whatever the
//! reason.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Permit;

use crate::controller::{
    BroadcastController, ClientError, ClientRole, ControllerState, Event, EventSink,
};
use crate::error::{Error, Result};
use crate::registry::ClientId;
use crate::server::config::ServerConfig;
use crate::server::message::{Command, Request, ServerMessage};
use crate::stats::ServerStats;

/// Events share the connection's outbound queue with acks, so the socket
/// sees them in the order they were produced
impl EventSink for mpsc::Sender<ServerMessage> {
    fn try_deliver(&self, event: Event) -> std::result::Result<(), TrySendError<()>> {
        self.try_send(ServerMessage::event(event)).map_err(|e| match e {
            TrySendError::Full(_) => TrySendError::Full(()),
            TrySendError::Closed(_) => TrySendError::Closed(()),
        })
    }
}

/// A single client connection
pub struct Connection {
    session_id: u64,
    client_id: ClientId,
    peer_addr: SocketAddr,
    config: ServerConfig,
    controller: Arc<BroadcastController>,
    stats: Arc<ServerStats>,
}

impl Connection {
    pub fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        config: ServerConfig,
        controller: Arc<BroadcastController>,
        stats: Arc<ServerStats>,
    ) -> Self {
        Self {
            session_id,
            client_id: ClientId::from_session(session_id),
            peer_addr,
            config,
            controller,
            stats,
        }
    }

    /// Serve the connection until the peer disconnects or a transport error
    /// occurs
    pub async fn run(self, socket: TcpStream) -> Result<()> {
        let (mut reader, writer) = socket.into_split();

        let (outbound, outbound_rx) =
            mpsc::channel::<ServerMessage>(self.config.controller.channel_capacity);
        self.controller
            .add_client_with_sink(self.client_id.clone(), outbound.clone())
            .await;
        let writer_task = tokio::spawn(write_loop(writer, outbound_rx));

        tracing::info!(
            session_id = self.session_id,
            client = %self.client_id,
            peer = %self.peer_addr,
            "Client connected"
        );

        let result = self.read_loop(&mut reader, &outbound).await;

        // Removing the client drops the controller's copy of the sender, so
        // the writer ends once this one is gone too
        self.disconnect().await;
        drop(outbound);

        match writer_task.await {
            Ok(Err(e)) => {
                tracing::debug!(client = %self.client_id, error = %e, "Write failed");
            }
            Err(e) => {
                tracing::warn!(client = %self.client_id, error = %e, "Writer task panicked");
            }
            Ok(Ok(())) => {}
        }

        tracing::info!(client = %self.client_id, "Client disconnected");
        result
    }

    async fn read_loop(
        &self,
        reader: &mut OwnedReadHalf,
        outbound: &mpsc::Sender<ServerMessage>,
    ) -> Result<()> {
        let mut buffer = BytesMut::with_capacity(self.config.read_buffer_size);

        loop {
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line = buffer.split_to(pos + 1);
                let line = trim_line(&line);
                if line.is_empty() {
                    continue;
                }

                // The ack slot is taken before the command runs so the ack
                // never has to be dropped
                let Ok(slot) = outbound.reserve().await else {
                    // Writer is gone, nothing more can be delivered
                    return Ok(());
                };
                self.handle_line(line, slot).await;
            }

            if buffer.len() > self.config.max_message_size {
                return Err(Error::MessageTooLarge {
                    limit: self.config.max_message_size,
                });
            }

            if reader.read_buf(&mut buffer).await? == 0 {
                return Ok(());
            }
        }
    }

    async fn handle_line(&self, line: &[u8], slot: Permit<'_, ServerMessage>) {
        match serde_json::from_slice::<Request>(line) {
            Ok(request) => self.dispatch(request, slot).await,
            Err(e) => {
                self.stats.command(true);
                tracing::debug!(client = %self.client_id, error = %e, "Malformed message");
                slot.send(ServerMessage::rejected(None, format!("Malformed message: {}", e)));
            }
        }
    }

    /// Run a command and queue its ack in one critical section
    ///
    /// Anything fanned out to this client by later operations lands behind
    /// the ack.
    async fn dispatch(&self, request: Request, slot: Permit<'_, ServerMessage>) {
        let id = request.id;
        let command = request.command.name();
        let client = &self.client_id;
        let announce = self.config.listener_count_notifications;

        let outcome = self
            .controller
            .transaction(|state| {
                let before = state.role(client);
                let (reply, outcome) = match execute(state, client, id, request.command) {
                    Ok(reply) => {
                        if announce {
                            announce_listener_counts(state, client, before);
                        }
                        (reply, Ok(()))
                    }
                    Err(e) => (ServerMessage::rejected(id, &e), Err(e)),
                };
                slot.send(reply);
                outcome
            })
            .await;

        match outcome {
            Ok(()) => {
                self.stats.command(false);
                tracing::debug!(client = %client, command = command, "Command handled");
            }
            Err(e) => {
                self.stats.command(true);
                tracing::debug!(client = %client, command = command, error = %e, "Command rejected");
            }
        }
    }

    async fn disconnect(&self) {
        let client = &self.client_id;
        let announce = self.config.listener_count_notifications;

        self.controller
            .transaction(|state| {
                let before = state.role(client);
                state.remove_client(client);
                if announce {
                    announce_listener_counts(state, client, before);
                }
            })
            .await;
    }
}

fn execute(
    state: &mut ControllerState,
    client: &ClientId,
    id: Option<u64>,
    command: Command,
) -> std::result::Result<ServerMessage, ClientError> {
    match command {
        Command::StartBroadcast(station) => state
            .start_broadcasting(client, station)
            .map(|()| ServerMessage::ack(id)),
        Command::EndBroadcast => {
            state.stop_broadcasting(client);
            Ok(ServerMessage::ack(id))
        }
        Command::JoinBroadcast { name } => state
            .join_broadcast(client, &name)
            .map(|player_state| ServerMessage::joined(id, player_state)),
        Command::LeaveBroadcast => {
            state.leave_broadcast(client);
            Ok(ServerMessage::ack(id))
        }
        Command::PlayerStateChanged { state: player_state } => state
            .update_player_state(client, player_state)
            .map(|()| ServerMessage::ack(id)),
        Command::ListStations => Ok(ServerMessage::stations(id, state.stations())),
    }
}

/// Tell every station this client entered or left how many listeners it
/// now has
fn announce_listener_counts(state: &ControllerState, client: &ClientId, before: ClientRole) {
    let after = state.role(client);
    if before == after {
        return;
    }

    for role in [before, after] {
        if let ClientRole::Listening(name) = role {
            state.announce_listener_count(&name, client);
        }
    }
}

/// Write queued acks and events onto the socket until every sender is gone
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<ServerMessage>,
) -> Result<()> {
    while let Some(message) = outbound.recv().await {
        writer.write_all(&message.encode()?).await?;
    }

    let _ = writer.shutdown().await;
    Ok(())
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut line = line;
    while let Some((last, rest)) = line.split_last() {
        if last.is_ascii_whitespace() {
            line = rest;
        } else {
            break;
        }
    }
    line
}
