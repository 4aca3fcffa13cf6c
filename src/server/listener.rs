//! Radio server listener
//!
//! Handles TCP accept loop and spawns connection handlers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::controller::BroadcastController;
use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::query;
use crate::stats::ServerStats;

/// Radio server
pub struct RadioServer {
    config: ServerConfig,
    controller: Arc<BroadcastController>,
    stats: Arc<ServerStats>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl RadioServer {
    /// Create a new server with its own controller
    pub fn new(config: ServerConfig) -> Self {
        let controller = Arc::new(BroadcastController::with_config(config.controller.clone()));
        Self::with_controller(config, controller)
    }

    /// Create a new server around an existing controller
    pub fn with_controller(config: ServerConfig, controller: Arc<BroadcastController>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            controller,
            stats: Arc::new(ServerStats::new()),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the broadcast controller
    pub fn controller(&self) -> &Arc<BroadcastController> {
        &self.controller
    }

    /// Get a reference to the server statistics
    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Run the server
    ///
    /// This method blocks until the server fails to bind.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let query_listener = match self.config.query_addr {
            Some(addr) => Some(TcpListener::bind(addr).await?),
            None => None,
        };

        self.serve_until(listener, query_listener, shutdown).await
    }

    /// Serve on already bound listeners until `shutdown` completes
    pub async fn serve_until<F>(
        &self,
        listener: TcpListener,
        query_listener: Option<TcpListener>,
        shutdown: F,
    ) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tracing::info!(addr = %listener.local_addr()?, "Radio server listening");

        let query_handle = match query_listener {
            Some(query_listener) => {
                tracing::info!(addr = %query_listener.local_addr()?, "Query endpoint listening");
                let router = query::router(Arc::clone(&self.controller), Arc::clone(&self.stats));
                Some(tokio::spawn(async move {
                    if let Err(e) = query::serve(query_listener, router).await {
                        tracing::error!(error = %e, "Query endpoint failed");
                    }
                }))
            }
            None => None,
        };

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        if let Some(handle) = query_handle {
            handle.abort();
        }

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.stats.connection_rejected();
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let connection = Connection::new(
            session_id,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.controller),
            Arc::clone(&self.stats),
        );
        let stats = Arc::clone(&self.stats);

        stats.connection_opened();
        tokio::spawn(async move {
            // Held until the connection ends
            let _permit = permit;

            if let Err(e) = connection.run(socket).await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            stats.connection_closed();
            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
