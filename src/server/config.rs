//! Server configuration

use std::net::SocketAddr;

use crate::controller::ControllerConfig;

/// Default port for client connections
pub const DEFAULT_PORT: u16 = 3000;

/// Default port for the HTTP query endpoint
pub const DEFAULT_QUERY_PORT: u16 = 3001;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address clients connect to
    pub bind_addr: SocketAddr,

    /// Address of the HTTP query endpoint (None = disabled)
    pub query_addr: Option<SocketAddr>,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Longest accepted inbound line, in bytes
    pub max_message_size: usize,

    /// Initial read buffer size per connection
    pub read_buffer_size: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Send `listener` events to a station's owner and other listeners when
    /// a client joins or leaves it
    pub listener_count_notifications: bool,

    /// Controller settings
    pub controller: ControllerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            query_addr: Some(SocketAddr::from(([0, 0, 0, 0], DEFAULT_QUERY_PORT))),
            max_connections: 0, // Unlimited
            max_message_size: 64 * 1024,
            read_buffer_size: 4 * 1024,
            tcp_nodelay: true,
            listener_count_notifications: true,
            controller: ControllerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Build a config from `PORT` and `QUERY_PORT` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = parse_port(&lookup, "PORT") {
            config.bind_addr.set_port(port);
        }
        if let Some(port) = parse_port(&lookup, "QUERY_PORT") {
            if let Some(addr) = config.query_addr.as_mut() {
                addr.set_port(port);
            }
        }

        config
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the query endpoint address
    pub fn query(mut self, addr: SocketAddr) -> Self {
        self.query_addr = Some(addr);
        self
    }

    /// Disable the query endpoint
    pub fn disable_query(mut self) -> Self {
        self.query_addr = None;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the longest accepted inbound line
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Stop sending listener count events
    pub fn disable_listener_count(mut self) -> Self {
        self.listener_count_notifications = false;
        self
    }

    /// Set controller settings
    pub fn controller(mut self, controller: ControllerConfig) -> Self {
        self.controller = controller;
        self
    }
}

fn parse_port<F>(lookup: &F, key: &str) -> Option<u16>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)?;
    match value.trim().parse() {
        Ok(port) => Some(port),
        Err(_) => {
            tracing::warn!(key = key, value = %value, "Ignoring invalid port");
            None
        }
    }
}
