//! Error types for the transport and process layers
//!
//! Controller operations report expected failures as
//! [`ClientError`](crate::controller::ClientError); this type covers
//! everything around the core: sockets, framing and serialization.

/// Transport error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or listener failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inbound line exceeded the configured maximum
    #[error("Message exceeds {limit} bytes")]
    MessageTooLarge { limit: usize },
}

/// Result alias for transport operations
pub type Result<T> = std::result::Result<T, Error>;
