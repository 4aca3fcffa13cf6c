//! Client error types
//!
//! Expected, user-facing failures of controller operations. An operation that
//! returns one of these has not changed any state.

/// Error returned to the client that issued the offending command
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Station name is empty
    #[error("The station name cannot be blank")]
    InvalidName,
    /// Another client already broadcasts under this name
    #[error("Someone else is broadcasting to that channel")]
    NameTaken,
    /// No station with this name
    #[error("Broadcast doesn't exist")]
    NotFound,
    /// Caller tried to join the station it owns
    #[error("You can't join your own station")]
    OwnStation,
    /// Station has no player state yet
    #[error("Broadcast hasn't started yet")]
    NotStarted,
    /// Caller owns no station
    #[error("No ongoing broadcast")]
    NotBroadcasting,
    /// Player state update without a state
    #[error("Invalid payload")]
    InvalidPayload,
}
