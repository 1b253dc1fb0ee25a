//! Error types for the turn layer.

use turnsync_protocol::ProtocolError;

/// Errors returned by turn controller operations.
///
/// None of these are fatal: every failure leaves the turn state exactly as
/// it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// The local participant does not hold turn authority.
    #[error("local participant is not the turn authority")]
    NotAuthority,

    /// `initialize` was given an order that cannot rotate (empty, or
    /// with duplicate combatant ids).
    #[error("invalid turn order: {0}")]
    InvalidOrder(#[source] ProtocolError),

    /// Room properties did not contain a usable turn state. Missing keys
    /// are the common, transient case.
    #[error("malformed remote turn state: {0}")]
    MalformedRemoteState(#[source] ProtocolError),

    /// The turn actor has stopped or its command channel is closed.
    #[error("turn controller is unavailable")]
    Unavailable,
}

impl TurnError {
    /// `true` for remote state that is only missing keys, which happens
    /// whenever unrelated room properties change.
    pub fn is_partial_update(&self) -> bool {
        matches!(
            self,
            Self::MalformedRemoteState(ProtocolError::MissingField(_))
        )
    }
}

/// Errors reported by a [`RoomChannel`](crate::RoomChannel) when
/// publishing properties.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The room refused the update.
    #[error("room rejected property update: {0}")]
    Rejected(String),

    /// The connection to the room is gone.
    #[error("room channel closed")]
    Closed,
}
