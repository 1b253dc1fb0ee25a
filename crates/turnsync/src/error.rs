//! Unified error type for turnsync.

use turnsync_protocol::ProtocolError;
use turnsync_room::{ChannelError, TurnError};

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors, so callers
/// using the `turnsync` meta-crate only handle this one type.
#[derive(Debug, thiserror::Error)]
pub enum TurnsyncError {
    /// Turn data could not be built, encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A turn operation was rejected or the turn actor is gone.
    #[error(transparent)]
    Turn(#[from] TurnError),

    /// The room refused a property write.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}
