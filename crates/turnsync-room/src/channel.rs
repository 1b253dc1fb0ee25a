//! Hooks into the host networking layer.
//!
//! turnsync doesn't implement rooms, presence or authentication. The host
//! application provides two small traits instead:
//!
//! - [`RoomChannel`] — who holds authority, and how to publish properties
//! - [`LocalIdentity`] — which combatant the local participant is
//!
//! Production code wires these to its networking client; tests use
//! [`MemoryRoom`](crate::MemoryRoom) or hand-written fakes.

use std::future::Future;
use std::sync::Arc;

use turnsync_protocol::{CombatantId, RoomProperties};

use crate::ChannelError;

/// The shared property channel of the room this session lives in.
///
/// # Example
///
/// ```rust
/// use turnsync_protocol::RoomProperties;
/// use turnsync_room::{ChannelError, RoomChannel};
///
/// /// A single-player room that accepts every write.
/// struct SoloRoom;
///
/// impl RoomChannel for SoloRoom {
///     fn is_authority(&self) -> bool {
///         true
///     }
///
///     async fn set_properties(&self, _props: RoomProperties) -> Result<(), ChannelError> {
///         Ok(())
///     }
/// }
/// ```
pub trait RoomChannel: Send + Sync + 'static {
    /// Whether the local participant is currently the authority.
    ///
    /// Read on every mutating call; authority may move at any time.
    fn is_authority(&self) -> bool;

    /// Merges `props` into the room's replicated properties.
    ///
    /// Resolves once the room acknowledges or rejects the write. The
    /// controller never waits on this; a background publisher does.
    fn set_properties(
        &self,
        props: RoomProperties,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Provides the local participant's combatant id.
pub trait LocalIdentity: Send + 'static {
    /// `None` while the participant has no identity yet (not joined).
    fn local_id(&self) -> Option<CombatantId>;
}

impl LocalIdentity for CombatantId {
    fn local_id(&self) -> Option<CombatantId> {
        Some(self.clone())
    }
}

impl LocalIdentity for Option<CombatantId> {
    fn local_id(&self) -> Option<CombatantId> {
        self.clone()
    }
}

impl<T: LocalIdentity + Sync> LocalIdentity for Arc<T> {
    fn local_id(&self) -> Option<CombatantId> {
        (**self).local_id()
    }
}
