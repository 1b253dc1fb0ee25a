//! An in-process room with replicated properties.
//!
//! `MemoryRoom` stands in for a networked room when every participant runs
//! in the same process: hot-seat play, demos and tests. Writes are merged
//! into one shared property map and the merged map is broadcast to every
//! subscriber, the way a real room pushes property changes to all clients.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use turnsync_protocol::{CombatantId, RoomProperties};

use crate::{ChannelError, LocalIdentity, RoomChannel};

/// Default capacity of the property broadcast.
const DEFAULT_FEED_CAPACITY: usize = 64;

/// A shared room. Clones refer to the same room.
#[derive(Clone)]
pub struct MemoryRoom {
    shared: Arc<RoomShared>,
}

struct RoomShared {
    inner: RwLock<RoomInner>,
    feed: broadcast::Sender<RoomProperties>,
}

#[derive(Default)]
struct RoomInner {
    properties: RoomProperties,
    authority: Option<CombatantId>,
    /// When set, every write fails with this reason.
    reject_writes: Option<String>,
}

impl MemoryRoom {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(DEFAULT_FEED_CAPACITY);
        Self {
            shared: Arc::new(RoomShared {
                inner: RwLock::new(RoomInner::default()),
                feed,
            }),
        }
    }

    /// Adds a participant. The first participant to join becomes the
    /// authority.
    pub fn join(&self, id: impl Into<CombatantId>) -> MemoryParticipant {
        let id = id.into();
        {
            let mut inner = self.write_inner();
            if inner.authority.is_none() {
                inner.authority = Some(id.clone());
            }
        }
        tracing::debug!(participant = %id, "participant joined memory room");
        MemoryParticipant {
            room: self.clone(),
            id,
        }
    }

    /// Hands authority to `id` (or to nobody).
    pub fn set_authority(&self, id: Option<CombatantId>) {
        tracing::info!(authority = ?id, "memory room authority changed");
        self.write_inner().authority = id;
    }

    pub fn authority(&self) -> Option<CombatantId> {
        self.read_inner().authority.clone()
    }

    /// Snapshot of the current replicated properties.
    pub fn properties(&self) -> RoomProperties {
        self.read_inner().properties.clone()
    }

    /// Receives the full property map after every successful write.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomProperties> {
        self.shared.feed.subscribe()
    }

    /// Makes every write fail with `reason` until called with `None`.
    pub fn reject_writes(&self, reason: Option<String>) {
        self.write_inner().reject_writes = reason;
    }

    fn merge(&self, props: RoomProperties) -> Result<(), ChannelError> {
        let merged = {
            let mut inner = self.write_inner();
            if let Some(reason) = &inner.reject_writes {
                return Err(ChannelError::Rejected(reason.clone()));
            }
            inner.properties.extend(props);
            inner.properties.clone()
        };
        // No subscribers is fine; the properties are still stored.
        let _ = self.shared.feed.send(merged);
        Ok(())
    }

    fn read_inner(&self) -> std::sync::RwLockReadGuard<'_, RoomInner> {
        self.shared
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_inner(&self) -> std::sync::RwLockWriteGuard<'_, RoomInner> {
        self.shared
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryRoom {
    fn default() -> Self {
        Self::new()
    }
}

/// One participant's view of a [`MemoryRoom`]: its channel and identity.
#[derive(Clone)]
pub struct MemoryParticipant {
    room: MemoryRoom,
    id: CombatantId,
}

impl MemoryParticipant {
    pub fn id(&self) -> &CombatantId {
        &self.id
    }

    pub fn room(&self) -> &MemoryRoom {
        &self.room
    }
}

impl RoomChannel for MemoryParticipant {
    fn is_authority(&self) -> bool {
        self.room.read_inner().authority.as_ref() == Some(&self.id)
    }

    async fn set_properties(&self, props: RoomProperties) -> Result<(), ChannelError> {
        self.room.merge(props)
    }
}

impl LocalIdentity for MemoryParticipant {
    fn local_id(&self) -> Option<CombatantId> {
        Some(self.id.clone())
    }
}
