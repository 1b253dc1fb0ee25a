//! # turnsync
//!
//! Whose turn is it? turnsync answers that consistently for every client of
//! a networked turn-based session.
//!
//! One participant holds authority and drives the rotation; its turn state
//! is written into the room's replicated properties, and every other
//! participant reconciles against what the room reports. A per-turn
//! deadline auto-advances idle turns.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use turnsync::prelude::*;
//!
//! # async fn run() -> Result<(), TurnsyncError> {
//! let room = MemoryRoom::new();
//! let me = room.join("1");
//!
//! let handle = spawn_turn_actor(
//!     Arc::new(me.clone()),
//!     me,
//!     |event: &TurnChanged| println!("{} is up", event.active_player),
//!     TurnConfig::default(),
//! );
//! handle.follow(room.subscribe());
//!
//! handle
//!     .initialize(vec![Combatant::new("1", "Aria"), Combatant::new("2", "Borin")])
//!     .await?;
//! handle.advance_turn().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod telemetry;

pub use error::TurnsyncError;
pub use telemetry::init_tracing;

pub use turnsync_deadline as deadline;
pub use turnsync_protocol as protocol;
pub use turnsync_room as room;

pub mod prelude {
    pub use crate::TurnsyncError;
    pub use turnsync_protocol::{
        Combatant, CombatantId, PropertyKeys, RoomProperties, TurnChanged, TurnOrder,
        TurnState,
    };
    pub use turnsync_room::{
        channel_observer, spawn_turn_actor, ChannelError, LocalIdentity, MemoryParticipant,
        MemoryRoom, RoomChannel, TurnConfig, TurnController, TurnError, TurnHandle,
        TurnObserver, TurnSnapshot,
    };
}
