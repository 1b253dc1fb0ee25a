//! Turn rotation synchronized through a room's replicated properties.
//!
//! One [`TurnController`] per participant tracks the turn order and the
//! active combatant. The authority mutates and publishes; everyone else
//! mirrors what the room reports. A per-turn deadline auto-advances idle
//! turns.
//!
//! # Key types
//!
//! - [`TurnController`] — the synchronous turn state machine
//! - [`TurnHandle`] — send commands to a running turn actor
//! - [`RoomChannel`] / [`LocalIdentity`] — what the host networking layer provides
//! - [`TurnObserver`] — receives [`TurnChanged`](turnsync_protocol::TurnChanged) notifications
//! - [`MemoryRoom`] — in-process room for tests and local play
//! - [`TurnConfig`] — timeout and property keys

#![allow(async_fn_in_trait)]

mod actor;
mod channel;
mod config;
mod controller;
mod error;
mod memory;
mod observer;
mod publisher;

pub use actor::{spawn_controller, spawn_turn_actor, TurnHandle, TurnSnapshot};
pub use channel::{LocalIdentity, RoomChannel};
pub use config::TurnConfig;
pub use controller::TurnController;
pub use error::{ChannelError, TurnError};
pub use memory::{MemoryParticipant, MemoryRoom};
pub use observer::{channel_observer, TurnObserver};
pub use publisher::Publisher;
