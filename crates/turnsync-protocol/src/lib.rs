//! Turn-state types and room-property codecs for turnsync.
//!
//! This crate defines the data that every participant of a session agrees
//! on:
//!
//! - **Types** ([`Combatant`], [`TurnOrder`], [`TurnState`],
//!   [`TurnChanged`]) — who is in the rotation and whose turn it is.
//! - **Codec** ([`PropertyCodec`] trait, [`JsonPropertyCodec`]) — how a
//!   [`TurnState`] is written into and read back out of the room's
//!   replicated key-value properties.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while building or
//!   decoding turn state.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about authority, timers or observers.
//! It only guarantees that a [`TurnState`] is always valid: a non-empty
//! order of unique combatants and an index inside it.
//!
//! ```text
//! Room properties (JSON values) → Protocol (TurnState) → Controller (rotation)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{JsonPropertyCodec, PropertyCodec};
pub use error::ProtocolError;
pub use types::{
    Combatant, CombatantId, PropertyKeys, RoomProperties, TurnChanged,
    TurnOrder, TurnState,
};
