//! Error types for the protocol layer.
//!
//! Each crate in turnsync defines its own error enum. A `ProtocolError`
//! always means the turn data itself is wrong: a property could not be
//! encoded or decoded, or the decoded values break a turn-state invariant.

use crate::CombatantId;

/// Errors that can occur while building, encoding or decoding turn state.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A property value could not be serialized.
    #[error("encode failed for property {key}: {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },

    /// A property value was present but had the wrong shape, e.g. an
    /// index that is negative or a combatant without a display name.
    #[error("decode failed for property {key}: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },

    /// A required property key is absent from the room properties.
    ///
    /// Usually transient: the property map was read while another key
    /// was being updated.
    #[error("missing property {0}")]
    MissingField(String),

    /// The turn order has no combatants. Rotation is undefined for an
    /// empty order.
    #[error("turn order must contain at least one combatant")]
    EmptyOrder,

    /// Two entries of the turn order share the same id.
    #[error("combatant {0} appears more than once in the turn order")]
    DuplicateCombatant(CombatantId),

    /// The turn index does not point into the turn order.
    #[error("turn index {index} out of bounds for an order of {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}
