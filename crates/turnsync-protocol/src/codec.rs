//! Codec trait and implementations for turn state in room properties.
//!
//! A [`PropertyCodec`] turns a [`TurnState`] into the key-value pairs that
//! get replicated to every participant, and back. The controller only
//! depends on the trait, so a game that stores turn state under a different
//! layout can swap the codec without touching rotation logic.

use serde_json::Value;

use crate::{Combatant, PropertyKeys, ProtocolError, RoomProperties, TurnOrder, TurnState};

/// Encodes turn state into room properties and decodes it back.
///
/// `Send + Sync + 'static` so a codec can live inside a long-running
/// Tokio task.
pub trait PropertyCodec: Send + Sync + 'static {
    /// Produces the properties to publish for `state`.
    ///
    /// Only turn-state keys are returned; the channel merges them into the
    /// room's existing properties.
    fn encode(&self, state: &TurnState) -> Result<RoomProperties, ProtocolError>;

    /// Reads turn state out of a full or partial property map.
    ///
    /// # Errors
    /// - [`ProtocolError::MissingField`] if a turn-state key is absent.
    /// - [`ProtocolError::Decode`] if a value has the wrong shape.
    /// - [`ProtocolError::EmptyOrder`], [`ProtocolError::DuplicateCombatant`]
    ///   or [`ProtocolError::IndexOutOfBounds`] if the values decode but
    ///   do not form a valid [`TurnState`].
    fn decode(&self, props: &RoomProperties) -> Result<TurnState, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonPropertyCodec
// ---------------------------------------------------------------------------

/// A [`PropertyCodec`] storing the order as a JSON array of
/// `{ "id", "displayName" }` objects and the index as a JSON integer.
///
/// ## Example
///
/// ```rust
/// use turnsync_protocol::{
///     Combatant, JsonPropertyCodec, PropertyCodec, TurnOrder, TurnState,
/// };
///
/// let codec = JsonPropertyCodec::default();
/// let order = TurnOrder::new(vec![Combatant::new("1", "A")]).unwrap();
/// let state = TurnState::new(order);
///
/// let props = codec.encode(&state).unwrap();
/// assert_eq!(props["bTurnIdx"], 0);
///
/// let decoded = codec.decode(&props).unwrap();
/// assert_eq!(decoded, state);
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonPropertyCodec {
    keys: PropertyKeys,
}

impl JsonPropertyCodec {
    pub fn new(keys: PropertyKeys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &PropertyKeys {
        &self.keys
    }

    fn field<'a>(&self, props: &'a RoomProperties, key: &str) -> Result<&'a Value, ProtocolError> {
        props
            .get(key)
            .ok_or_else(|| ProtocolError::MissingField(key.to_owned()))
    }
}

impl PropertyCodec for JsonPropertyCodec {
    fn encode(&self, state: &TurnState) -> Result<RoomProperties, ProtocolError> {
        let order = serde_json::to_value(state.order().as_slice()).map_err(|source| {
            ProtocolError::Encode {
                key: self.keys.order.clone(),
                source,
            }
        })?;

        let mut props = RoomProperties::new();
        props.insert(self.keys.order.clone(), order);
        props.insert(self.keys.index.clone(), Value::from(state.index()));
        Ok(props)
    }

    fn decode(&self, props: &RoomProperties) -> Result<TurnState, ProtocolError> {
        let order_value = self.field(props, &self.keys.order)?;
        let index_value = self.field(props, &self.keys.index)?;

        // Decode into the raw list first so that an empty or duplicated
        // order surfaces as its own error instead of a serde message.
        let combatants: Vec<Combatant> = serde_json::from_value(order_value.clone())
            .map_err(|source| ProtocolError::Decode {
                key: self.keys.order.clone(),
                source,
            })?;
        let index: usize = serde_json::from_value(index_value.clone()).map_err(|source| {
            ProtocolError::Decode {
                key: self.keys.index.clone(),
                source,
            }
        })?;

        TurnState::with_index(TurnOrder::new(combatants)?, index)
    }
}
