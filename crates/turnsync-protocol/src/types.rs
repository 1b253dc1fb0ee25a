//! Core turn-state types.
//!
//! Everything in this module is either written into the room properties
//! (so it must serialize to the exact JSON shape other clients expect) or
//! handed to observers.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// The replicated key-value state of a room, as seen by one participant.
///
/// Values are raw JSON so that keys owned by other systems pass through
/// untouched.
pub type RoomProperties = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable, session-unique identifier of a combatant.
///
/// Serialized as a plain JSON string, so `CombatantId::from(7)` is `"7"`
/// on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombatantId(pub String);

impl CombatantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CombatantId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for CombatantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Numeric actor numbers are used as ids in their decimal form.
impl From<u64> for CombatantId {
    fn from(actor: u64) -> Self {
        Self(actor.to_string())
    }
}

/// One entry of the turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combatant {
    pub id: CombatantId,
    pub display_name: String,
}

impl Combatant {
    pub fn new(id: impl Into<CombatantId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TurnOrder
// ---------------------------------------------------------------------------

/// The initiative order: a non-empty sequence of combatants with unique ids.
///
/// Construction goes through [`TurnOrder::new`] (or `TryFrom`), including
/// deserialization, so an empty or duplicated order can never exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Combatant>", into = "Vec<Combatant>")]
pub struct TurnOrder(Vec<Combatant>);

impl TurnOrder {
    pub fn new(combatants: Vec<Combatant>) -> Result<Self, ProtocolError> {
        if combatants.is_empty() {
            return Err(ProtocolError::EmptyOrder);
        }
        let mut seen = HashSet::with_capacity(combatants.len());
        for combatant in &combatants {
            if !seen.insert(&combatant.id) {
                return Err(ProtocolError::DuplicateCombatant(
                    combatant.id.clone(),
                ));
            }
        }
        Ok(Self(combatants))
    }

    /// Number of combatants. Never zero.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Combatant> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Combatant> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Combatant] {
        &self.0
    }
}

impl TryFrom<Vec<Combatant>> for TurnOrder {
    type Error = ProtocolError;

    fn try_from(combatants: Vec<Combatant>) -> Result<Self, Self::Error> {
        Self::new(combatants)
    }
}

impl From<TurnOrder> for Vec<Combatant> {
    fn from(order: TurnOrder) -> Self {
        order.0
    }
}

impl<'a> IntoIterator for &'a TurnOrder {
    type Item = &'a Combatant;
    type IntoIter = std::slice::Iter<'a, Combatant>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// TurnState
// ---------------------------------------------------------------------------

/// A turn order plus the index of the combatant whose turn it is.
///
/// Invariant: `index < order.len()`. Every constructor and mutator keeps
/// it, which is why [`TurnState::active`] can return a plain reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnState {
    order: TurnOrder,
    index: usize,
}

impl TurnState {
    /// Fresh state: the first combatant in the order is active.
    pub fn new(order: TurnOrder) -> Self {
        Self { order, index: 0 }
    }

    /// State with an explicit active index, as received from another
    /// participant.
    pub fn with_index(order: TurnOrder, index: usize) -> Result<Self, ProtocolError> {
        if index >= order.len() {
            return Err(ProtocolError::IndexOutOfBounds {
                index,
                len: order.len(),
            });
        }
        Ok(Self { order, index })
    }

    pub fn order(&self) -> &TurnOrder {
        &self.order
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The combatant whose turn it is.
    pub fn active(&self) -> &Combatant {
        &self.order.0[self.index]
    }

    /// Moves to the next combatant, wrapping around to the first.
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.order.len();
    }
}

// ---------------------------------------------------------------------------
// TurnChanged
// ---------------------------------------------------------------------------

/// Notification delivered to observers on every accepted state change.
///
/// Field names follow the camelCase shape UI code already consumes:
/// `{ "activePlayer", "activePlayerId", "currentTurnIndex", "isMyTurn" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnChanged {
    /// Display name of the active combatant.
    pub active_player: String,
    pub active_player_id: CombatantId,
    pub current_turn_index: usize,
    /// `true` iff the active combatant is the local participant.
    pub is_my_turn: bool,
}

impl TurnChanged {
    /// Builds the notification for `state` as seen by `local`.
    ///
    /// A participant without an identity never owns the turn.
    pub fn for_state(state: &TurnState, local: Option<&CombatantId>) -> Self {
        let active = state.active();
        Self {
            active_player: active.display_name.clone(),
            active_player_id: active.id.clone(),
            current_turn_index: state.index(),
            is_my_turn: local == Some(&active.id),
        }
    }
}

// ---------------------------------------------------------------------------
// PropertyKeys
// ---------------------------------------------------------------------------

/// Names of the room properties that carry turn state.
///
/// These are an external contract: the authority and every observer must
/// use the same keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyKeys {
    /// Key holding the JSON array of combatants.
    pub order: String,
    /// Key holding the integer index of the active combatant.
    pub index: String,
}

impl PropertyKeys {
    pub const DEFAULT_ORDER: &'static str = "bTurnOrder";
    pub const DEFAULT_INDEX: &'static str = "bTurnIdx";
}

impl Default for PropertyKeys {
    fn default() -> Self {
        Self {
            order: Self::DEFAULT_ORDER.to_owned(),
            index: Self::DEFAULT_INDEX.to_owned(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
