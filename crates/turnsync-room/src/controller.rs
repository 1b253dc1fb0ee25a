//! The turn controller: rotation, reconciliation and the turn deadline.
//!
//! State machine (one per participant):
//!
//! ```text
//!                 initialize (authority)
//!   [no order] ─────────────────────────────→ (order, 0)
//!       │                                      │  ↺ advance_turn (authority):
//!       │ reconcile                            │      index = (index + 1) % len
//!       ▼                                      │  ↺ reconcile (remote differs):
//!   (remote order, remote index) ←─────────────┘      adopt remote verbatim
//! ```
//!
//! Every accepted transition publishes (authority paths only), notifies the
//! observer and re-arms the deadline. Rejected or no-op calls do none of
//! these.
//!
//! The authority hears its own writes back from the room, possibly after it
//! has already moved on. Published states are remembered until their echo
//! arrives, and an echo older than the newest write is dropped instead of
//! rewinding the turn.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};
use turnsync_deadline::{DeadlineInfo, TurnDeadline};
use turnsync_protocol::{
    Combatant, JsonPropertyCodec, PropertyCodec, RoomProperties, TurnChanged,
    TurnOrder, TurnState,
};

use crate::{LocalIdentity, Publisher, RoomChannel, TurnConfig, TurnError, TurnObserver};

/// Published states remembered while waiting for their echo. Writes that
/// never echo (rejected by the room) age out past this.
const MAX_IN_FLIGHT: usize = 32;

/// Tracks whose turn it is and keeps it in sync with the room.
///
/// The controller is synchronous and single-owner. In a running session it
/// lives inside a turn actor (see [`spawn_turn_actor`](crate::spawn_turn_actor)),
/// which multiplexes commands and deadline expiry on one task so the two
/// can never interleave.
pub struct TurnController<C: RoomChannel, I: LocalIdentity> {
    channel: Arc<C>,
    identity: I,
    codec: Box<dyn PropertyCodec>,
    observer: Box<dyn TurnObserver>,
    publisher: Publisher,
    state: Option<TurnState>,
    deadline: TurnDeadline,
    /// States this participant published whose echo hasn't arrived yet,
    /// oldest first.
    in_flight: VecDeque<TurnState>,
    /// Authority as of the last `authority_changed`, for logging transitions.
    was_authority: bool,
}

impl<C: RoomChannel, I: LocalIdentity> TurnController<C, I> {
    /// Creates a controller with no turn order and a disarmed deadline.
    pub fn new(
        channel: Arc<C>,
        identity: I,
        observer: impl TurnObserver,
        publisher: Publisher,
        config: &TurnConfig,
    ) -> Self {
        let was_authority = channel.is_authority();
        debug!(
            authority = was_authority,
            local_id = ?identity.local_id(),
            "turn controller created"
        );
        Self {
            channel,
            identity,
            codec: Box::new(JsonPropertyCodec::new(config.keys.clone())),
            observer: Box::new(observer),
            publisher,
            state: None,
            deadline: TurnDeadline::new(config.deadline_config()),
            in_flight: VecDeque::new(),
            was_authority,
        }
    }

    /// Replaces the property codec. The default is [`JsonPropertyCodec`]
    /// with the configured keys.
    pub fn with_codec(mut self, codec: impl PropertyCodec) -> Self {
        self.codec = Box::new(codec);
        self
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Starts a fresh rotation with `combatants` in initiative order.
    ///
    /// Sets the index to 0, publishes, notifies and re-arms the deadline.
    ///
    /// # Errors
    /// - [`TurnError::InvalidOrder`] if `combatants` is empty or repeats an id.
    /// - [`TurnError::NotAuthority`] if the local participant isn't the
    ///   authority.
    ///
    /// On error nothing changes.
    pub fn initialize(&mut self, combatants: Vec<Combatant>) -> Result<(), TurnError> {
        let order = TurnOrder::new(combatants).map_err(TurnError::InvalidOrder)?;
        if !self.channel.is_authority() {
            return Err(TurnError::NotAuthority);
        }

        self.deadline.cancel();
        self.state = Some(TurnState::new(order));
        self.publish();
        self.notify();
        self.deadline.reset();

        if let Some(state) = &self.state {
            info!(
                combatants = state.order().len(),
                active = %state.active().id,
                "turn order initialized"
            );
        }
        Ok(())
    }

    /// Hands the turn to the next combatant, wrapping at the end.
    ///
    /// Only the authority advances; for everyone else this is a silent
    /// no-op, so every client may call it optimistically. Also a no-op
    /// before any turn order exists. Returns `true` if the turn moved.
    pub fn advance_turn(&mut self) -> bool {
        if !self.channel.is_authority() {
            trace!("advance_turn ignored, not the authority");
            return false;
        }
        let Some(state) = self.state.as_mut() else {
            trace!("advance_turn ignored, no turn order");
            return false;
        };

        // Cancel before mutating so an expiry can't advance a second time.
        self.deadline.cancel();
        state.advance();
        self.publish();
        self.notify();
        self.deadline.reset();
        true
    }

    /// Adopts the turn state carried by `props` if it differs from ours.
    ///
    /// Returns `Ok(true)` when the remote state was adopted and `Ok(false)`
    /// when it already matched (no notification, deadline untouched).
    ///
    /// # Errors
    /// [`TurnError::MalformedRemoteState`] if `props` lacks the turn keys or
    /// carries an unusable state (wrong types, empty order, index out of
    /// bounds). Local state is left as it was.
    pub fn reconcile(&mut self, props: &RoomProperties) -> Result<bool, TurnError> {
        let remote = match self.codec.decode(props) {
            Ok(remote) => remote,
            Err(error) => {
                let error = TurnError::MalformedRemoteState(error);
                if error.is_partial_update() {
                    trace!(%error, "ignoring room properties without turn state");
                } else {
                    warn!(%error, "rejecting remote turn state");
                }
                return Err(error);
            }
        };
        Ok(self.reconcile_state(remote))
    }

    /// Adopts an already-decoded remote state if it differs from ours.
    ///
    /// Comparison is structural over the whole order and the index. The
    /// remote state replaces ours verbatim; nothing is merged.
    ///
    /// A remote state matching one of our own in-flight writes is an echo.
    /// Only the echo of the newest write is compared against local state;
    /// older ones are dropped. Any other remote state means someone else
    /// wrote the room, and the in-flight writes are forgotten.
    pub fn reconcile_state(&mut self, remote: TurnState) -> bool {
        if let Some(pos) = self.in_flight.iter().position(|s| *s == remote) {
            self.in_flight.drain(..=pos);
            if !self.in_flight.is_empty() {
                trace!(
                    index = remote.index(),
                    pending = self.in_flight.len(),
                    "dropping stale echo of own turn update"
                );
                return false;
            }
        } else if !self.in_flight.is_empty() {
            debug!(
                pending = self.in_flight.len(),
                "room overwritten by another writer, forgetting pending writes"
            );
            self.in_flight.clear();
        }

        if self.state.as_ref() == Some(&remote) {
            trace!(index = remote.index(), "remote turn state unchanged");
            return false;
        }

        debug!(
            index = remote.index(),
            combatants = remote.order().len(),
            active = %remote.active().id,
            "adopting remote turn state"
        );
        self.deadline.cancel();
        self.state = Some(remote);
        self.notify();
        self.deadline.reset();
        true
    }

    /// Handles an expired turn deadline by trying to advance.
    ///
    /// Only the authority's expiry has an effect. A non-authority leaves
    /// the deadline disarmed until the next state change or
    /// [`authority_changed`](Self::authority_changed).
    pub fn on_deadline(&mut self, info: DeadlineInfo) -> bool {
        let advanced = self.advance_turn();
        if advanced {
            warn!(
                generation = info.generation,
                "turn timeout reached, auto-advancing turn"
            );
        } else {
            debug!(
                generation = info.generation,
                "turn timeout reached, not advancing"
            );
        }
        advanced
    }

    /// Re-reads the authority capability after the room reports a change.
    ///
    /// A participant that gains authority while a turn is running gets a
    /// fresh deadline if its own had already lapsed, so an idle turn still
    /// times out after the previous authority left. Returns the current
    /// authority.
    pub fn authority_changed(&mut self) -> bool {
        let is_authority = self.channel.is_authority();
        if is_authority != self.was_authority {
            info!(
                authority = is_authority,
                local_id = ?self.identity.local_id(),
                "turn authority changed"
            );
        }
        self.was_authority = is_authority;

        if !is_authority {
            // Echoes of our old writes now come from the room like any
            // other state.
            self.in_flight.clear();
        }

        if is_authority && self.state.is_some() && !self.deadline.is_armed() {
            debug!("re-arming lapsed turn deadline after gaining authority");
            self.deadline.reset();
        }
        is_authority
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    /// Current turn state, `None` before the first initialize/reconcile.
    pub fn state(&self) -> Option<&TurnState> {
        self.state.as_ref()
    }

    /// The combatant whose turn it is.
    pub fn active(&self) -> Option<&Combatant> {
        self.state.as_ref().map(TurnState::active)
    }

    /// Whether it's the local participant's turn.
    pub fn is_my_turn(&self) -> bool {
        match (&self.state, self.identity.local_id()) {
            (Some(state), Some(local)) => state.active().id == local,
            _ => false,
        }
    }

    pub fn is_authority(&self) -> bool {
        self.channel.is_authority()
    }

    pub fn deadline(&self) -> &TurnDeadline {
        &self.deadline
    }

    /// Mutable access for driving [`TurnDeadline::expired`] from a
    /// `select!` loop.
    pub fn deadline_mut(&mut self) -> &mut TurnDeadline {
        &mut self.deadline
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn publish(&mut self) {
        let Some(state) = &self.state else {
            return;
        };
        match self.codec.encode(state) {
            Ok(props) => {
                trace!(index = state.index(), "publishing turn state");
                self.publisher.publish(props);
                if self.in_flight.len() == MAX_IN_FLIGHT {
                    self.in_flight.pop_front();
                }
                self.in_flight.push_back(state.clone());
            }
            Err(error) => warn!(%error, "failed to encode turn state"),
        }
    }

    fn notify(&mut self) {
        let Some(state) = &self.state else {
            return;
        };
        let local = self.identity.local_id();
        let event = TurnChanged::for_state(state, local.as_ref());
        debug!(
            active = %event.active_player_id,
            index = event.current_turn_index,
            is_my_turn = event.is_my_turn,
            "turn changed"
        );
        self.observer.on_turn_changed(&event);
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;
    use turnsync_protocol::{CombatantId, PropertyKeys, ProtocolError};

    use super::*;
    use crate::ChannelError;

    // =====================================================================
    // Fakes
    // =====================================================================

    /// A channel whose authority flag the test flips directly.
    #[derive(Default)]
    struct FakeChannel {
        authority: AtomicBool,
    }

    impl FakeChannel {
        fn set_authority(&self, authority: bool) {
            self.authority.store(authority, Ordering::SeqCst);
        }
    }

    impl RoomChannel for FakeChannel {
        fn is_authority(&self) -> bool {
            self.authority.load(Ordering::SeqCst)
        }

        async fn set_properties(&self, _props: RoomProperties) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    type Events = Arc<Mutex<Vec<TurnChanged>>>;

    struct Harness {
        controller: TurnController<FakeChannel, CombatantId>,
        channel: Arc<FakeChannel>,
        events: Events,
        published: mpsc::UnboundedReceiver<RoomProperties>,
    }

    impl Harness {
        fn events(&self) -> Vec<TurnChanged> {
            self.events.lock().unwrap().clone()
        }

        fn published(&mut self) -> Vec<RoomProperties> {
            let mut out = Vec::new();
            while let Ok(props) = self.published.try_recv() {
                out.push(props);
            }
            out
        }
    }

    fn harness(local: &str, authority: bool) -> Harness {
        let channel = Arc::new(FakeChannel::default());
        channel.set_authority(authority);
        let events: Events = Arc::default();
        let sink = events.clone();
        let (publisher, published) = Publisher::queue();
        let controller = TurnController::new(
            channel.clone(),
            CombatantId::from(local),
            move |event: &TurnChanged| sink.lock().unwrap().push(event.clone()),
            publisher,
            &TurnConfig::default(),
        );
        Harness {
            controller,
            channel,
            events,
            published,
        }
    }

    fn order_ab() -> Vec<Combatant> {
        vec![Combatant::new("1", "A"), Combatant::new("2", "B")]
    }

    fn order_of(n: usize) -> Vec<Combatant> {
        (0..n)
            .map(|i| Combatant::new(i as u64, format!("C{i}")))
            .collect()
    }

    fn remote(order: Vec<Combatant>, index: usize) -> RoomProperties {
        let mut props = RoomProperties::new();
        props.insert(
            PropertyKeys::DEFAULT_ORDER.to_owned(),
            serde_json::to_value(order).unwrap(),
        );
        props.insert(PropertyKeys::DEFAULT_INDEX.to_owned(), json!(index));
        props
    }

    // =====================================================================
    // initialize()
    // =====================================================================

    #[test]
    fn test_initialize_starts_at_first_combatant() {
        let mut h = harness("1", true);

        h.controller.initialize(order_ab()).unwrap();

        assert_eq!(h.controller.state().unwrap().index(), 0);
        let events = h.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].active_player, "A");
        assert_eq!(events[0].active_player_id.as_str(), "1");
        assert_eq!(events[0].current_turn_index, 0);
        assert!(events[0].is_my_turn);
    }

    #[test]
    fn test_initialize_publishes_order_and_index() {
        let mut h = harness("1", true);

        h.controller.initialize(order_ab()).unwrap();

        let published = h.published();
        assert_eq!(published, vec![remote(order_ab(), 0)]);
    }

    #[test]
    fn test_initialize_arms_deadline() {
        let mut h = harness("1", true);

        h.controller.initialize(order_ab()).unwrap();

        assert!(h.controller.deadline().is_armed());
        assert_eq!(h.controller.deadline().generation(), 1);
    }

    #[test]
    fn test_initialize_rejects_empty_order() {
        let mut h = harness("1", true);

        let result = h.controller.initialize(vec![]);

        assert!(matches!(result, Err(TurnError::InvalidOrder(_))));
        assert!(h.controller.state().is_none());
        assert!(h.events().is_empty());
        assert!(h.published().is_empty());
        assert!(!h.controller.deadline().is_armed());
    }

    #[test]
    fn test_initialize_rejects_duplicate_ids() {
        let mut h = harness("1", true);

        let result = h
            .controller
            .initialize(vec![Combatant::new("1", "A"), Combatant::new("1", "B")]);

        assert!(matches!(result, Err(TurnError::InvalidOrder(_))));
        assert!(h.controller.state().is_none());
    }

    #[test]
    fn test_initialize_requires_authority() {
        let mut h = harness("2", false);

        let result = h.controller.initialize(order_ab());

        assert!(matches!(result, Err(TurnError::NotAuthority)));
        assert!(h.controller.state().is_none());
        assert!(h.events().is_empty());
        assert!(h.published().is_empty());
    }

    #[test]
    fn test_reinitialize_resets_index() {
        let mut h = harness("1", true);
        h.controller.initialize(order_ab()).unwrap();
        h.controller.advance_turn();

        h.controller.initialize(order_of(3)).unwrap();

        let state = h.controller.state().unwrap();
        assert_eq!(state.index(), 0);
        assert_eq!(state.order().len(), 3);
    }

    // =====================================================================
    // advance_turn()
    // =====================================================================

    #[test]
    fn test_two_combatant_walk_wraps_to_start() {
        let mut h = harness("1", true);
        h.controller.initialize(order_ab()).unwrap();

        assert!(h.controller.advance_turn());
        assert!(h.controller.advance_turn());

        let events = h.events();
        let names: Vec<_> = events.iter().map(|e| e.active_player.as_str()).collect();
        let indices: Vec<_> = events.iter().map(|e| e.current_turn_index).collect();
        assert_eq!(names, vec!["A", "B", "A"]);
        assert_eq!(indices, vec![0, 1, 0]);
    }

    #[test]
    fn test_advance_cycles_through_every_index() {
        for len in 1..=6 {
            for start in 0..len {
                let mut h = harness("0", true);
                h.controller
                    .reconcile(&remote(order_of(len), start))
                    .unwrap();

                let mut seen = Vec::new();
                for _ in 0..len {
                    h.controller.advance_turn();
                    seen.push(h.controller.state().unwrap().index());
                }

                let mut sorted = seen.clone();
                sorted.sort_unstable();
                assert_eq!(sorted, (0..len).collect::<Vec<_>>(), "len {len} start {start}");
                assert_eq!(*seen.last().unwrap(), start, "back to start after len advances");
            }
        }
    }

    #[test]
    fn test_advance_publishes_each_step() {
        let mut h = harness("1", true);
        h.controller.initialize(order_ab()).unwrap();
        h.published();

        h.controller.advance_turn();

        assert_eq!(h.published(), vec![remote(order_ab(), 1)]);
    }

    #[test]
    fn test_advance_without_authority_is_noop() {
        let mut h = harness("2", false);
        h.controller.reconcile(&remote(order_ab(), 0)).unwrap();
        let before = h.controller.state().cloned();
        let events_before = h.events().len();

        assert!(!h.controller.advance_turn());

        assert_eq!(h.controller.state().cloned(), before);
        assert_eq!(h.events().len(), events_before);
        assert!(h.published().is_empty());
    }

    #[test]
    fn test_advance_before_initialize_is_noop() {
        let mut h = harness("1", true);

        assert!(!h.controller.advance_turn());
        assert!(h.events().is_empty());
        assert!(!h.controller.deadline().is_armed());
    }

    #[test]
    fn test_advance_rearms_deadline_once() {
        let mut h = harness("1", true);
        h.controller.initialize(order_ab()).unwrap();

        h.controller.advance_turn();

        let deadline = h.controller.deadline();
        assert!(deadline.is_armed());
        assert_eq!(deadline.generation(), 2);
        assert_eq!(deadline.metrics().total_cancels, 1);
    }

    // =====================================================================
    // reconcile()
    // =====================================================================

    #[test]
    fn test_reconcile_adopts_remote_state() {
        let mut h = harness("2", false);

        let adopted = h.controller.reconcile(&remote(order_ab(), 1)).unwrap();

        assert!(adopted);
        let state = h.controller.state().unwrap();
        assert_eq!(state.index(), 1);
        assert_eq!(state.order().as_slice(), order_ab().as_slice());
        let events = h.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].active_player, "B");
        assert!(events[0].is_my_turn);
    }

    #[test]
    fn test_reconcile_equal_state_is_silent() {
        let mut h = harness("2", false);
        h.controller.reconcile(&remote(order_ab(), 1)).unwrap();
        let generation = h.controller.deadline().generation();

        let adopted = h.controller.reconcile(&remote(order_ab(), 1)).unwrap();

        assert!(!adopted);
        assert_eq!(h.events().len(), 1);
        assert_eq!(h.controller.deadline().generation(), generation);
    }

    #[test]
    fn test_reconcile_replaces_rather_than_merges() {
        let mut h = harness("1", true);
        h.controller.initialize(order_of(4)).unwrap();
        h.controller.advance_turn();

        let new_order = vec![Combatant::new("9", "Nine"), Combatant::new("8", "Eight")];
        h.controller.reconcile(&remote(new_order.clone(), 0)).unwrap();

        let state = h.controller.state().unwrap();
        assert_eq!(state.order().as_slice(), new_order.as_slice());
        assert_eq!(state.index(), 0);
    }

    #[test]
    fn test_reconcile_detects_order_change_at_same_index() {
        let mut h = harness("1", false);
        h.controller.reconcile(&remote(order_ab(), 0)).unwrap();

        let renamed = vec![Combatant::new("1", "Aria"), Combatant::new("2", "B")];
        let adopted = h.controller.reconcile(&remote(renamed, 0)).unwrap();

        assert!(adopted);
        assert_eq!(h.events().last().unwrap().active_player, "Aria");
    }

    #[test]
    fn test_reconcile_does_not_publish() {
        let mut h = harness("1", true);

        h.controller.reconcile(&remote(order_ab(), 1)).unwrap();

        assert!(h.published().is_empty());
    }

    #[test]
    fn test_reconcile_restarts_deadline() {
        let mut h = harness("2", false);

        h.controller.reconcile(&remote(order_ab(), 0)).unwrap();
        h.controller.reconcile(&remote(order_ab(), 1)).unwrap();

        assert!(h.controller.deadline().is_armed());
        assert_eq!(h.controller.deadline().generation(), 2);
    }

    #[test]
    fn test_reconcile_missing_keys_is_partial_update() {
        let mut h = harness("2", false);
        h.controller.reconcile(&remote(order_ab(), 0)).unwrap();

        let mut props = RoomProperties::new();
        props.insert("mapSeed".into(), json!(7));
        let result = h.controller.reconcile(&props);

        let error = result.unwrap_err();
        assert!(error.is_partial_update());
        assert_eq!(h.controller.state().unwrap().index(), 0);
        assert_eq!(h.events().len(), 1);
    }

    #[test]
    fn test_reconcile_rejects_out_of_bounds_index() {
        let mut h = harness("2", false);
        h.controller.reconcile(&remote(order_ab(), 0)).unwrap();

        let result = h.controller.reconcile(&remote(order_ab(), 2));

        assert!(matches!(result, Err(TurnError::MalformedRemoteState(_))));
        assert!(!result.unwrap_err().is_partial_update());
        assert_eq!(h.controller.state().unwrap().index(), 0);
        assert_eq!(h.events().len(), 1, "rejected state must not notify");
    }

    #[test]
    fn test_reconcile_rejects_empty_remote_order() {
        let mut h = harness("2", false);

        let result = h.controller.reconcile(&remote(vec![], 0));

        assert!(matches!(result, Err(TurnError::MalformedRemoteState(_))));
        assert!(h.controller.state().is_none());
    }

    // =====================================================================
    // isMyTurn
    // =====================================================================

    #[test]
    fn test_is_my_turn_follows_active_combatant() {
        let mut h = harness("2", true);
        h.controller.initialize(order_ab()).unwrap();
        assert!(!h.controller.is_my_turn());

        h.controller.advance_turn();
        assert!(h.controller.is_my_turn());

        let flags: Vec<_> = h.events().iter().map(|e| e.is_my_turn).collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_participant_without_identity_never_has_turn() {
        let channel = Arc::new(FakeChannel::default());
        let events: Events = Arc::default();
        let sink = events.clone();
        let (publisher, _rx) = Publisher::queue();
        let mut controller = TurnController::new(
            channel,
            None::<CombatantId>,
            move |event: &TurnChanged| sink.lock().unwrap().push(event.clone()),
            publisher,
            &TurnConfig::default(),
        );

        controller.reconcile(&remote(order_ab(), 0)).unwrap();

        assert!(!controller.is_my_turn());
        assert!(!events.lock().unwrap()[0].is_my_turn);
    }

    // =====================================================================
    // Deadline expiry and authority changes
    // =====================================================================

    #[test]
    fn test_on_deadline_advances_for_authority() {
        let mut h = harness("1", true);
        h.controller.initialize(order_ab()).unwrap();
        let info = DeadlineInfo {
            generation: 1,
            late_by: Duration::ZERO,
        };

        assert!(h.controller.on_deadline(info));
        assert_eq!(h.controller.state().unwrap().index(), 1);
    }

    #[test]
    fn test_on_deadline_is_noop_for_observer() {
        let mut h = harness("2", false);
        h.controller.reconcile(&remote(order_ab(), 0)).unwrap();
        // Simulate the deadline having fired and disarmed.
        h.controller.deadline_mut().cancel();
        let info = DeadlineInfo {
            generation: 1,
            late_by: Duration::ZERO,
        };

        assert!(!h.controller.on_deadline(info));
        assert_eq!(h.controller.state().unwrap().index(), 0);
        assert!(!h.controller.deadline().is_armed());
    }

    #[test]
    fn test_gaining_authority_rearms_lapsed_deadline() {
        let mut h = harness("2", false);
        h.controller.reconcile(&remote(order_ab(), 0)).unwrap();
        h.controller.deadline_mut().cancel();

        h.channel.set_authority(true);
        assert!(h.controller.authority_changed());

        assert!(h.controller.deadline().is_armed());
        assert!(h.controller.advance_turn(), "new authority can advance");
    }

    #[test]
    fn test_authority_change_keeps_running_deadline() {
        let mut h = harness("2", false);
        h.controller.reconcile(&remote(order_ab(), 0)).unwrap();
        let generation = h.controller.deadline().generation();

        h.channel.set_authority(true);
        h.controller.authority_changed();

        assert_eq!(h.controller.deadline().generation(), generation);
    }

    #[test]
    fn test_losing_authority_stops_advancing() {
        let mut h = harness("1", true);
        h.controller.initialize(order_ab()).unwrap();

        h.channel.set_authority(false);
        assert!(!h.controller.authority_changed());

        assert!(!h.controller.advance_turn());
        assert_eq!(h.controller.state().unwrap().index(), 0);
    }

    // =====================================================================
    // Echoes of our own writes
    // =====================================================================

    #[test]
    fn test_stale_echo_of_own_write_is_dropped() {
        let mut h = harness("0", true);
        h.controller.initialize(order_of(3)).unwrap();
        h.controller.advance_turn();
        h.controller.advance_turn();

        // The room reports the first two writes after we've moved to 2.
        assert!(!h.controller.reconcile(&remote(order_of(3), 0)).unwrap());
        assert!(!h.controller.reconcile(&remote(order_of(3), 1)).unwrap());

        assert_eq!(h.controller.state().unwrap().index(), 2);
        let indices: Vec<_> = h.events().iter().map(|e| e.current_turn_index).collect();
        assert_eq!(indices, vec![0, 1, 2], "never reported a backwards move");

        assert!(h.controller.advance_turn());
        assert_eq!(h.controller.state().unwrap().index(), 0);
    }

    #[test]
    fn test_echo_of_newest_write_is_silent() {
        let mut h = harness("0", true);
        h.controller.initialize(order_of(3)).unwrap();
        h.controller.advance_turn();
        let generation = h.controller.deadline().generation();

        assert!(!h.controller.reconcile(&remote(order_of(3), 0)).unwrap());
        assert!(!h.controller.reconcile(&remote(order_of(3), 1)).unwrap());

        assert_eq!(h.events().len(), 2);
        assert_eq!(h.controller.deadline().generation(), generation);
    }

    #[test]
    fn test_repeated_state_matches_echoes_in_order() {
        let mut h = harness("1", true);
        h.controller.initialize(order_ab()).unwrap();
        h.controller.advance_turn();
        h.controller.advance_turn();

        // Writes were 0, 1, 0. The first 0 is stale, the last one current.
        assert!(!h.controller.reconcile(&remote(order_ab(), 0)).unwrap());
        assert!(!h.controller.reconcile(&remote(order_ab(), 1)).unwrap());
        assert!(!h.controller.reconcile(&remote(order_ab(), 0)).unwrap());

        assert_eq!(h.controller.state().unwrap().index(), 0);
        assert_eq!(h.events().len(), 3);
    }

    #[test]
    fn test_foreign_write_is_adopted_while_writes_pending() {
        let mut h = harness("1", true);
        h.controller.initialize(order_of(3)).unwrap();
        h.controller.advance_turn();

        let adopted = h.controller.reconcile(&remote(order_ab(), 1)).unwrap();

        assert!(adopted);
        assert_eq!(h.controller.active().unwrap().display_name, "B");
    }

    #[test]
    fn test_losing_authority_forgets_pending_writes() {
        let mut h = harness("1", true);
        h.controller.initialize(order_ab()).unwrap();
        h.controller.advance_turn();

        h.channel.set_authority(false);
        h.controller.authority_changed();

        // Without authority the room is the only source of truth.
        assert!(h.controller.reconcile(&remote(order_ab(), 0)).unwrap());
        assert_eq!(h.controller.state().unwrap().index(), 0);
    }

    // =====================================================================
    // Custom codec
    // =====================================================================

    /// Stores only the index under `"turn"`; the order is fixed up front.
    struct IndexOnlyCodec {
        order: TurnOrder,
    }

    impl PropertyCodec for IndexOnlyCodec {
        fn encode(&self, state: &TurnState) -> Result<RoomProperties, ProtocolError> {
            let mut props = RoomProperties::new();
            props.insert("turn".to_owned(), json!(state.index()));
            Ok(props)
        }

        fn decode(&self, props: &RoomProperties) -> Result<TurnState, ProtocolError> {
            let index = props
                .get("turn")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| ProtocolError::MissingField("turn".to_owned()))?;
            TurnState::with_index(self.order.clone(), index as usize)
        }
    }

    #[test]
    fn test_custom_codec_drives_publish_and_reconcile() {
        let order = TurnOrder::new(order_ab()).unwrap();
        let mut h = harness("2", true);
        h.controller = h.controller.with_codec(IndexOnlyCodec { order });

        h.controller.initialize(order_ab()).unwrap();
        h.controller.advance_turn();

        let published = h.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].get("turn"), Some(&json!(1)));
        assert!(!published[1].contains_key(PropertyKeys::DEFAULT_ORDER));

        h.channel.set_authority(false);
        h.controller.authority_changed();
        let mut props = RoomProperties::new();
        props.insert("turn".to_owned(), json!(0));
        assert!(h.controller.reconcile(&props).unwrap());
        assert!(!h.controller.is_my_turn());
    }
}
