//! Turn-change observers.

use tokio::sync::mpsc;
use turnsync_protocol::TurnChanged;

/// Receives a [`TurnChanged`] after every accepted state change.
///
/// Called synchronously on the controller's task, after the new state is
/// committed. Implemented for any `FnMut(&TurnChanged) + Send` closure.
pub trait TurnObserver: Send + 'static {
    fn on_turn_changed(&mut self, event: &TurnChanged);
}

impl<F> TurnObserver for F
where
    F: FnMut(&TurnChanged) + Send + 'static,
{
    fn on_turn_changed(&mut self, event: &TurnChanged) {
        self(event)
    }
}

/// An observer that forwards every notification into an unbounded channel.
///
/// Useful when the consumer lives on another task, e.g. a UI loop. Events
/// are dropped silently once the receiver is gone.
pub fn channel_observer() -> (impl TurnObserver, mpsc::UnboundedReceiver<TurnChanged>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let observer = move |event: &TurnChanged| {
        let _ = tx.send(event.clone());
    };
    (observer, rx)
}
