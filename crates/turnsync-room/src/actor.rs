//! Turn actor: an isolated Tokio task that owns a [`TurnController`].
//!
//! Commands arrive over a bounded mpsc channel and the turn deadline is
//! awaited in the same `select!` loop, so a timeout can never interleave
//! with an `advance_turn` or `reconcile` that is already running.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use turnsync_deadline::DeadlineMetrics;
use turnsync_protocol::{Combatant, RoomProperties, TurnState};

use crate::{
    LocalIdentity, Publisher, RoomChannel, TurnConfig, TurnController, TurnError,
    TurnObserver,
};

/// Commands sent to a turn actor through its channel.
///
/// Variants with a `reply` carry a oneshot channel the caller awaits.
pub(crate) enum TurnCommand {
    Initialize {
        order: Vec<Combatant>,
        reply: oneshot::Sender<Result<(), TurnError>>,
    },
    Advance {
        reply: oneshot::Sender<bool>,
    },
    Reconcile {
        props: RoomProperties,
        reply: Option<oneshot::Sender<Result<bool, TurnError>>>,
    },
    AuthorityChanged {
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<TurnSnapshot>,
    },
    Shutdown,
}

/// Point-in-time view of a turn actor.
#[derive(Debug, Clone)]
pub struct TurnSnapshot {
    /// Current turn state, `None` before the first accepted change.
    pub state: Option<TurnState>,
    pub is_authority: bool,
    /// Time left on the turn deadline, `None` when disarmed.
    pub deadline_remaining: Option<Duration>,
    pub deadline_metrics: DeadlineMetrics,
}

/// Handle to a running turn actor.
///
/// Cheap to clone; every clone talks to the same actor.
#[derive(Clone)]
pub struct TurnHandle {
    sender: mpsc::Sender<TurnCommand>,
}

impl TurnHandle {
    /// Starts a fresh rotation. See [`TurnController::initialize`].
    pub async fn initialize(&self, order: Vec<Combatant>) -> Result<(), TurnError> {
        let (reply, rx) = oneshot::channel();
        self.send(TurnCommand::Initialize { order, reply }).await?;
        rx.await.map_err(|_| TurnError::Unavailable)?
    }

    /// Advances the turn if this participant is the authority. Returns
    /// whether the turn moved.
    pub async fn advance_turn(&self) -> Result<bool, TurnError> {
        let (reply, rx) = oneshot::channel();
        self.send(TurnCommand::Advance { reply }).await?;
        rx.await.map_err(|_| TurnError::Unavailable)
    }

    /// Feeds room properties into reconciliation and waits for the outcome.
    pub async fn reconcile(&self, props: RoomProperties) -> Result<bool, TurnError> {
        let (reply, rx) = oneshot::channel();
        self.send(TurnCommand::Reconcile {
            props,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| TurnError::Unavailable)?
    }

    /// Tells the actor the room's authority may have moved.
    pub async fn authority_changed(&self) -> Result<bool, TurnError> {
        let (reply, rx) = oneshot::channel();
        self.send(TurnCommand::AuthorityChanged { reply }).await?;
        rx.await.map_err(|_| TurnError::Unavailable)
    }

    pub async fn snapshot(&self) -> Result<TurnSnapshot, TurnError> {
        let (reply, rx) = oneshot::channel();
        self.send(TurnCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| TurnError::Unavailable)
    }

    /// Stops the actor. Pending deadlines are dropped.
    pub async fn shutdown(&self) -> Result<(), TurnError> {
        self.send(TurnCommand::Shutdown).await
    }

    /// Spawns a task that feeds every property update from `updates` into
    /// reconciliation. Ends when the feed closes or the actor stops.
    pub fn follow(&self, mut updates: broadcast::Receiver<RoomProperties>) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(props) => {
                        let cmd = TurnCommand::Reconcile { props, reply: None };
                        if handle.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Each update is the full property map, so the
                        // next one carries everything that was skipped.
                        tracing::warn!(skipped, "room property feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("room property feed ended");
        })
    }

    async fn send(&self, cmd: TurnCommand) -> Result<(), TurnError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| TurnError::Unavailable)
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct TurnActor<C: RoomChannel, I: LocalIdentity> {
    controller: TurnController<C, I>,
    receiver: mpsc::Receiver<TurnCommand>,
}

impl<C: RoomChannel, I: LocalIdentity> TurnActor<C, I> {
    async fn run(mut self) {
        tracing::info!("turn actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                info = self.controller.deadline_mut().expired() => {
                    self.controller.on_deadline(info);
                }
            }
        }

        tracing::info!("turn actor stopped");
    }

    /// Applies one command. Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: TurnCommand) -> bool {
        match cmd {
            TurnCommand::Initialize { order, reply } => {
                let result = self.controller.initialize(order);
                if let Err(error) = &result {
                    tracing::warn!(%error, "initialize rejected");
                }
                let _ = reply.send(result);
            }
            TurnCommand::Advance { reply } => {
                let _ = reply.send(self.controller.advance_turn());
            }
            TurnCommand::Reconcile { props, reply } => {
                let result = self.controller.reconcile(&props);
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            TurnCommand::AuthorityChanged { reply } => {
                let _ = reply.send(self.controller.authority_changed());
            }
            TurnCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            TurnCommand::Shutdown => {
                tracing::info!("turn actor shutting down");
                return false;
            }
        }
        true
    }

    fn snapshot(&self) -> TurnSnapshot {
        let deadline = self.controller.deadline();
        TurnSnapshot {
            state: self.controller.state().cloned(),
            is_authority: self.controller.is_authority(),
            deadline_remaining: deadline.remaining(),
            deadline_metrics: deadline.metrics().clone(),
        }
    }
}

/// Spawns a turn actor for one participant and returns its handle.
///
/// Also spawns the publisher task that writes turn properties to
/// `channel`. Must be called from within a Tokio runtime.
pub fn spawn_turn_actor<C, I>(
    channel: Arc<C>,
    identity: I,
    observer: impl TurnObserver,
    config: TurnConfig,
) -> TurnHandle
where
    C: RoomChannel,
    I: LocalIdentity,
{
    let publisher = Publisher::spawn(channel.clone());
    let controller = TurnController::new(channel, identity, observer, publisher, &config);
    spawn_controller(controller, config.command_buffer)
}

/// Spawns a turn actor around an existing controller, e.g. one built with
/// a custom codec.
pub fn spawn_controller<C, I>(
    controller: TurnController<C, I>,
    command_buffer: usize,
) -> TurnHandle
where
    C: RoomChannel,
    I: LocalIdentity,
{
    let (sender, receiver) = mpsc::channel(command_buffer.max(1));
    let actor = TurnActor {
        controller,
        receiver,
    };
    tokio::spawn(actor.run());
    TurnHandle { sender }
}
