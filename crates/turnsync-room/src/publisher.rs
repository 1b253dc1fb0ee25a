//! Fire-and-forget publishing of turn properties.
//!
//! The controller must never wait on the network. It pushes each property
//! update onto an unbounded queue; a background task drains the queue in
//! order and awaits [`RoomChannel::set_properties`] one update at a time,
//! so a slow write can't let an older turn overwrite a newer one.

use std::sync::Arc;

use tokio::sync::mpsc;
use turnsync_protocol::RoomProperties;

use crate::RoomChannel;

/// Sending half of the publish queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::UnboundedSender<RoomProperties>,
}

impl Publisher {
    /// Spawns the publisher task for `channel` and returns its queue.
    ///
    /// The task stops once every `Publisher` clone is dropped.
    pub fn spawn<C: RoomChannel>(channel: Arc<C>) -> Self {
        let (publisher, rx) = Self::queue();
        tokio::spawn(run_publisher(channel, rx));
        publisher
    }

    /// A publisher whose queue is drained by the caller instead of a task.
    pub fn queue() -> (Self, mpsc::UnboundedReceiver<RoomProperties>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueues `props` for publishing. Never blocks.
    pub fn publish(&self, props: RoomProperties) {
        if self.tx.send(props).is_err() {
            tracing::warn!("publisher stopped, dropping turn properties");
        }
    }
}

async fn run_publisher<C: RoomChannel>(
    channel: Arc<C>,
    mut rx: mpsc::UnboundedReceiver<RoomProperties>,
) {
    tracing::debug!("turn publisher started");

    while let Some(props) = rx.recv().await {
        let keys = props.len();
        match channel.set_properties(props).await {
            Ok(()) => tracing::trace!(keys, "turn properties published"),
            // Local state stays advanced; the next accepted change or
            // reconciliation brings the room back in line.
            Err(error) => tracing::warn!(%error, "failed to update turn properties"),
        }
    }

    tracing::debug!("turn publisher stopped");
}
