//! Turn controller configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use turnsync_deadline::DeadlineConfig;
use turnsync_protocol::PropertyKeys;

/// Configuration for a turn controller and its actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// How long a turn may last before the authority auto-advances it.
    pub turn_timeout: Duration,

    /// Room property keys carrying the turn order and index. Must match
    /// across every participant of the session.
    pub keys: PropertyKeys,

    /// Capacity of the turn actor's command channel.
    pub command_buffer: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            turn_timeout: DeadlineConfig::DEFAULT_TURN_TIMEOUT,
            keys: PropertyKeys::default(),
            command_buffer: 64,
        }
    }
}

impl TurnConfig {
    /// Default config with a different turn timeout.
    pub fn with_timeout(turn_timeout: Duration) -> Self {
        Self {
            turn_timeout,
            ..Self::default()
        }
    }

    pub(crate) fn deadline_config(&self) -> DeadlineConfig {
        DeadlineConfig::with_timeout(self.turn_timeout)
    }
}
