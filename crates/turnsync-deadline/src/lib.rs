//! Single-shot per-turn deadline scheduler for turnsync.
//!
//! A [`TurnDeadline`] holds at most one pending expiry. Re-arming it
//! replaces the previous expiry, so two timers can never be live for the
//! same owner.
//!
//! # Disarmed mode
//!
//! Before the first [`TurnDeadline::reset`], after [`TurnDeadline::cancel`]
//! and after an expiry has been delivered, [`TurnDeadline::expired`] pends
//! forever. Nothing fires until the owner arms it again.
//!
//! # Integration
//!
//! The deadline is designed to sit inside a turn actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands, maybe reset */ }
//!         info = deadline.expired() => {
//!             controller.advance_turn();
//!         }
//!     }
//! }
//! ```
//!
//! `expired` only mutates the deadline after its sleep completes, so it is
//! safe to drop the future when another `select!` branch wins.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`TurnDeadline`].
#[derive(Debug, Clone)]
pub struct DeadlineConfig {
    /// How long a turn may last before it is auto-advanced. Default: 30 s.
    pub turn_timeout: Duration,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            turn_timeout: Self::DEFAULT_TURN_TIMEOUT,
        }
    }
}

impl DeadlineConfig {
    /// Default per-turn timeout.
    pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_millis(30_000);

    /// Shortest accepted timeout. A zero timeout would expire in the same
    /// instant it is armed and spin the actor.
    pub const MIN_TURN_TIMEOUT: Duration = Duration::from_millis(1);

    /// Create a config with a specific timeout.
    pub fn with_timeout(turn_timeout: Duration) -> Self {
        Self { turn_timeout }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TurnDeadline::new`].
    pub fn validated(mut self) -> Self {
        if self.turn_timeout < Self::MIN_TURN_TIMEOUT {
            warn!(
                timeout_ms = self.turn_timeout.as_secs_f64() * 1000.0,
                min_ms = Self::MIN_TURN_TIMEOUT.as_secs_f64() * 1000.0,
                "turn_timeout below minimum, clamping"
            );
            self.turn_timeout = Self::MIN_TURN_TIMEOUT;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Expiry info
// ---------------------------------------------------------------------------

/// Returned by [`TurnDeadline::expired`] when the armed deadline passes.
#[derive(Debug, Clone)]
pub struct DeadlineInfo {
    /// Arm generation that expired. Increments on every [`TurnDeadline::reset`].
    pub generation: u64,
    /// How late the expiry was observed relative to the scheduled instant.
    pub late_by: Duration,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters updated by the deadline as it is armed, cancelled and expires.
#[derive(Debug, Clone, Default)]
pub struct DeadlineMetrics {
    /// Times the deadline was armed (fresh or replacing a pending one).
    pub total_arms: u64,
    /// Times a pending deadline was discarded before expiring, either by
    /// `cancel` or by `reset` replacing it.
    pub total_cancels: u64,
    /// Times the deadline expired and was delivered.
    pub total_expirations: u64,
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

/// Single-shot, resettable turn deadline. One per turn controller.
pub struct TurnDeadline {
    config: DeadlineConfig,
    /// When the pending deadline fires. `None` means disarmed.
    due: Option<Instant>,
    generation: u64,
    metrics: DeadlineMetrics,
}

impl TurnDeadline {
    /// Create a disarmed deadline from config.
    pub fn new(config: DeadlineConfig) -> Self {
        let config = config.validated();
        debug!(
            timeout_ms = config.turn_timeout.as_secs_f64() * 1000.0,
            "turn deadline created"
        );
        Self {
            config,
            due: None,
            generation: 0,
            metrics: DeadlineMetrics::default(),
        }
    }

    /// Create a disarmed deadline with the given timeout.
    pub fn with_timeout(turn_timeout: Duration) -> Self {
        Self::new(DeadlineConfig::with_timeout(turn_timeout))
    }

    /// Cancel any pending deadline and arm a new one `turn_timeout` from now.
    pub fn reset(&mut self) {
        if self.due.is_some() {
            self.metrics.total_cancels += 1;
        }
        self.generation += 1;
        self.due = Some(Instant::now() + self.config.turn_timeout);
        self.metrics.total_arms += 1;
        trace!(
            generation = self.generation,
            timeout_ms = self.config.turn_timeout.as_secs_f64() * 1000.0,
            "turn deadline armed"
        );
    }

    /// Disarm the deadline. Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        if self.due.take().is_some() {
            self.metrics.total_cancels += 1;
            trace!(generation = self.generation, "turn deadline cancelled");
            true
        } else {
            false
        }
    }

    /// Wait until the armed deadline passes, then disarm it.
    ///
    /// Pends forever while disarmed; `tokio::select!` keeps serving its
    /// other branches.
    pub async fn expired(&mut self) -> DeadlineInfo {
        let Some(due) = self.due else {
            return std::future::pending().await;
        };

        time::sleep_until(due).await;

        self.due = None;
        self.metrics.total_expirations += 1;
        let late_by = Instant::now().saturating_duration_since(due);
        debug!(
            generation = self.generation,
            late_ms = late_by.as_secs_f64() * 1000.0,
            "turn deadline expired"
        );

        DeadlineInfo {
            generation: self.generation,
            late_by,
        }
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.due.is_some()
    }

    /// Time left before the pending deadline fires, or `None` when disarmed.
    pub fn remaining(&self) -> Option<Duration> {
        self.due
            .map(|due| due.saturating_duration_since(Instant::now()))
    }

    /// The configured per-turn timeout.
    pub fn turn_timeout(&self) -> Duration {
        self.config.turn_timeout
    }

    /// Current arm generation (0 before the first `reset`).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Snapshot of current metrics.
    pub fn metrics(&self) -> &DeadlineMetrics {
        &self.metrics
    }
}
