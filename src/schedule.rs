//! Debounced rebuild scheduling.
//!
//! Two independent channels coalesce bursts of change events into single
//! rebuild passes:
//!
//! - **fast**: short quiet window, fires a single-page render when one
//!   record changed, a full render otherwise.
//! - **slow**: long quiet window, always fires a full render. A single-page
//!   render can leave cross-page references stale (navigation built from
//!   another page's title); the slow channel guarantees eventual full
//!   consistency once a burst of edits settles.
//!
//! Each channel is an explicit cancellable-timer state holder: every
//! trigger cancels the previous pending fire and reschedules the deadline,
//! so a superseded pending action never executes. All timing flows through
//! `Instant` arguments, which keeps the scheduler deterministic under test
//! and keeps the event loop the only place that reads the clock.

use crate::config::WatchConfig;
use std::time::{Duration, Instant};

/// Timeout used by the event loop when no fire is scheduled.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Rebuild Request
// ============================================================================

/// Unit of work a channel fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebuild {
    /// Re-render a single registry index (plus aggregates).
    Page(usize),
    /// Re-render the whole site.
    Site,
}

impl Rebuild {
    /// Coalesce a pending request with a newer one.
    ///
    /// Two different page indices inside one window escalate to a full
    /// render; the channel still fires exactly once per burst.
    const fn merge(self, next: Self) -> Self {
        match (self, next) {
            (Self::Page(a), Self::Page(b)) if a == b => Self::Page(a),
            _ => Self::Site,
        }
    }
}

// ============================================================================
// Debounce Channel
// ============================================================================

/// One cancellable debounce timer plus its pending rebuild request.
#[derive(Debug)]
pub struct DebounceChannel {
    window: Duration,
    deadline: Option<Instant>,
    pending: Option<Rebuild>,
}

impl DebounceChannel {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
            pending: None,
        }
    }

    /// Record a trigger: merge the request and reset the quiet window.
    pub fn trigger(&mut self, rebuild: Rebuild, now: Instant) {
        self.pending = Some(match self.pending {
            Some(pending) => pending.merge(rebuild),
            None => rebuild,
        });
        self.deadline = Some(now + self.window);
    }

    /// Take the pending request if the quiet window has elapsed.
    pub fn fire(&mut self, now: Instant) -> Option<Rebuild> {
        if self.deadline.is_some_and(|deadline| now >= deadline) {
            self.deadline = None;
            self.pending.take()
        } else {
            None
        }
    }

    /// Time until the pending fire, `None` when nothing is scheduled.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(now))
    }

    #[allow(dead_code)]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any pending fire without executing it.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending = None;
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// The fast and slow channels, as one unit owned by the watch coordinator.
#[derive(Debug)]
pub struct RebuildScheduler {
    pub fast: DebounceChannel,
    pub slow: DebounceChannel,
}

impl RebuildScheduler {
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            fast: DebounceChannel::new(config.fast_window()),
            slow: DebounceChannel::new(config.slow_window()),
        }
    }

    /// Event-loop timeout: the nearest channel deadline, or an idle tick.
    pub fn timeout(&self, now: Instant) -> Duration {
        [self.fast.remaining(now), self.slow.remaining(now)]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(IDLE_TIMEOUT)
            .max(Duration::from_millis(1))
    }

    pub fn cancel_all(&mut self) {
        self.fast.cancel();
        self.slow.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================
