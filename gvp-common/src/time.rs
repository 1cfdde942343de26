//! Real-time clock and deadlines
//!
//! Scene and video timers advance by the tick delta, which a host may scale
//! or pause. A few waits must not be scaled (the initial buffer delay and the
//! soundtrack start delay), so they are measured against a [`Clock`] instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic real-time source
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary, fixed origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for rehearsals and tests
///
/// Clones share the same time value.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `delta`
    pub fn advance(&self, delta: Duration) {
        self.nanos
            .fetch_add(delta.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute time; never moves backwards
    pub fn set(&self, now: Duration) {
        self.nanos
            .fetch_max(now.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// A point in real time after which something should happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    due: Duration,
}

impl Deadline {
    /// Deadline `delay` after the clock's current time
    pub fn after(clock: &dyn Clock, delay: Duration) -> Self {
        Self {
            due: clock.now() + delay,
        }
    }

    pub fn due(&self) -> Duration {
        self.due
    }

    pub fn is_due(&self, now: Duration) -> bool {
        now >= self.due
    }

    /// Time left until the deadline, zero once it has passed
    pub fn remaining(&self, now: Duration) -> Duration {
        self.due.saturating_sub(now)
    }
}

/// Seconds as a [`Duration`]
///
/// Negative and non-finite values become zero; values too large for a
/// `Duration` saturate to `Duration::MAX`.
pub fn seconds(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}
