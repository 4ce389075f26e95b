//! Virtual clock environment for deterministic tests.

use std::{
    ops::Sub,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use paperlink_core::Environment;

/// An instant on the simulated clock.
///
/// Plain nanoseconds since simulation start; ordering and subtraction work
/// exactly like `std::time::Instant` without ever touching the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SimInstant(Duration);

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        // Monotonicity is an Environment invariant; saturate rather than
        // panic if a test constructs instants out of order.
        self.0.saturating_sub(rhs.0)
    }
}

/// Simulated environment: time advances only when someone sleeps or the
/// test calls [`SimEnv::advance`].
///
/// Clones share the same clock, so a sender and receiver driven side by
/// side observe a single consistent timeline.
#[derive(Debug, Clone, Default)]
pub struct SimEnv {
    clock_nanos: Arc<AtomicU64>,
}

impl SimEnv {
    /// New environment with the clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the shared clock.
    pub fn advance(&self, duration: Duration) {
        self.clock_nanos.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Nanoseconds elapsed since simulation start.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.clock_nanos.load(Ordering::Relaxed))
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> Self::Instant {
        SimInstant(self.elapsed())
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
