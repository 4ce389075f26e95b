//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol timing from system resources. Production endpoints run
//! on real monotonic time; the simulation harness substitutes a virtual
//! clock whose `sleep` merely advances a counter, which makes timeout
//! behavior reproducible down to the tick.

use std::{ops::Sub, time::Duration};

/// Abstract source of time for the ARQ loops.
///
/// # Invariants
///
/// - `now()` MUST never go backwards within one execution context;
///   subsequent calls return instants `>=` earlier ones.
/// - `sleep()` blocks the calling (only) thread of the endpoint; the state
///   machines are never entered while a sleep is in progress.
pub trait Environment: Clone {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; simulation
    /// environments use virtual time.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Blocks for the specified duration.
    fn sleep(&self, duration: Duration);
}
