//! Production Environment implementation on system time.

use std::{thread, time::Duration};

use paperlink_core::Environment;

/// Real-clock environment: `std::time::Instant` plus thread sleeps.
///
/// Timing is non-deterministic here by nature; the simulation harness has
/// a virtual twin of this type for reproducible runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        env.sleep(Duration::from_millis(5));
        let t2 = env.now();

        assert!(t2 > t1, "time should advance across a sleep");
        assert!(t2 - t1 >= Duration::from_millis(5));
    }
}
