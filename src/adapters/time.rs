//! Host monotonic clock.

use std::time::Instant;

use crate::app::ports::TimePort;

/// Seconds since construction, from [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    start: Instant,
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl TimePort for HostClock {
    fn timestamp_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}
