//! Wall-clock to scheduler time conversion.
//!
//! The scheduler runs in logical milliseconds. Hosts translate wall-clock
//! time into that domain with a [`SystemClock`] and feed it to
//! [`PadSurface::advance_to`](crate::surface::PadSurface::advance_to).

use std::time::{Duration, Instant};

/// Milliseconds on the scheduler timeline.
pub type Millis = u64;

/// Monotonic clock anchored at its creation instant.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// Create a clock whose zero is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Create a clock with an explicit origin.
    pub fn with_origin(origin: Instant) -> Self {
        Self { origin }
    }

    /// Milliseconds elapsed since the origin.
    pub fn now_ms(&self) -> Millis {
        self.millis_at(Instant::now())
    }

    /// Milliseconds between the origin and `instant` (0 if before the origin).
    pub fn millis_at(&self, instant: Instant) -> Millis {
        instant
            .saturating_duration_since(self.origin)
            .as_millis()
            .min(u128::from(u64::MAX)) as Millis
    }

    /// Wall-clock time left until `deadline`, zero if it already passed.
    pub fn until(&self, deadline: Millis) -> Duration {
        Duration::from_millis(deadline.saturating_sub(self.now_ms()))
    }
}
