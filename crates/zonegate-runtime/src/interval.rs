use std::time::Duration;

/// Accumulates elapsed tick time and reports when a fixed interval has passed.
///
/// The timer is driven by the caller's update loop rather than a clock so that
/// it stays deterministic under test and pauses whenever the loop does.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval: Duration,
    elapsed: Duration,
}

impl IntervalTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Adds `delta` and returns `true` once the interval has been reached.
    ///
    /// The accumulator restarts from zero after firing; any overshoot is
    /// dropped, so a long stall fires once rather than catching up.
    pub fn update(&mut self, delta: Duration) -> bool {
        self.elapsed = self.elapsed.saturating_add(delta);
        if self.elapsed < self.interval {
            return false;
        }
        self.elapsed = Duration::ZERO;
        true
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }
}
