//! High-resolution timer for frame timing.

use std::time::{Duration, Instant};

/// Frame timer tracking total elapsed time and the delta between ticks.
///
/// Call [`tick`](Timer::tick) once at the top of each frame; the returned
/// delta is also cached and readable through
/// [`delta_secs`](Timer::delta_secs) for the rest of the frame.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_frame: Instant,
    delta: Duration,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            delta: Duration::ZERO,
        }
    }

    /// Advance the timer by one frame and return the delta in seconds.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        self.delta = now - self.last_frame;
        self.last_frame = now;
        self.delta.as_secs_f32()
    }

    /// Delta of the most recent tick, in seconds.
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Total elapsed time since the timer was created or reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Total elapsed time in seconds.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_frame = now;
        self.delta = Duration::ZERO;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_caches_the_delta() {
        let mut timer = Timer::new();
        let delta = timer.tick();
        assert!(delta >= 0.0);
        assert_eq!(timer.delta_secs(), delta);
    }

    #[test]
    fn reset_clears_delta_and_elapsed() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(1));
        timer.tick();
        timer.reset();
        assert_eq!(timer.delta_secs(), 0.0);
        assert!(timer.elapsed() < Duration::from_secs(1));
    }
}
