//! Frame timing.
//!
//! [`Timer`] yields the delta fed to camera and object updates, and
//! [`FpsCounter`] averages those deltas for the window title.

use std::time::{Duration, Instant};

/// Measures total run time and per-frame delta.
#[derive(Debug)]
pub struct Timer {
    /// Creation or last reset.
    start: Instant,
    /// Previous `tick`, or `start` before the first one.
    last_tick: Instant,
}

impl Timer {
    /// Starts both clocks now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Total time since the timer was created or reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time since the previous `tick`, and restart the delta window.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }

    /// Restarts both clocks, so the next `tick` excludes setup time.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Averages frame times over a fixed reporting window.
#[derive(Debug)]
pub struct FpsCounter {
    /// Reporting period.
    window: Duration,
    /// Frame time summed since the last report.
    accumulated: Duration,
    frames: u32,
}

impl FpsCounter {
    /// Reports once per `window` of accumulated frame time.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            accumulated: Duration::ZERO,
            frames: 0,
        }
    }

    /// Record one frame. Returns the average FPS once per elapsed window.
    pub fn record(&mut self, frame_time: Duration) -> Option<f32> {
        self.accumulated += frame_time;
        self.frames += 1;

        if self.accumulated < self.window {
            return None;
        }

        let fps = self.frames as f32 / self.accumulated.as_secs_f32();
        self.accumulated = Duration::ZERO;
        self.frames = 0;
        Some(fps)
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_restarts_delta_window() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(2));
        let first = timer.tick();
        let second = timer.tick();
        assert!(first >= Duration::from_millis(2));
        assert!(second < first);
    }

    #[test]
    fn test_elapsed_survives_ticks() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(2));
        timer.tick();
        assert!(timer.elapsed() >= Duration::from_millis(2));
    }

    #[test]
    fn test_fps_counter_reports_once_per_window() {
        let mut counter = FpsCounter::new(Duration::from_millis(100));
        let frame = Duration::from_millis(10);

        for _ in 0..9 {
            assert!(counter.record(frame).is_none());
        }
        let fps = counter.record(frame).unwrap();
        assert!((fps - 100.0).abs() < 0.5);

        // Window was reset.
        assert!(counter.record(frame).is_none());
    }
}
