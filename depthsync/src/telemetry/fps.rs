//! Frame-rate measurement.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default window over which the frame rate is averaged.
pub const DEFAULT_FPS_WINDOW: Duration = Duration::from_secs(1);

/// Sliding-window frame-rate meter.
///
/// Frames are recorded with the time they were presented; the rate is the
/// number of frame intervals in the window divided by the time they span.
#[derive(Debug, Clone)]
pub struct FrameRateMeter {
    window: Duration,
    frames: VecDeque<Instant>,
    total_frames: u64,
}

impl Default for FrameRateMeter {
    fn default() -> Self {
        Self::new(DEFAULT_FPS_WINDOW)
    }
}

impl FrameRateMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            frames: VecDeque::new(),
            total_frames: 0,
        }
    }

    /// Record a frame presented at `now`.
    pub fn record_frame(&mut self, now: Instant) {
        self.frames.push_back(now);
        self.total_frames += 1;
        while let Some(&oldest) = self.frames.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.frames.pop_front();
            } else {
                break;
            }
        }
    }

    /// Frames per second over the window, 0.0 with fewer than two frames.
    pub fn current_fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.frames.front(), self.frames.back()) else {
            return 0.0;
        };
        let elapsed = last.saturating_duration_since(*first).as_secs_f64();
        if self.frames.len() < 2 || elapsed <= 0.0 {
            return 0.0;
        }
        (self.frames.len() - 1) as f64 / elapsed
    }

    /// Frames recorded since creation.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn reset(&mut self) {
        self.frames.clear();
    }
}
