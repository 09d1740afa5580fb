//! Moving-average scroll velocity.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Estimates velocity as the displacement within a sliding window divided by
/// the window length.
#[derive(Debug, Clone)]
pub struct VelocityEstimator {
    window: Duration,
    samples: VecDeque<(Instant, f64)>,
}

impl VelocityEstimator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Record a displacement of `px` pixels at `now`.
    pub fn record(&mut self, now: Instant, px: f64) {
        self.samples.push_back((now, px));
        self.prune(now);
    }

    /// Velocity in pixels per second at `now`; positive is towards depth.
    pub fn velocity(&mut self, now: Instant) -> f64 {
        self.prune(now);
        let window = self.window.as_secs_f64();
        if window <= 0.0 {
            return 0.0;
        }
        self.samples.iter().map(|(_, px)| px).sum::<f64>() / window
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&(at, _)) = self.samples.front() {
            if now.saturating_duration_since(at) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_over_window() {
        let start = Instant::now();
        let mut estimator = VelocityEstimator::new(Duration::from_millis(100));
        for i in 0..10 {
            estimator.record(start + Duration::from_millis(10 * i), 20.0);
        }
        // 200 px in 100 ms.
        let v = estimator.velocity(start + Duration::from_millis(95));
        assert!((v - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_decays_to_zero() {
        let start = Instant::now();
        let mut estimator = VelocityEstimator::new(Duration::from_millis(100));
        estimator.record(start, 50.0);
        assert_eq!(estimator.velocity(start + Duration::from_millis(200)), 0.0);
    }

    #[test]
    fn test_direction_sign() {
        let start = Instant::now();
        let mut estimator = VelocityEstimator::new(Duration::from_millis(100));
        estimator.record(start, -30.0);
        assert!(estimator.velocity(start) < 0.0);
    }
}
