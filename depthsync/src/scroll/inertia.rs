//! Exponentially decaying inertial scroll.

use std::time::{Duration, Instant};

/// Inertial motion after a drag release.
///
/// Velocity decays as `v(t) = v0 · e^(−t/τ)`. Each step returns the exact
/// displacement integrated since the previous step, so the total distance does
/// not depend on how often the owner polls.
#[derive(Debug, Clone)]
pub struct Inertia {
    velocity: f64,
    time_constant: f64,
    stop_velocity: f64,
    last_step: Instant,
}

impl Inertia {
    pub fn new(velocity: f64, time_constant: Duration, stop_velocity: f64, now: Instant) -> Self {
        Self {
            velocity,
            time_constant: time_constant.as_secs_f64().max(f64::EPSILON),
            stop_velocity: stop_velocity.abs(),
            last_step: now,
        }
    }

    /// Advance to `now` and return the displacement in pixels.
    pub fn step(&mut self, now: Instant) -> f64 {
        let dt = now.saturating_duration_since(self.last_step).as_secs_f64();
        self.last_step = now;
        if dt <= 0.0 || self.is_finished() {
            return 0.0;
        }
        let decay = (-dt / self.time_constant).exp();
        let displacement = self.velocity * self.time_constant * (1.0 - decay);
        self.velocity *= decay;
        displacement
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn is_finished(&self) -> bool {
        self.velocity.abs() < self.stop_velocity
    }

    /// Distance still to travel if left to run out.
    pub fn remaining_distance(&self) -> f64 {
        if self.is_finished() {
            0.0
        } else {
            self.velocity * self.time_constant
        }
    }
}
