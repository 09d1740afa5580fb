//! Scroll optimizer configuration.

use std::time::Duration;

/// Default frame budget (about 60 FPS).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Default window for the moving-average velocity.
pub const DEFAULT_VELOCITY_WINDOW: Duration = Duration::from_millis(100);

/// Default speed above which motion counts as fast (pixels per second).
pub const DEFAULT_FAST_VELOCITY_PX_PER_S: f64 = 1500.0;

/// Default quiet period after which motion is considered settled.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(100);

/// Default release speed needed to start inertial scrolling (pixels per second).
pub const DEFAULT_INERTIA_MIN_VELOCITY_PX_PER_S: f64 = 100.0;

/// Default speed at which inertial scrolling stops (pixels per second).
pub const DEFAULT_INERTIA_STOP_VELOCITY_PX_PER_S: f64 = 20.0;

/// Default inertia decay time constant.
pub const DEFAULT_INERTIA_TIME_CONSTANT: Duration = Duration::from_millis(325);

/// Default number of viewport heights prefetched ahead of motion.
pub const DEFAULT_PREFETCH_SCREENS: f64 = 1.0;

/// Configuration for [`ScrollOptimizer`](super::ScrollOptimizer).
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollConfig {
    /// At most one batched delta is applied per interval.
    pub frame_interval: Duration,

    /// Deltas within this window contribute to the velocity estimate.
    pub velocity_window: Duration,

    /// Speed above which reduced LOD and prefetch are requested.
    pub fast_velocity_px_per_s: f64,

    /// Time without movement before `Settled` is emitted.
    pub quiet_period: Duration,

    /// Minimum release speed for inertial scrolling.
    pub inertia_min_velocity_px_per_s: f64,

    /// Inertia stops once its speed drops below this.
    pub inertia_stop_velocity_px_per_s: f64,

    /// Exponential decay time constant of inertial scrolling.
    pub inertia_time_constant: Duration,

    /// Viewport heights to prefetch in the direction of motion.
    pub prefetch_screens: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL,
            velocity_window: DEFAULT_VELOCITY_WINDOW,
            fast_velocity_px_per_s: DEFAULT_FAST_VELOCITY_PX_PER_S,
            quiet_period: DEFAULT_QUIET_PERIOD,
            inertia_min_velocity_px_per_s: DEFAULT_INERTIA_MIN_VELOCITY_PX_PER_S,
            inertia_stop_velocity_px_per_s: DEFAULT_INERTIA_STOP_VELOCITY_PX_PER_S,
            inertia_time_constant: DEFAULT_INERTIA_TIME_CONSTANT,
            prefetch_screens: DEFAULT_PREFETCH_SCREENS,
        }
    }
}

impl ScrollConfig {
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_fast_velocity(mut self, px_per_s: f64) -> Self {
        self.fast_velocity_px_per_s = px_per_s;
        self
    }

    pub fn with_quiet_period(mut self, quiet: Duration) -> Self {
        self.quiet_period = quiet;
        self
    }

    pub fn with_prefetch_screens(mut self, screens: f64) -> Self {
        self.prefetch_screens = screens.max(0.0);
        self
    }
}
