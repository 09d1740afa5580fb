//! Frame-batched scroll input.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::config::ScrollConfig;
use super::inertia::Inertia;
use super::velocity::VelocityEstimator;
use crate::coord::DepthRange;
use crate::telemetry::FrameRateMeter;
use crate::timing::DeferredTimer;

/// Below this a batched delta is treated as no movement.
const MIN_APPLY_PX: f64 = 1e-3;

/// Direction of scroll motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    /// Towards shallower depths.
    Up,
    /// Towards deeper depths.
    Down,
}

impl ScrollDirection {
    fn of(velocity: f64) -> Self {
        if velocity < 0.0 {
            ScrollDirection::Up
        } else {
            ScrollDirection::Down
        }
    }
}

/// What the owner should do after a [`ScrollOptimizer::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollAction {
    /// Pan the viewport by this many pixels.
    Apply(f64),
    /// Motion became fast; render at reduced detail.
    EnterFastMotion,
    /// Prefetch data ahead of motion in this direction.
    Prefetch(ScrollDirection),
    /// Motion stopped; restore full detail.
    Settled,
}

/// Turns raw scroll input into at most one viewport update per frame.
///
/// Input deltas arrive at any rate through [`push_delta`](Self::push_delta)
/// and are summed. The owner calls [`tick`](Self::tick) from its event loop;
/// each tick returns what to do now. Time is always passed in, so the
/// optimizer behaves identically under a real clock and in tests.
#[derive(Debug)]
pub struct ScrollOptimizer {
    config: ScrollConfig,
    pending_px: f64,
    last_apply: Option<Instant>,
    velocity: VelocityEstimator,
    inertia: Option<Inertia>,
    settle_timer: DeferredTimer,
    fast_motion: bool,
    prefetch_direction: Option<ScrollDirection>,
    frames: FrameRateMeter,
}

impl Default for ScrollOptimizer {
    fn default() -> Self {
        Self::new(ScrollConfig::default())
    }
}

impl ScrollOptimizer {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            velocity: VelocityEstimator::new(config.velocity_window),
            config,
            pending_px: 0.0,
            last_apply: None,
            inertia: None,
            settle_timer: DeferredTimer::new(),
            fast_motion: false,
            prefetch_direction: None,
            frames: FrameRateMeter::default(),
        }
    }

    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    /// Queue a raw input delta; positive values scroll towards depth.
    ///
    /// New input cancels any inertial scroll in progress.
    pub fn push_delta(&mut self, px: f64, now: Instant) {
        if !px.is_finite() || px == 0.0 {
            return;
        }
        if self.inertia.take().is_some() {
            debug!("Inertial scroll cancelled by new input");
        }
        self.pending_px += px;
        self.velocity.record(now, px);
        self.settle_timer.schedule(now, self.config.quiet_period);
    }

    /// Start inertial scrolling from the current velocity, if fast enough.
    ///
    /// Returns `true` if inertia started.
    pub fn release(&mut self, now: Instant) -> bool {
        let velocity = self.velocity.velocity(now);
        if velocity.abs() < self.config.inertia_min_velocity_px_per_s {
            return false;
        }
        debug!(velocity, "Inertial scroll started");
        self.inertia = Some(Inertia::new(
            velocity,
            self.config.inertia_time_constant,
            self.config.inertia_stop_velocity_px_per_s,
            now,
        ));
        self.settle_timer.schedule(now, self.config.quiet_period);
        true
    }

    /// Stop inertial scrolling and drop pending input.
    pub fn cancel(&mut self) {
        self.inertia = None;
        self.pending_px = 0.0;
    }

    /// Advance to `now` and return the actions due.
    pub fn tick(&mut self, now: Instant) -> Vec<ScrollAction> {
        let mut actions = Vec::new();

        if let Some(inertia) = self.inertia.as_mut() {
            let step = inertia.step(now);
            if step != 0.0 {
                self.pending_px += step;
                self.velocity.record(now, step);
                self.settle_timer.schedule(now, self.config.quiet_period);
            }
            if inertia.is_finished() {
                trace!("Inertial scroll finished");
                self.inertia = None;
            }
        }

        if self.pending_px.abs() >= MIN_APPLY_PX && self.frame_ready(now) {
            actions.push(ScrollAction::Apply(self.pending_px));
            self.pending_px = 0.0;
            self.last_apply = Some(now);
            self.frames.record_frame(now);
        }

        let velocity = self.velocity.velocity(now);
        if velocity.abs() > self.config.fast_velocity_px_per_s {
            if !self.fast_motion {
                self.fast_motion = true;
                debug!(velocity, "Entering fast motion");
                actions.push(ScrollAction::EnterFastMotion);
            }
            let direction = ScrollDirection::of(velocity);
            if self.prefetch_direction != Some(direction) {
                self.prefetch_direction = Some(direction);
                actions.push(ScrollAction::Prefetch(direction));
            }
        }

        if self.inertia.is_none()
            && self.pending_px.abs() < MIN_APPLY_PX
            && self.settle_timer.fire_if_due(now)
        {
            self.fast_motion = false;
            self.prefetch_direction = None;
            self.pending_px = 0.0;
            self.velocity.clear();
            debug!("Scroll settled");
            actions.push(ScrollAction::Settled);
        }

        actions
    }

    fn frame_ready(&self, now: Instant) -> bool {
        match self.last_apply {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.config.frame_interval,
        }
    }

    /// When the owner should tick next, if anything is pending.
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        let frame = if self.inertia.is_some() || self.pending_px.abs() >= MIN_APPLY_PX {
            Some(
                self.last_apply
                    .map(|last| last + self.config.frame_interval)
                    .map_or(now, |deadline| deadline.max(now)),
            )
        } else {
            None
        };
        match (frame, self.settle_timer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Current velocity in pixels per second.
    pub fn current_velocity(&mut self, now: Instant) -> f64 {
        self.velocity.velocity(now)
    }

    pub fn is_fast_motion(&self) -> bool {
        self.fast_motion
    }

    pub fn is_inertia_active(&self) -> bool {
        self.inertia.is_some()
    }

    /// Whether motion is in progress (pending input, inertia, or unsettled).
    pub fn is_moving(&self) -> bool {
        self.inertia.is_some() || self.settle_timer.is_pending()
    }

    /// Applied frames per second.
    pub fn current_fps(&self) -> f64 {
        self.frames.current_fps()
    }

    pub fn applied_frames(&self) -> u64 {
        self.frames.total_frames()
    }

    /// Range to prefetch ahead of `viewport` moving in `direction`.
    ///
    /// During inertia the window reaches at least as far as the fling will
    /// still travel; `px_per_m` converts that distance to depth.
    pub fn prefetch_window(
        &self,
        viewport: &DepthRange,
        direction: ScrollDirection,
        px_per_m: f64,
    ) -> Option<DepthRange> {
        let mut screens = self.config.prefetch_screens;
        if let Some(inertia) = &self.inertia {
            let remaining_m = inertia.remaining_distance().abs() / px_per_m;
            if remaining_m.is_finite() && viewport.span() > 0.0 {
                screens = screens.max(remaining_m / viewport.span());
            }
        }
        prefetch_window(viewport, direction, screens)
    }

    /// Time left until motion counts as settled.
    pub fn settle_remaining(&self, now: Instant) -> Option<Duration> {
        self.settle_timer.remaining(now)
    }
}

/// The `screens × span` range adjacent to `viewport` in `direction`.
///
/// Returns `None` when there is nothing ahead, e.g. moving up at depth zero.
pub fn prefetch_window(
    viewport: &DepthRange,
    direction: ScrollDirection,
    screens: f64,
) -> Option<DepthRange> {
    let ahead = viewport.span() * screens.max(0.0);
    match direction {
        ScrollDirection::Down => DepthRange::new(viewport.bottom(), viewport.bottom() + ahead).ok(),
        ScrollDirection::Up => DepthRange::new((viewport.top() - ahead).max(0.0), viewport.top()).ok(),
    }
}
