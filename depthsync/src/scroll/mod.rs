//! Scroll input optimization.
//!
//! Wheel and trackpad input can arrive far faster than the display refreshes.
//! [`ScrollOptimizer`] sums raw deltas and releases them at most once per
//! frame, tracks velocity to switch rendering to reduced detail during fast
//! motion, asks for data ahead of the motion, reports when motion settles,
//! and synthesizes inertial scroll after a drag is released.

mod config;
mod inertia;
mod optimizer;
mod velocity;

pub use config::{
    ScrollConfig, DEFAULT_FAST_VELOCITY_PX_PER_S, DEFAULT_FRAME_INTERVAL,
    DEFAULT_INERTIA_MIN_VELOCITY_PX_PER_S, DEFAULT_INERTIA_STOP_VELOCITY_PX_PER_S,
    DEFAULT_INERTIA_TIME_CONSTANT, DEFAULT_PREFETCH_SCREENS, DEFAULT_QUIET_PERIOD,
    DEFAULT_VELOCITY_WINDOW,
};
pub use inertia::Inertia;
pub use optimizer::{prefetch_window, ScrollAction, ScrollDirection, ScrollOptimizer};
pub use velocity::VelocityEstimator;
