//! Depth value types shared by every component.

use std::fmt;

use thiserror::Error;

/// Minimum accepted scale in pixels per meter.
pub const MIN_SCALE_PX_PER_M: f64 = 1e-6;

/// Tolerance used when comparing depths for "no change" detection.
///
/// One micrometre is well below a pixel at any supported zoom.
pub const DEPTH_EPSILON: f64 = 1e-6;

/// Errors reported synchronously at the API boundary.
///
/// Only malformed input is an error. Depths outside the document are clamped
/// by the state manager and never reach this type.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum DepthError {
    /// `top >= bottom`, or one of the values is not finite.
    #[error("Invalid depth range: top {top} must be finite and above bottom {bottom}")]
    InvalidRange { top: f64, bottom: f64 },

    /// A single depth value was NaN or infinite.
    #[error("Invalid depth: {0}")]
    InvalidDepth(f64),

    /// Scale must be finite and positive.
    #[error("Invalid scale: {0} px/m")]
    InvalidScale(f64),

    /// Viewport height must be finite and positive.
    #[error("Invalid viewport height: {0} px")]
    InvalidViewportHeight(f64),

    /// Zoom level must be finite and positive.
    #[error("Invalid zoom level: {0}")]
    InvalidZoom(f64),
}

/// An immutable visible depth window in meters.
///
/// Invariant: both ends are finite and `top < bottom`. Depth grows downwards,
/// so `top` is the shallow end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRange {
    top: f64,
    bottom: f64,
}

impl DepthRange {
    /// Create a new range, rejecting malformed input.
    ///
    /// # Errors
    ///
    /// Returns [`DepthError::InvalidRange`] if either value is non-finite or
    /// `top >= bottom`.
    pub fn new(top: f64, bottom: f64) -> Result<Self, DepthError> {
        if !top.is_finite() || !bottom.is_finite() || top >= bottom {
            return Err(DepthError::InvalidRange { top, bottom });
        }
        Ok(Self { top, bottom })
    }

    /// Build a range from values already known to satisfy the invariant.
    pub(crate) fn new_unchecked(top: f64, bottom: f64) -> Self {
        debug_assert!(top < bottom, "range invariant violated: {top} >= {bottom}");
        Self { top, bottom }
    }

    /// Create a range from two depths given in either order.
    pub fn spanning(a: f64, b: f64) -> Result<Self, DepthError> {
        if a <= b {
            Self::new(a, b)
        } else {
            Self::new(b, a)
        }
    }

    /// Create a range of the given span centered on `center`.
    pub fn centered(center: f64, span: f64) -> Result<Self, DepthError> {
        let half = span * 0.5;
        Self::new(center - half, center + half)
    }

    /// Shallow end of the range.
    pub fn top(&self) -> f64 {
        self.top
    }

    /// Deep end of the range.
    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    /// Length of the range in meters (always positive).
    pub fn span(&self) -> f64 {
        self.bottom - self.top
    }

    /// Midpoint of the range.
    pub fn center(&self) -> f64 {
        (self.top + self.bottom) * 0.5
    }

    /// Whether `depth` lies within `[top, bottom]`.
    pub fn contains(&self, depth: f64) -> bool {
        depth >= self.top && depth <= self.bottom
    }

    /// Whether two ranges share any depth (touching ends do not count).
    pub fn overlaps(&self, other: &DepthRange) -> bool {
        self.top < other.bottom && other.top < self.bottom
    }

    /// Intersection of two ranges, if non-empty.
    pub fn intersection(&self, other: &DepthRange) -> Option<DepthRange> {
        let top = self.top.max(other.top);
        let bottom = self.bottom.min(other.bottom);
        DepthRange::new(top, bottom).ok()
    }

    /// Shift the range by `delta` meters, keeping its span.
    pub fn translated(&self, delta: f64) -> DepthRange {
        DepthRange {
            top: self.top + delta,
            bottom: self.bottom + delta,
        }
    }

    /// Grow the range by `margin` meters on both ends.
    ///
    /// Negative margins are treated as zero.
    pub fn expanded(&self, margin: f64) -> DepthRange {
        let margin = margin.max(0.0);
        DepthRange {
            top: self.top - margin,
            bottom: self.bottom + margin,
        }
    }

    /// Fit the range inside `[0, max_depth]`.
    ///
    /// The span is preserved when it fits; the window is shifted rather than
    /// truncated. A span longer than the document collapses to the whole
    /// document.
    pub fn clamped_to(&self, max_depth: f64) -> DepthRange {
        let span = self.span();
        if span >= max_depth {
            return DepthRange {
                top: 0.0,
                bottom: max_depth,
            };
        }
        let top = self.top.clamp(0.0, max_depth - span);
        DepthRange {
            top,
            bottom: top + span,
        }
    }

    /// Whether both ends match `other` within [`DEPTH_EPSILON`].
    pub fn approx_eq(&self, other: &DepthRange) -> bool {
        (self.top - other.top).abs() < DEPTH_EPSILON
            && (self.bottom - other.bottom).abs() < DEPTH_EPSILON
    }
}

impl fmt::Display for DepthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3} m, {:.3} m]", self.top, self.bottom)
    }
}
