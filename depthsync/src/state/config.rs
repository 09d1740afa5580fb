//! Configuration for the depth state manager.

use crate::coord::DepthError;

/// Default document depth when none is known yet (meters).
pub const DEFAULT_DOCUMENT_MAX_DEPTH: f64 = 1000.0;

/// Default viewport height (pixels).
pub const DEFAULT_VIEWPORT_HEIGHT_PX: f64 = 600.0;

/// Default base scale at zoom 1.0 (pixels per meter).
pub const DEFAULT_BASE_SCALE_PX_PER_M: f64 = 10.0;

/// Default zoom bounds.
pub const DEFAULT_MIN_ZOOM: f64 = 0.01;
pub const DEFAULT_MAX_ZOOM: f64 = 100.0;

/// Default multiplicative zoom step for one wheel notch (120 units).
pub const DEFAULT_WHEEL_ZOOM_STEP: f64 = 1.2;

/// Wheel units per notch, as reported by common platforms.
pub const WHEEL_UNITS_PER_NOTCH: f64 = 120.0;

/// Default cursor snap tolerance (meters).
pub const DEFAULT_SNAP_TOLERANCE_M: f64 = 0.5;

/// Default unit boundary used for snapping when no sample depths are known.
pub const DEFAULT_SNAP_UNIT_M: f64 = 0.1;

/// Configuration for one document's [`DepthStateManager`](super::DepthStateManager).
#[derive(Debug, Clone, PartialEq)]
pub struct StateConfig {
    /// Deepest depth in the document; all ranges stay within `[0, max]`.
    pub document_max_depth: f64,

    /// Viewport height shared by the bound panes, in pixels.
    pub viewport_height_px: f64,

    /// Scale at zoom 1.0, in pixels per meter.
    pub base_scale_px_per_m: f64,

    /// Smallest zoom multiplier.
    pub min_zoom: f64,

    /// Largest zoom multiplier.
    pub max_zoom: f64,

    /// Zoom factor applied per wheel notch while Ctrl is held.
    pub wheel_zoom_step: f64,

    /// Pixels panned per wheel unit.
    pub wheel_pan_px_per_unit: f64,

    /// Maximum distance a cursor is moved by snapping.
    pub snap_tolerance_m: f64,

    /// Boundary spacing used for snapping when no sample depths are set.
    ///
    /// Zero disables unit snapping.
    pub snap_unit_m: f64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            document_max_depth: DEFAULT_DOCUMENT_MAX_DEPTH,
            viewport_height_px: DEFAULT_VIEWPORT_HEIGHT_PX,
            base_scale_px_per_m: DEFAULT_BASE_SCALE_PX_PER_M,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            wheel_zoom_step: DEFAULT_WHEEL_ZOOM_STEP,
            wheel_pan_px_per_unit: 1.0,
            snap_tolerance_m: DEFAULT_SNAP_TOLERANCE_M,
            snap_unit_m: DEFAULT_SNAP_UNIT_M,
        }
    }
}

impl StateConfig {
    /// Create a configuration for a document of the given depth.
    pub fn new(document_max_depth: f64) -> Self {
        Self {
            document_max_depth,
            ..Default::default()
        }
    }

    /// Set the viewport height.
    pub fn with_viewport_height_px(mut self, height: f64) -> Self {
        self.viewport_height_px = height;
        self
    }

    /// Set the base scale.
    pub fn with_base_scale(mut self, scale_px_per_m: f64) -> Self {
        self.base_scale_px_per_m = scale_px_per_m;
        self
    }

    /// Set the zoom bounds; the pair is normalized so `min <= max`.
    pub fn with_zoom_limits(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        let (min_zoom, max_zoom) = if min_zoom <= max_zoom {
            (min_zoom, max_zoom)
        } else {
            (max_zoom, min_zoom)
        };
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    /// Set the wheel zoom step.
    pub fn with_wheel_zoom_step(mut self, step: f64) -> Self {
        self.wheel_zoom_step = step;
        self
    }

    /// Set the snapping tolerance and unit.
    pub fn with_snapping(mut self, tolerance_m: f64, unit_m: f64) -> Self {
        self.snap_tolerance_m = tolerance_m;
        self.snap_unit_m = unit_m;
        self
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), DepthError> {
        if !(self.document_max_depth.is_finite() && self.document_max_depth > 0.0) {
            return Err(DepthError::InvalidDepth(self.document_max_depth));
        }
        if !(self.viewport_height_px.is_finite() && self.viewport_height_px > 0.0) {
            return Err(DepthError::InvalidViewportHeight(self.viewport_height_px));
        }
        if !(self.base_scale_px_per_m.is_finite() && self.base_scale_px_per_m > 0.0) {
            return Err(DepthError::InvalidScale(self.base_scale_px_per_m));
        }
        for zoom in [self.min_zoom, self.max_zoom] {
            if !(zoom.is_finite() && zoom > 0.0) {
                return Err(DepthError::InvalidZoom(zoom));
            }
        }
        if self.min_zoom > self.max_zoom {
            return Err(DepthError::InvalidZoom(self.min_zoom));
        }
        Ok(())
    }
}
