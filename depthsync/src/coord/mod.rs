//! Depth coordinate module
//!
//! Provides the invertible depth↔pixel transform shared by every pane and the
//! [`DepthRange`] value type for visible windows.
//!
//! Depth is measured in meters and grows downwards; pixel rows grow downwards
//! from the top of the viewport. A pane showing depth `origin_depth` at its
//! first row maps `d` to `(d - origin_depth) * scale`.

mod types;

pub use types::{DepthError, DepthRange, DEPTH_EPSILON, MIN_SCALE_PX_PER_M};

/// Depth↔pixel transform for one viewport.
///
/// The transform is pure: converting does not touch any state. Setters only
/// update this holder's own fields; the derived visible span is recomputed
/// from them on demand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthCoordinateSystem {
    scale_px_per_m: f64,
    origin_depth: f64,
    viewport_height_px: f64,
}

impl DepthCoordinateSystem {
    /// Create a transform.
    ///
    /// # Errors
    ///
    /// Returns an error if `scale_px_per_m` or `viewport_height_px` is not a
    /// finite positive number, or if `origin_depth` is not finite.
    pub fn new(
        scale_px_per_m: f64,
        origin_depth: f64,
        viewport_height_px: f64,
    ) -> Result<Self, DepthError> {
        validate_scale(scale_px_per_m)?;
        validate_height(viewport_height_px)?;
        if !origin_depth.is_finite() {
            return Err(DepthError::InvalidDepth(origin_depth));
        }
        Ok(Self {
            scale_px_per_m,
            origin_depth,
            viewport_height_px,
        })
    }

    /// Build the transform that shows exactly `range` in `viewport_height_px`.
    pub fn fitting(range: &DepthRange, viewport_height_px: f64) -> Result<Self, DepthError> {
        validate_height(viewport_height_px)?;
        Self::new(viewport_height_px / range.span(), range.top(), viewport_height_px)
    }

    /// Convert a depth in meters to a pixel row.
    #[inline]
    pub fn depth_to_pixel(&self, depth: f64) -> f64 {
        (depth - self.origin_depth) * self.scale_px_per_m
    }

    /// Convert a pixel row back to a depth in meters.
    ///
    /// Exact inverse of [`depth_to_pixel`](Self::depth_to_pixel) up to
    /// floating point rounding.
    #[inline]
    pub fn pixel_to_depth(&self, pixel: f64) -> f64 {
        pixel / self.scale_px_per_m + self.origin_depth
    }

    /// Depth distance covered by `pixels` rows.
    #[inline]
    pub fn depth_delta_for_pixels(&self, pixels: f64) -> f64 {
        pixels / self.scale_px_per_m
    }

    /// Scale in pixels per meter.
    pub fn scale(&self) -> f64 {
        self.scale_px_per_m
    }

    /// Depth shown at pixel row zero.
    pub fn origin_depth(&self) -> f64 {
        self.origin_depth
    }

    /// Viewport height in pixels.
    pub fn viewport_height_px(&self) -> f64 {
        self.viewport_height_px
    }

    /// Depth span visible in the viewport, in meters.
    pub fn visible_span(&self) -> f64 {
        self.viewport_height_px / self.scale_px_per_m
    }

    /// The depth window currently visible.
    pub fn visible_range(&self) -> DepthRange {
        // Scale and height are validated positive, so the span is positive.
        let span = self.visible_span().max(DEPTH_EPSILON);
        DepthRange::new_unchecked(self.origin_depth, self.origin_depth + span)
    }

    /// Set the scale, leaving origin and height unchanged.
    pub fn set_scale(&mut self, scale_px_per_m: f64) -> Result<(), DepthError> {
        validate_scale(scale_px_per_m)?;
        self.scale_px_per_m = scale_px_per_m;
        Ok(())
    }

    /// Set the viewport height, leaving scale and origin unchanged.
    pub fn set_viewport_height_px(&mut self, height: f64) -> Result<(), DepthError> {
        validate_height(height)?;
        self.viewport_height_px = height;
        Ok(())
    }

    /// Set the depth shown at pixel row zero.
    pub fn set_origin_depth(&mut self, origin_depth: f64) -> Result<(), DepthError> {
        if !origin_depth.is_finite() {
            return Err(DepthError::InvalidDepth(origin_depth));
        }
        self.origin_depth = origin_depth;
        Ok(())
    }
}

fn validate_scale(scale: f64) -> Result<(), DepthError> {
    if scale.is_finite() && scale >= MIN_SCALE_PX_PER_M {
        Ok(())
    } else {
        Err(DepthError::InvalidScale(scale))
    }
}

fn validate_height(height: f64) -> Result<(), DepthError> {
    if height.is_finite() && height > 0.0 {
        Ok(())
    } else {
        Err(DepthError::InvalidViewportHeight(height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> DepthCoordinateSystem {
        DepthCoordinateSystem::new(10.0, 0.0, 500.0).unwrap()
    }

    #[test]
    fn test_depth_to_pixel_scenario() {
        let coords = scenario();
        assert_eq!(coords.depth_to_pixel(25.0), 250.0);
        assert_eq!(coords.pixel_to_depth(250.0), 25.0);
    }

    #[test]
    fn test_visible_span_follows_scale_and_height() {
        let mut coords = scenario();
        assert_eq!(coords.visible_span(), 50.0);

        coords.set_scale(20.0).unwrap();
        assert_eq!(coords.visible_span(), 25.0);

        coords.set_viewport_height_px(1000.0).unwrap();
        assert_eq!(coords.visible_span(), 50.0);
    }

    #[test]
    fn test_origin_offsets_pixels() {
        let coords = DepthCoordinateSystem::new(20.0, 12.5, 500.0).unwrap();
        assert_eq!(coords.depth_to_pixel(12.5), 0.0);
        assert_eq!(coords.depth_to_pixel(25.0), 250.0);
        let visible = coords.visible_range();
        assert_eq!((visible.top(), visible.bottom()), (12.5, 37.5));
    }

    #[test]
    fn test_invalid_scale_leaves_state_unchanged() {
        let mut coords = scenario();
        assert!(matches!(
            coords.set_scale(0.0),
            Err(DepthError::InvalidScale(_))
        ));
        assert!(coords.set_scale(f64::NAN).is_err());
        assert!(coords.set_viewport_height_px(-1.0).is_err());
        assert_eq!(coords, scenario());
    }

    #[test]
    fn test_fitting_range() {
        let range = DepthRange::new(100.0, 150.0).unwrap();
        let coords = DepthCoordinateSystem::fitting(&range, 500.0).unwrap();
        assert_eq!(coords.scale(), 10.0);
        assert_eq!(coords.depth_to_pixel(150.0), 500.0);
    }

    #[test]
    fn test_depth_delta_for_pixels() {
        let coords = DepthCoordinateSystem::new(20.0, 0.0, 500.0).unwrap();
        assert_eq!(coords.depth_delta_for_pixels(120.0), 6.0);
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_roundtrip_property(
                top in 0.0..5000.0_f64,
                span in 0.5..2000.0_f64,
                height in 50.0..4000.0_f64,
                fraction in 0.0..=1.0_f64,
            ) {
                let range = DepthRange::new(top, top + span)?;
                let coords = DepthCoordinateSystem::fitting(&range, height)?;
                let depth = top + span * fraction;

                let back = coords.pixel_to_depth(coords.depth_to_pixel(depth));
                let tolerance = 1e-6 * depth.abs().max(1.0);
                prop_assert!(
                    (back - depth).abs() <= tolerance,
                    "Roundtrip failed: {} -> {} (diff {})",
                    depth, back, (back - depth).abs()
                );
            }

            #[test]
            fn test_visible_range_maps_to_viewport(
                top in 0.0..5000.0_f64,
                span in 0.5..2000.0_f64,
                height in 50.0..4000.0_f64,
            ) {
                let range = DepthRange::new(top, top + span)?;
                let coords = DepthCoordinateSystem::fitting(&range, height)?;

                prop_assert!(coords.depth_to_pixel(range.top()).abs() < 1e-6);
                prop_assert!((coords.depth_to_pixel(range.bottom()) - height).abs() < 1e-6 * height);
            }
        }
    }
}
