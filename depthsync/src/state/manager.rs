//! Single source of truth for one document's depth state.

use std::rc::Weak;

use tracing::{debug, trace};

use super::config::{StateConfig, WHEEL_UNITS_PER_NOTCH};
use super::events::{
    CursorChanged, CursorObserver, ObserverList, SelectionChanged, SelectionObserver,
    SubscriptionId, ViewportChanged, ViewportObserver, ZoomChanged, ZoomObserver,
};
use crate::coord::{DepthCoordinateSystem, DepthError, DepthRange, DEPTH_EPSILON};
use crate::sync::DebounceToken;

/// Relative tolerance for "zoom unchanged".
const ZOOM_EPSILON: f64 = 1e-9;

/// Point-in-time copy of the manager's state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthState {
    pub viewport: DepthRange,
    pub cursor: f64,
    pub selection: Option<DepthRange>,
    pub zoom: f64,
    pub scale_px_per_m: f64,
    pub revision: u64,
}

#[derive(Default)]
struct Observers {
    viewport: ObserverList<dyn ViewportObserver>,
    cursor: ObserverList<dyn CursorObserver>,
    selection: ObserverList<dyn SelectionObserver>,
    zoom: ObserverList<dyn ZoomObserver>,
}

/// Depth state for one open document: viewport, cursor, selection, zoom.
///
/// Every setter validates its input, clamps it into the document, and emits
/// exactly one notification per changed value. Setting a value equal to the
/// current one (within epsilon) emits nothing.
///
/// Depths outside `[0, document_max_depth]` are clamped, never rejected.
/// Only malformed input (inverted or non-finite) returns an error, and then
/// the state is left untouched.
///
/// # Zoom anchoring
///
/// Zoom changes keep the cursor at the same screen row when the cursor is
/// visible, and keep the viewport center fixed otherwise.
pub struct DepthStateManager {
    config: StateConfig,
    coords: DepthCoordinateSystem,
    viewport: DepthRange,
    cursor: f64,
    selection: Option<DepthRange>,
    zoom: f64,
    snap_boundaries: Vec<f64>,
    revision: u64,
    next_subscription: u64,
    observers: Observers,
}

impl std::fmt::Debug for DepthStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepthStateManager")
            .field("viewport", &self.viewport)
            .field("cursor", &self.cursor)
            .field("selection", &self.selection)
            .field("zoom", &self.zoom)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl DepthStateManager {
    /// Create a manager showing the top of the document at zoom 1.0.
    pub fn new(config: StateConfig) -> Result<Self, DepthError> {
        config.validate()?;

        let base_span = config.viewport_height_px / config.base_scale_px_per_m;
        let viewport = DepthRange::new(0.0, base_span)?.clamped_to(config.document_max_depth);
        let coords = DepthCoordinateSystem::fitting(&viewport, config.viewport_height_px)?;
        let zoom = (coords.scale() / config.base_scale_px_per_m)
            .clamp(config.min_zoom, config.max_zoom);

        Ok(Self {
            config,
            coords,
            viewport,
            cursor: 0.0,
            selection: None,
            zoom,
            snap_boundaries: Vec::new(),
            revision: 0,
            next_subscription: 0,
            observers: Observers::default(),
        })
    }

    // ==================== Queries ====================

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    /// The shared depth↔pixel transform for the current viewport.
    pub fn coordinate_system(&self) -> &DepthCoordinateSystem {
        &self.coords
    }

    pub fn viewport_range(&self) -> DepthRange {
        self.viewport
    }

    pub fn cursor_depth(&self) -> f64 {
        self.cursor
    }

    pub fn selection_range(&self) -> Option<DepthRange> {
        self.selection
    }

    pub fn zoom_level(&self) -> f64 {
        self.zoom
    }

    pub fn document_max_depth(&self) -> f64 {
        self.config.document_max_depth
    }

    /// Number of notifications emitted so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Snapshot of the full state.
    pub fn state(&self) -> DepthState {
        DepthState {
            viewport: self.viewport,
            cursor: self.cursor,
            selection: self.selection,
            zoom: self.zoom,
            scale_px_per_m: self.coords.scale(),
            revision: self.revision,
        }
    }

    // ==================== Viewport ====================

    /// Show `[top, bottom]`.
    ///
    /// # Errors
    ///
    /// [`DepthError::InvalidRange`] if `top >= bottom` or either value is not
    /// finite. The state is unchanged in that case.
    pub fn set_viewport_range(&mut self, top: f64, bottom: f64) -> Result<bool, DepthError> {
        let range = DepthRange::new(top, bottom)?;
        Ok(self.apply_viewport(range, None))
    }

    /// [`set_viewport_range`](Self::set_viewport_range) on behalf of a synchronizer.
    pub fn set_viewport_range_from(
        &mut self,
        top: f64,
        bottom: f64,
        origin: DebounceToken,
    ) -> Result<bool, DepthError> {
        let range = DepthRange::new(top, bottom)?;
        Ok(self.apply_viewport(range, Some(origin)))
    }

    /// Pan by a pixel distance; positive values move towards deeper depths.
    pub fn pan_by_pixels(&mut self, pixels: f64) -> Result<bool, DepthError> {
        self.pan(pixels, None)
    }

    /// [`pan_by_pixels`](Self::pan_by_pixels) on behalf of a synchronizer.
    pub fn pan_by_pixels_from(
        &mut self,
        pixels: f64,
        origin: DebounceToken,
    ) -> Result<bool, DepthError> {
        self.pan(pixels, Some(origin))
    }

    /// Center the viewport on `depth`, keeping the current span.
    pub fn scroll_to_depth(&mut self, depth: f64) -> Result<bool, DepthError> {
        if !depth.is_finite() {
            return Err(DepthError::InvalidDepth(depth));
        }
        let range = DepthRange::centered(depth, self.viewport.span())?;
        Ok(self.apply_viewport(range, None))
    }

    /// Show the whole document, subject to the zoom bounds.
    pub fn fit_document(&mut self) -> bool {
        let range = DepthRange::new_unchecked(0.0, self.config.document_max_depth);
        self.apply_viewport(range, None)
    }

    /// Resize the viewport, keeping the top depth and scale.
    pub fn set_viewport_height_px(&mut self, height: f64) -> Result<bool, DepthError> {
        let mut coords = self.coords;
        coords.set_viewport_height_px(height)?;
        self.config.viewport_height_px = height;
        self.coords = coords;
        let range = DepthRange::new(self.viewport.top(), self.viewport.top() + coords.visible_span())?;
        Ok(self.apply_viewport(range, None))
    }

    fn pan(&mut self, pixels: f64, origin: Option<DebounceToken>) -> Result<bool, DepthError> {
        if !pixels.is_finite() {
            return Err(DepthError::InvalidDepth(pixels));
        }
        if pixels == 0.0 {
            return Ok(false);
        }
        let delta = self.coords.depth_delta_for_pixels(pixels);
        let range = self.viewport.translated(delta);
        Ok(self.apply_viewport(range, origin))
    }

    /// Span limits implied by the zoom bounds.
    fn span_limits(&self) -> (f64, f64) {
        let height = self.config.viewport_height_px;
        let base = self.config.base_scale_px_per_m;
        (
            height / (base * self.config.max_zoom),
            height / (base * self.config.min_zoom),
        )
    }

    fn apply_viewport(&mut self, requested: DepthRange, origin: Option<DebounceToken>) -> bool {
        let (min_span, max_span) = self.span_limits();
        let span = requested.span();
        let range = if span < min_span || span > max_span {
            let span = span.clamp(min_span, max_span);
            DepthRange::new_unchecked(requested.center() - span * 0.5, requested.center() + span * 0.5)
        } else {
            requested
        };
        let range = range.clamped_to(self.config.document_max_depth);

        if range.approx_eq(&self.viewport) {
            trace!(range = %range, "Viewport unchanged");
            return false;
        }

        let scale = self.config.viewport_height_px / range.span();
        let zoom = (scale / self.config.base_scale_px_per_m)
            .clamp(self.config.min_zoom, self.config.max_zoom);

        self.viewport = range;
        // Span is positive and finite, so the fitted transform is always valid.
        if let Ok(coords) = DepthCoordinateSystem::fitting(&range, self.config.viewport_height_px) {
            self.coords = coords;
        }

        if !zoom_eq(zoom, self.zoom) {
            self.zoom = zoom;
            self.emit_zoom(origin);
        }
        self.emit_viewport(origin);
        true
    }

    // ==================== Zoom ====================

    /// Set the zoom multiplier, clamped to the configured bounds.
    ///
    /// The viewport is recomputed around the cursor if it is visible, else
    /// around the viewport center.
    pub fn set_zoom_level(&mut self, zoom: f64) -> Result<bool, DepthError> {
        self.zoom_to(zoom, None)
    }

    /// [`set_zoom_level`](Self::set_zoom_level) on behalf of a synchronizer.
    pub fn set_zoom_level_from(
        &mut self,
        zoom: f64,
        origin: DebounceToken,
    ) -> Result<bool, DepthError> {
        self.zoom_to(zoom, Some(origin))
    }

    fn zoom_to(&mut self, zoom: f64, origin: Option<DebounceToken>) -> Result<bool, DepthError> {
        if !(zoom.is_finite() && zoom > 0.0) {
            return Err(DepthError::InvalidZoom(zoom));
        }
        let zoom = zoom.clamp(self.config.min_zoom, self.config.max_zoom);
        if zoom_eq(zoom, self.zoom) {
            return Ok(false);
        }

        let (anchor, fraction) = if self.viewport.contains(self.cursor) {
            (
                self.cursor,
                (self.cursor - self.viewport.top()) / self.viewport.span(),
            )
        } else {
            (self.viewport.center(), 0.5)
        };

        let span = self.config.viewport_height_px / (self.config.base_scale_px_per_m * zoom);
        let top = anchor - fraction * span;
        let range = DepthRange::new(top, top + span)?;

        debug!(
            zoom,
            anchor,
            range = %range,
            "Zoom level change requested"
        );
        Ok(self.apply_viewport(range, origin))
    }

    /// Handle a raw wheel event.
    ///
    /// With Ctrl held the zoom is multiplied by `wheel_zoom_step` per notch
    /// (positive deltas zoom in). Otherwise the view pans by the delta in
    /// pixels; positive deltas move towards deeper depths.
    pub fn handle_wheel_event(&mut self, delta: f64, ctrl_pressed: bool) -> Result<bool, DepthError> {
        self.wheel(delta, ctrl_pressed, None)
    }

    /// [`handle_wheel_event`](Self::handle_wheel_event) on behalf of a synchronizer.
    pub fn handle_wheel_event_from(
        &mut self,
        delta: f64,
        ctrl_pressed: bool,
        origin: DebounceToken,
    ) -> Result<bool, DepthError> {
        self.wheel(delta, ctrl_pressed, Some(origin))
    }

    fn wheel(
        &mut self,
        delta: f64,
        ctrl_pressed: bool,
        origin: Option<DebounceToken>,
    ) -> Result<bool, DepthError> {
        if !delta.is_finite() {
            return Err(DepthError::InvalidDepth(delta));
        }
        if delta == 0.0 {
            return Ok(false);
        }
        if ctrl_pressed {
            let factor = self
                .config
                .wheel_zoom_step
                .powf(delta / WHEEL_UNITS_PER_NOTCH);
            self.zoom_to(self.zoom * factor, origin)
        } else {
            self.pan(delta * self.config.wheel_pan_px_per_unit, origin)
        }
    }

    // ==================== Cursor ====================

    /// Move the cursor, optionally snapping to the nearest boundary.
    pub fn set_cursor_depth(&mut self, depth: f64, snap: bool) -> Result<bool, DepthError> {
        self.move_cursor(depth, snap, None)
    }

    /// [`set_cursor_depth`](Self::set_cursor_depth) on behalf of a synchronizer.
    pub fn set_cursor_depth_from(
        &mut self,
        depth: f64,
        snap: bool,
        origin: DebounceToken,
    ) -> Result<bool, DepthError> {
        self.move_cursor(depth, snap, Some(origin))
    }

    /// Replace the depths the cursor snaps to, typically sample depths.
    ///
    /// Non-finite values are dropped; the rest are sorted and deduplicated.
    pub fn set_snap_boundaries(&mut self, boundaries: impl IntoIterator<Item = f64>) {
        let mut boundaries: Vec<f64> = boundaries.into_iter().filter(|d| d.is_finite()).collect();
        boundaries.sort_by(f64::total_cmp);
        boundaries.dedup_by(|a, b| (*a - *b).abs() < DEPTH_EPSILON);
        self.snap_boundaries = boundaries;
    }

    fn move_cursor(
        &mut self,
        depth: f64,
        snap: bool,
        origin: Option<DebounceToken>,
    ) -> Result<bool, DepthError> {
        if !depth.is_finite() {
            return Err(DepthError::InvalidDepth(depth));
        }
        let max = self.config.document_max_depth;
        let mut depth = depth.clamp(0.0, max);
        if snap {
            depth = self.snap_depth(depth).clamp(0.0, max);
        }
        if (depth - self.cursor).abs() < DEPTH_EPSILON {
            return Ok(false);
        }
        self.cursor = depth;
        self.emit_cursor(origin);
        Ok(true)
    }

    /// Nearest boundary within tolerance, or `depth` unchanged.
    pub fn snap_depth(&self, depth: f64) -> f64 {
        let tolerance = self.config.snap_tolerance_m;

        if !self.snap_boundaries.is_empty() {
            let idx = self.snap_boundaries.partition_point(|b| *b < depth);
            let below = idx.checked_sub(1).map(|i| self.snap_boundaries[i]);
            let above = self.snap_boundaries.get(idx).copied();
            let nearest = match (below, above) {
                (Some(b), Some(a)) => {
                    if depth - b <= a - depth {
                        b
                    } else {
                        a
                    }
                }
                (Some(b), None) => b,
                (None, Some(a)) => a,
                (None, None) => depth,
            };
            return if (nearest - depth).abs() <= tolerance {
                nearest
            } else {
                depth
            };
        }

        let unit = self.config.snap_unit_m;
        if unit > 0.0 {
            let rounded = (depth / unit).round() * unit;
            if (rounded - depth).abs() <= tolerance {
                return rounded;
            }
        }
        depth
    }

    // ==================== Selection ====================

    /// Set or clear the selection; independent of the viewport.
    pub fn set_selection_range(&mut self, selection: Option<DepthRange>) -> bool {
        self.apply_selection(selection, None)
    }

    /// [`set_selection_range`](Self::set_selection_range) on behalf of a synchronizer.
    pub fn set_selection_range_from(
        &mut self,
        selection: Option<DepthRange>,
        origin: DebounceToken,
    ) -> bool {
        self.apply_selection(selection, Some(origin))
    }

    /// Select between two depths given in either order.
    pub fn select_depths(&mut self, a: f64, b: f64) -> Result<bool, DepthError> {
        let range = DepthRange::spanning(a, b)?;
        Ok(self.apply_selection(Some(range), None))
    }

    fn apply_selection(&mut self, selection: Option<DepthRange>, origin: Option<DebounceToken>) -> bool {
        let max = self.config.document_max_depth;
        let clamped = selection.and_then(|range| {
            DepthRange::new(range.top().max(0.0), range.bottom().min(max)).ok()
        });

        let unchanged = match (clamped, self.selection) {
            (None, None) => true,
            (Some(a), Some(b)) => a.approx_eq(&b),
            _ => false,
        };
        if unchanged {
            return false;
        }
        self.selection = clamped;
        self.emit_selection(origin);
        true
    }

    // ==================== Subscriptions ====================

    /// Subscribe to viewport changes. The observer is held weakly.
    pub fn subscribe_viewport(&mut self, observer: Weak<dyn ViewportObserver>) -> SubscriptionId {
        let id = self.next_id();
        self.observers.viewport.add(id, observer);
        id
    }

    /// Subscribe to cursor changes. The observer is held weakly.
    pub fn subscribe_cursor(&mut self, observer: Weak<dyn CursorObserver>) -> SubscriptionId {
        let id = self.next_id();
        self.observers.cursor.add(id, observer);
        id
    }

    /// Subscribe to selection changes. The observer is held weakly.
    pub fn subscribe_selection(&mut self, observer: Weak<dyn SelectionObserver>) -> SubscriptionId {
        let id = self.next_id();
        self.observers.selection.add(id, observer);
        id
    }

    /// Subscribe to zoom changes. The observer is held weakly.
    pub fn subscribe_zoom(&mut self, observer: Weak<dyn ZoomObserver>) -> SubscriptionId {
        let id = self.next_id();
        self.observers.zoom.add(id, observer);
        id
    }

    /// Remove a subscription of any kind.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        // Evaluate all four so an id is removed wherever it appears.
        let removed = [
            self.observers.viewport.remove(id),
            self.observers.cursor.remove(id),
            self.observers.selection.remove(id),
            self.observers.zoom.remove(id),
        ];
        removed.iter().any(|r| *r)
    }

    /// Number of live subscriptions across all kinds.
    pub fn subscriber_count(&self) -> usize {
        self.observers.viewport.len()
            + self.observers.cursor.len()
            + self.observers.selection.len()
            + self.observers.zoom.len()
    }

    /// Drop every subscription; called when the document closes.
    pub fn close(&mut self) {
        debug!(
            subscribers = self.subscriber_count(),
            "Closing depth state manager"
        );
        self.observers.viewport.clear();
        self.observers.cursor.clear();
        self.observers.selection.clear();
        self.observers.zoom.clear();
    }

    fn next_id(&mut self) -> SubscriptionId {
        self.next_subscription += 1;
        SubscriptionId(self.next_subscription)
    }

    // ==================== Emission ====================

    fn emit_viewport(&mut self, origin: Option<DebounceToken>) {
        self.revision += 1;
        let event = ViewportChanged {
            range: self.viewport,
            scale_px_per_m: self.coords.scale(),
            revision: self.revision,
            origin,
        };
        debug!(range = %event.range, revision = event.revision, "Viewport changed");
        for observer in self.observers.viewport.live() {
            observer.on_viewport_changed(&event);
        }
    }

    fn emit_cursor(&mut self, origin: Option<DebounceToken>) {
        self.revision += 1;
        let event = CursorChanged {
            depth: self.cursor,
            revision: self.revision,
            origin,
        };
        debug!(depth = event.depth, revision = event.revision, "Cursor changed");
        for observer in self.observers.cursor.live() {
            observer.on_cursor_changed(&event);
        }
    }

    fn emit_selection(&mut self, origin: Option<DebounceToken>) {
        self.revision += 1;
        let event = SelectionChanged {
            selection: self.selection,
            revision: self.revision,
            origin,
        };
        debug!(selection = ?event.selection, revision = event.revision, "Selection changed");
        for observer in self.observers.selection.live() {
            observer.on_selection_changed(&event);
        }
    }

    fn emit_zoom(&mut self, origin: Option<DebounceToken>) {
        self.revision += 1;
        let event = ZoomChanged {
            zoom: self.zoom,
            scale_px_per_m: self.coords.scale(),
            revision: self.revision,
            origin,
        };
        debug!(zoom = event.zoom, revision = event.revision, "Zoom changed");
        for observer in self.observers.zoom.live() {
            observer.on_zoom_changed(&event);
        }
    }
}

fn zoom_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= ZOOM_EPSILON * a.abs().max(b.abs()).max(1.0)
}
