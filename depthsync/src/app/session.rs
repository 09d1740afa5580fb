//! One open document and everything that keeps its panes in step.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tracing::{debug, info, trace};

use super::config::EngineConfig;
use crate::cache::{Lod, RenderedSegment, SegmentHandle, ViewportCacheManager};
use crate::coord::{DepthError, DepthRange};
use crate::crosshole::DocumentId;
use crate::scroll::{ScrollAction, ScrollDirection, ScrollOptimizer};
use crate::state::{DepthState, DepthStateManager};
use crate::stream::{DataStreamManager, DepthChunk, SampleSource};
use crate::sync::{
    DepthSynchronizer, PaneEvent, PaneId, ScrollSynchronizer, SelectionSynchronizer,
    SharedManager, SharedPane, Synchronizer,
};
use crate::telemetry::Diagnostics;

/// Width of segments produced by [`render_strip`].
pub const STRIP_WIDTH_PX: u32 = 32;

/// Everything a renderer needs to draw the visible segment.
#[derive(Debug)]
pub struct RenderRequest<'a> {
    pub range: DepthRange,
    pub zoom: f64,
    pub lod: Lod,
    pub viewport_height_px: f64,
    pub chunks: &'a [Arc<DepthChunk>],
}

impl RenderRequest<'_> {
    /// Output rows at this request's LOD; at least one.
    pub fn rows(&self) -> u32 {
        let rows = (self.viewport_height_px / f64::from(self.lod.factor())).ceil();
        if rows.is_finite() && rows >= 1.0 {
            rows as u32
        } else {
            1
        }
    }
}

/// A minimal renderer: one gray strip, darker the more of the range has data.
pub fn render_strip(request: &RenderRequest<'_>) -> RenderedSegment {
    let total = request.chunks.len().max(1);
    let loaded = request.chunks.iter().filter(|c| c.is_loaded()).count();
    let shade = 255 - (loaded * 191 / total) as u8;
    RenderedSegment::filled(
        STRIP_WIDTH_PX,
        request.rows(),
        [shade, shade, shade, 255],
        request.lod,
    )
}

/// What one [`DocumentSession::frame`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    /// Pixels panned this frame.
    pub applied_px: f64,
    pub entered_fast_motion: bool,
    pub settled: bool,
    /// Background chunk loads started.
    pub prefetch_started: usize,
    /// Background chunk loads inserted.
    pub chunks_inserted: usize,
}

/// One open document: its depth state, the synchronizers binding its panes,
/// and the cache, scroll optimizer and data stream serving them.
pub struct DocumentSession {
    id: DocumentId,
    manager: SharedManager,
    scroll_sync: Rc<ScrollSynchronizer>,
    selection_sync: Rc<SelectionSynchronizer>,
    depth_sync: Rc<DepthSynchronizer>,
    cache: ViewportCacheManager,
    optimizer: ScrollOptimizer,
    stream: DataStreamManager,
    /// Pane whose pan input is waiting in the optimizer.
    gesture: Option<PaneId>,
    /// Direction being prefetched while motion is fast.
    ahead: Option<ScrollDirection>,
    /// Viewport the snap boundaries were last taken from.
    snap_viewport: Option<DepthRange>,
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

impl DocumentSession {
    /// Open a document over `source`.
    ///
    /// The document depth comes from the source when it knows it. With a
    /// runtime, chunks around the viewport are prefetched in the background.
    ///
    /// # Errors
    ///
    /// Returns a [`DepthError`] if the state configuration is malformed.
    pub fn open(
        id: DocumentId,
        source: Arc<dyn SampleSource>,
        config: &EngineConfig,
        runtime: Option<Handle>,
    ) -> Result<Self, DepthError> {
        let state_config = config.state_for_document(source.max_depth());
        let manager = Rc::new(RefCell::new(DepthStateManager::new(state_config)?));

        let mut stream = DataStreamManager::new(source, config.stream.clone());
        if let Some(runtime) = runtime {
            stream = stream.with_runtime(runtime);
        }

        let session = Self {
            id,
            scroll_sync: ScrollSynchronizer::new(Rc::clone(&manager)),
            selection_sync: SelectionSynchronizer::new(Rc::clone(&manager)),
            depth_sync: DepthSynchronizer::new(Rc::clone(&manager)),
            manager,
            cache: ViewportCacheManager::new(config.cache.clone()),
            optimizer: ScrollOptimizer::new(config.scroll.clone()),
            stream,
            gesture: None,
            ahead: None,
            snap_viewport: None,
        };
        info!(
            document = %id,
            max_depth = session.manager.borrow().document_max_depth(),
            "Document opened"
        );
        Ok(session)
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The document's state manager, shared with its synchronizers.
    pub fn manager(&self) -> &SharedManager {
        &self.manager
    }

    pub fn state(&self) -> DepthState {
        self.manager.borrow().state()
    }

    pub fn viewport_range(&self) -> DepthRange {
        self.manager.borrow().viewport_range()
    }

    pub fn cache(&self) -> &ViewportCacheManager {
        &self.cache
    }

    pub fn stream(&self) -> &DataStreamManager {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut DataStreamManager {
        &mut self.stream
    }

    pub fn optimizer(&self) -> &ScrollOptimizer {
        &self.optimizer
    }

    fn synchronizers(&self) -> [&dyn Synchronizer; 3] {
        [
            self.scroll_sync.as_ref(),
            self.selection_sync.as_ref(),
            self.depth_sync.as_ref(),
        ]
    }

    // ==================== Panes ====================

    /// Bind a pane to all three synchronizers.
    pub fn bind_pane(&self, id: PaneId, pane: SharedPane) {
        for sync in self.synchronizers() {
            sync.bind_pane(id, Rc::clone(&pane));
        }
        debug!(document = %self.id, pane = %id, "Pane bound");
    }

    /// Unbind a pane. Returns `false` if it was not bound.
    pub fn unbind_pane(&self, id: PaneId) -> bool {
        let mut removed = false;
        for sync in self.synchronizers() {
            removed |= sync.unbind_pane(id);
        }
        removed
    }

    /// Route a raw pane event.
    ///
    /// Wheel and drag pans are queued in the scroll optimizer and reach the
    /// state on the next [`frame`](Self::frame); a release may start inertia.
    /// Zoom, selection and cursor input go straight to their synchronizer.
    ///
    /// Returns `Ok(true)` if the depth state changed now.
    ///
    /// # Errors
    ///
    /// Returns [`DepthError::InvalidDepth`] for a non-finite pan.
    pub fn handle_pane_event(
        &mut self,
        pane: PaneId,
        event: &PaneEvent,
        now: Instant,
    ) -> Result<bool, DepthError> {
        if let Some(px) = self.scroll_sync.pan_delta(event) {
            if !px.is_finite() {
                return Err(DepthError::InvalidDepth(px));
            }
            if px != 0.0 {
                trace!(pane = %pane, kind = event.kind(), px, "Pan queued");
                self.gesture = Some(pane);
                self.optimizer.push_delta(px, now);
            }
            return Ok(false);
        }
        if let PaneEvent::Release = event {
            // Inertia is motion no pane made itself, so every pane follows it.
            self.gesture = None;
            let inertial = self.optimizer.release(now);
            debug!(document = %self.id, pane = %pane, inertial, "Drag released");
            return Ok(false);
        }

        match self.synchronizers().into_iter().find(|s| s.accepts(event)) {
            Some(sync) => {
                trace!(pane = %pane, kind = event.kind(), sync = sync.name(), "Routing pane event");
                sync.handle_pane_event(pane, event)
            }
            None => Ok(false),
        }
    }

    // ==================== Scrolling ====================

    /// Feed a scroll delta (pixels, positive = deeper) that no pane produced,
    /// e.g. a scripted or keyboard scroll. Every pane follows it.
    pub fn scroll_input(&mut self, px: f64, now: Instant) {
        if px.is_finite() {
            self.gesture = None;
            self.optimizer.push_delta(px, now);
        }
    }

    /// End of a scripted gesture; may start inertial scrolling.
    pub fn release(&mut self, now: Instant) -> bool {
        self.gesture = None;
        self.optimizer.release(now)
    }

    /// When [`frame`](Self::frame) should next run, if anything is pending.
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        self.optimizer.next_deadline(now)
    }

    /// Run one frame: apply batched scroll, update LOD and the prefetch
    /// window, and pick up finished background loads.
    ///
    /// Background loads start only on frames that applied no pan, or ahead
    /// of fast motion.
    pub fn frame(&mut self, now: Instant) -> Result<FrameReport, DepthError> {
        let mut report = FrameReport::default();
        let mut panned = false;

        for action in self.optimizer.tick(now) {
            match action {
                ScrollAction::Apply(px) => {
                    self.scroll_sync.apply_pan(self.gesture, px)?;
                    report.applied_px += px;
                    panned = true;
                }
                ScrollAction::EnterFastMotion => {
                    self.cache.set_fast_motion(true);
                    report.entered_fast_motion = true;
                }
                ScrollAction::Prefetch(direction) => self.ahead = Some(direction),
                ScrollAction::Settled => {
                    let dropped = self.cache.on_motion_settled();
                    self.ahead = None;
                    self.gesture = None;
                    report.settled = true;
                    debug!(document = %self.id, dropped, "Motion settled");
                }
            }
        }

        let (viewport, px_per_m) = {
            let manager = self.manager.borrow();
            (manager.viewport_range(), manager.coordinate_system().scale())
        };
        self.stream.update_window(&viewport);
        if let Some(direction) = self.ahead {
            if let Some(ahead) = self.optimizer.prefetch_window(&viewport, direction, px_per_m) {
                self.stream.extend_window(&ahead);
            }
        }
        if !panned || self.ahead.is_some() {
            report.prefetch_started = self.stream.prefetch_idle();
        }
        report.chunks_inserted = self.stream.drain_completed();

        self.refresh_snap_boundaries(&viewport);
        Ok(report)
    }

    fn refresh_snap_boundaries(&mut self, viewport: &DepthRange) {
        if self
            .snap_viewport
            .as_ref()
            .is_some_and(|last| last.approx_eq(viewport))
        {
            return;
        }
        let depths = self.stream.sample_depths(viewport);
        self.manager.borrow_mut().set_snap_boundaries(depths);
        self.snap_viewport = Some(*viewport);
    }

    // ==================== Rendering ====================

    /// The visible segment, from cache or freshly rendered by `render`.
    ///
    /// Visible chunks are loaded synchronously if missing.
    pub fn render_viewport<F>(&mut self, mut render: F) -> SegmentHandle
    where
        F: FnMut(&RenderRequest<'_>) -> RenderedSegment,
    {
        let (range, zoom, height) = {
            let manager = self.manager.borrow();
            (
                manager.viewport_range(),
                manager.zoom_level(),
                manager.coordinate_system().viewport_height_px(),
            )
        };
        let lod = self.cache.lod_for(zoom);
        let chunks = self.stream.get_chunk(&range);
        self.cache.get_or_render(&range, zoom, lod, |range, zoom, lod| {
            render(&RenderRequest {
                range: *range,
                zoom,
                lod,
                viewport_height_px: height,
                chunks: &chunks,
            })
        })
    }

    /// Drop cached renders and chunks overlapping `range` after its data changed.
    pub fn invalidate_range(&mut self, range: &DepthRange) -> usize {
        self.stream.invalidate_range(range);
        self.snap_viewport = None;
        self.cache.invalidate_range(range)
    }

    // ==================== Diagnostics ====================

    pub fn get_cache_hit_rate(&self) -> f64 {
        self.cache.cache_hit_rate()
    }

    /// Bytes held by the viewport cache.
    pub fn get_cache_size(&self) -> usize {
        self.cache.total_bytes()
    }

    /// Applied scroll frames per second over the last second.
    pub fn get_current_fps(&self) -> f64 {
        self.optimizer.current_fps()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let stream = self.stream.stats();
        let base = Diagnostics {
            fps: self.optimizer.current_fps(),
            frames: self.optimizer.applied_frames(),
            loaded_chunks: stream.resident,
            pending_loads: stream.pending,
            chunk_loads: stream.total_loads(),
            unavailable_chunks: stream.unavailable,
            state_revision: self.manager.borrow().revision(),
            ..Diagnostics::default()
        }
        .with_cache(&self.cache.stats());
        self.synchronizers()
            .iter()
            .fold(base, |diag, sync| diag.add_sync(&sync.stats()))
    }

    /// Stop all work for this document: observers are released, pending
    /// loads cancelled and the cache emptied.
    pub fn close(&mut self) {
        self.optimizer.cancel();
        self.stream.shutdown();
        self.cache.clear();
        self.manager.borrow_mut().close();
        info!(document = %self.id, "Document closed");
    }
}
