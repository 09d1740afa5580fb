//! Pane synchronizers.
//!
//! A synchronizer binds N panes to one [`DepthStateManager`]. Pane input is
//! translated into a manager setter stamped with a fresh [`DebounceToken`];
//! the manager's single notification is then pushed into every pane except
//! the one the input came from. Pane events that arrive while a token is in
//! flight are echoes of that propagation and are dropped.
//!
//! The manager stays mutably borrowed for the whole of an emission, so a
//! signal can never re-enter the propagation that caused it; an echo is
//! stopped at [`forward`](SyncCore::forward) before it reaches the manager.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use super::pane::{DepthPane, PaneEvent, PaneId};
use super::token::{DebounceToken, TokenIssuer};
use crate::coord::{DepthError, DepthRange};
use crate::state::{
    CursorChanged, CursorObserver, DepthStateManager, SelectionChanged, SelectionObserver,
    SubscriptionId, ViewportChanged, ViewportObserver, ZoomChanged, ZoomObserver,
};

/// State manager shared by a document's synchronizers.
pub type SharedManager = Rc<RefCell<DepthStateManager>>;

/// A pane handle shared between the UI and its synchronizers.
pub type SharedPane = Rc<RefCell<dyn DepthPane>>;

/// Propagation counters for one synchronizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Pane events forwarded to the manager.
    pub forwarded: u64,
    /// Updates pushed into panes.
    pub propagated: u64,
    /// Pane events dropped as echoes of an in-flight propagation.
    pub dropped_echoes: u64,
}

/// Common interface of the three synchronizers.
pub trait Synchronizer {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Attach a pane and bring it up to date with the current state.
    fn bind_pane(&self, id: PaneId, pane: SharedPane);

    /// Detach a pane. Returns `false` if it was not bound.
    fn unbind_pane(&self, id: PaneId) -> bool;

    /// Whether this synchronizer handles `event`.
    fn accepts(&self, event: &PaneEvent) -> bool;

    /// Translate a pane event into a manager call.
    ///
    /// Returns `Ok(true)` if the manager state changed. Events this
    /// synchronizer does not handle, and echoes, return `Ok(false)`.
    fn handle_pane_event(&self, pane: PaneId, event: &PaneEvent) -> Result<bool, DepthError>;

    fn stats(&self) -> SyncStats;
}

struct SyncCore {
    name: &'static str,
    manager: SharedManager,
    panes: RefCell<Vec<(PaneId, SharedPane)>>,
    issuer: TokenIssuer,
    in_flight: Cell<Option<DebounceToken>>,
    stats: Cell<SyncStats>,
    subscriptions: RefCell<Vec<SubscriptionId>>,
}

impl SyncCore {
    fn new(name: &'static str, manager: SharedManager) -> Self {
        Self {
            name,
            manager,
            panes: RefCell::new(Vec::new()),
            issuer: TokenIssuer::new(),
            in_flight: Cell::new(None),
            stats: Cell::new(SyncStats::default()),
            subscriptions: RefCell::new(Vec::new()),
        }
    }

    fn update_stats(&self, f: impl FnOnce(&mut SyncStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    fn bind(&self, id: PaneId, pane: SharedPane, init: impl FnOnce(&DepthStateManager, &mut dyn DepthPane)) {
        {
            let mut panes = self.panes.borrow_mut();
            panes.retain(|(existing, _)| *existing != id);
            panes.push((id, Rc::clone(&pane)));
        }
        debug!(synchronizer = self.name, pane = %id, "Pane bound");

        // Skipped if the manager is mid-emission; the next change catches up.
        if let (Ok(manager), Ok(mut pane)) = (self.manager.try_borrow(), pane.try_borrow_mut()) {
            init(&manager, &mut *pane);
        }
    }

    fn unbind(&self, id: PaneId) -> bool {
        let mut panes = self.panes.borrow_mut();
        let before = panes.len();
        panes.retain(|(existing, _)| *existing != id);
        let removed = panes.len() != before;
        if removed {
            debug!(synchronizer = self.name, pane = %id, "Pane unbound");
        }
        removed
    }

    fn drop_echo(&self, pane: Option<PaneId>, kind: &'static str) {
        self.update_stats(|s| s.dropped_echoes += 1);
        trace!(
            synchronizer = self.name,
            pane = ?pane,
            kind,
            "Dropped echo during propagation"
        );
    }

    /// Run `apply` against the manager under a fresh token.
    ///
    /// `pane` is the pane whose input started the operation; `None` for
    /// motion no pane produced itself, which then reaches every pane.
    fn forward(
        &self,
        pane: Option<PaneId>,
        kind: &'static str,
        apply: impl FnOnce(&mut DepthStateManager, DebounceToken) -> Result<bool, DepthError>,
    ) -> Result<bool, DepthError> {
        if self.in_flight.get().is_some() {
            self.drop_echo(pane, kind);
            return Ok(false);
        }
        // Another synchronizer of the same document is emitting; this event
        // is an echo of its propagation.
        let Ok(mut manager) = self.manager.try_borrow_mut() else {
            self.drop_echo(pane, kind);
            return Ok(false);
        };

        let token = self.issuer.issue(pane);
        self.in_flight.set(Some(token));
        let result = apply(&mut manager, token);
        self.in_flight.set(None);

        self.update_stats(|s| s.forwarded += 1);
        debug!(
            synchronizer = self.name,
            pane = ?pane,
            kind,
            token = %token,
            changed = ?result,
            "Forwarded pane event"
        );
        result
    }

    /// Push a manager signal into every pane except the originating one.
    ///
    /// Only tokens this synchronizer issued name a pane to skip; a change
    /// stamped by anyone else reaches every pane.
    fn propagate(&self, origin: Option<DebounceToken>, mut apply: impl FnMut(&mut dyn DepthPane)) {
        let skip = origin
            .filter(|token| token.is_from(self.issuer.id()))
            .and_then(|token| token.origin());
        let targets: Vec<(PaneId, SharedPane)> = self
            .panes
            .borrow()
            .iter()
            .filter(|(id, _)| Some(*id) != skip)
            .map(|(id, pane)| (*id, Rc::clone(pane)))
            .collect();

        let mut pushed = 0;
        for (id, pane) in targets {
            match pane.try_borrow_mut() {
                Ok(mut pane) => {
                    apply(&mut *pane);
                    pushed += 1;
                }
                Err(_) => {
                    trace!(synchronizer = self.name, pane = %id, "Pane busy, update skipped");
                }
            }
        }
        self.update_stats(|s| s.propagated += pushed);
    }

    fn remember(&self, id: SubscriptionId) {
        self.subscriptions.borrow_mut().push(id);
    }
}

impl Drop for SyncCore {
    fn drop(&mut self) {
        if let Ok(mut manager) = self.manager.try_borrow_mut() {
            for id in self.subscriptions.get_mut().drain(..) {
                manager.unsubscribe(id);
            }
        }
    }
}

// ==================== Scroll ====================

/// Keeps the viewport and zoom of all panes in step.
///
/// Handles wheel input (Ctrl zooms) and unmodified drags (pan).
/// [`handle_pane_event`](Synchronizer::handle_pane_event) pans at once. A
/// session with a frame loop instead takes the pan through
/// [`pan_delta`](Self::pan_delta), batches it, and hands the result back
/// through [`apply_pan`](Self::apply_pan).
pub struct ScrollSynchronizer {
    core: SyncCore,
}

impl ScrollSynchronizer {
    pub fn new(manager: SharedManager) -> Rc<Self> {
        let sync = Rc::new(Self {
            core: SyncCore::new("scroll", Rc::clone(&manager)),
        });
        let mut state = manager.borrow_mut();
        let viewport = state.subscribe_viewport(Rc::downgrade(&sync) as Weak<dyn ViewportObserver>);
        let zoom = state.subscribe_zoom(Rc::downgrade(&sync) as Weak<dyn ZoomObserver>);
        sync.core.remember(viewport);
        sync.core.remember(zoom);
        drop(state);
        sync
    }

    /// Pixels a pane event would pan by, positive towards depth.
    ///
    /// `None` for events that do not pan: Ctrl+wheel zooms, Shift+drag
    /// selects, and clicks and releases carry no motion.
    pub fn pan_delta(&self, event: &PaneEvent) -> Option<f64> {
        match *event {
            PaneEvent::Wheel { delta, modifiers } if !modifiers.ctrl => {
                let per_unit = self.core.manager.try_borrow().ok()?.config().wheel_pan_px_per_unit;
                Some(delta * per_unit)
            }
            PaneEvent::Drag {
                start_px,
                end_px,
                modifiers,
            } if !modifiers.shift => Some(start_px - end_px),
            _ => None,
        }
    }

    /// Pan by a batched pixel delta on behalf of `origin`.
    ///
    /// The originating pane already shows its own input and is skipped;
    /// with no origin every pane follows.
    pub fn apply_pan(&self, origin: Option<PaneId>, px: f64) -> Result<bool, DepthError> {
        self.core
            .forward(origin, "pan", |m, token| m.pan_by_pixels_from(px, token))
    }
}

impl Synchronizer for ScrollSynchronizer {
    fn name(&self) -> &'static str {
        self.core.name
    }

    fn bind_pane(&self, id: PaneId, pane: SharedPane) {
        self.core.bind(id, pane, |manager, pane| {
            pane.apply_zoom(manager.zoom_level());
            pane.apply_viewport(manager.viewport_range());
        });
    }

    fn unbind_pane(&self, id: PaneId) -> bool {
        self.core.unbind(id)
    }

    fn accepts(&self, event: &PaneEvent) -> bool {
        match event {
            PaneEvent::Wheel { .. } => true,
            PaneEvent::Drag { modifiers, .. } => !modifiers.shift,
            PaneEvent::Release => true,
            PaneEvent::Click { .. } => false,
        }
    }

    fn handle_pane_event(&self, pane: PaneId, event: &PaneEvent) -> Result<bool, DepthError> {
        match *event {
            PaneEvent::Wheel { delta, modifiers } => {
                self.core.forward(Some(pane), event.kind(), |m, token| {
                    m.handle_wheel_event_from(delta, modifiers.ctrl, token)
                })
            }
            PaneEvent::Drag {
                start_px,
                end_px,
                modifiers,
            } if !modifiers.shift => self.core.forward(Some(pane), event.kind(), |m, token| {
                m.pan_by_pixels_from(start_px - end_px, token)
            }),
            _ => Ok(false),
        }
    }

    fn stats(&self) -> SyncStats {
        self.core.stats.get()
    }
}

impl ViewportObserver for ScrollSynchronizer {
    fn on_viewport_changed(&self, event: &ViewportChanged) {
        self.core
            .propagate(event.origin, |pane| pane.apply_viewport(event.range));
    }
}

impl ZoomObserver for ScrollSynchronizer {
    fn on_zoom_changed(&self, event: &ZoomChanged) {
        self.core.propagate(event.origin, |pane| pane.apply_zoom(event.zoom));
    }
}

// ==================== Selection ====================

/// Keeps the selection of all panes in step.
///
/// Shift+drag selects between the two rows; Shift+click clears.
pub struct SelectionSynchronizer {
    core: SyncCore,
}

impl SelectionSynchronizer {
    pub fn new(manager: SharedManager) -> Rc<Self> {
        let sync = Rc::new(Self {
            core: SyncCore::new("selection", Rc::clone(&manager)),
        });
        let id = manager
            .borrow_mut()
            .subscribe_selection(Rc::downgrade(&sync) as Weak<dyn SelectionObserver>);
        sync.core.remember(id);
        sync
    }
}

impl Synchronizer for SelectionSynchronizer {
    fn name(&self) -> &'static str {
        self.core.name
    }

    fn bind_pane(&self, id: PaneId, pane: SharedPane) {
        self.core.bind(id, pane, |manager, pane| {
            pane.apply_selection(manager.selection_range());
        });
    }

    fn unbind_pane(&self, id: PaneId) -> bool {
        self.core.unbind(id)
    }

    fn accepts(&self, event: &PaneEvent) -> bool {
        matches!(
            event,
            PaneEvent::Drag { modifiers, .. } | PaneEvent::Click { modifiers, .. } if modifiers.shift
        )
    }

    fn handle_pane_event(&self, pane: PaneId, event: &PaneEvent) -> Result<bool, DepthError> {
        match *event {
            PaneEvent::Drag {
                start_px,
                end_px,
                modifiers,
            } if modifiers.shift => self.core.forward(Some(pane), event.kind(), |m, token| {
                let coords = m.coordinate_system();
                let a = coords.pixel_to_depth(start_px);
                let b = coords.pixel_to_depth(end_px);
                if (a - b).abs() < crate::coord::DEPTH_EPSILON {
                    return Ok(false);
                }
                let range = DepthRange::spanning(a, b)?;
                Ok(m.set_selection_range_from(Some(range), token))
            }),
            PaneEvent::Click { modifiers, .. } if modifiers.shift => {
                self.core.forward(Some(pane), event.kind(), |m, token| {
                    Ok(m.set_selection_range_from(None, token))
                })
            }
            _ => Ok(false),
        }
    }

    fn stats(&self) -> SyncStats {
        self.core.stats.get()
    }
}

impl SelectionObserver for SelectionSynchronizer {
    fn on_selection_changed(&self, event: &SelectionChanged) {
        self.core
            .propagate(event.origin, |pane| pane.apply_selection(event.selection));
    }
}

// ==================== Depth cursor ====================

/// Keeps the depth cursor of all panes in step.
///
/// A click places the cursor at the clicked depth, snapped unless Alt is held.
pub struct DepthSynchronizer {
    core: SyncCore,
}

impl DepthSynchronizer {
    pub fn new(manager: SharedManager) -> Rc<Self> {
        let sync = Rc::new(Self {
            core: SyncCore::new("depth", Rc::clone(&manager)),
        });
        let id = manager
            .borrow_mut()
            .subscribe_cursor(Rc::downgrade(&sync) as Weak<dyn CursorObserver>);
        sync.core.remember(id);
        sync
    }
}

impl Synchronizer for DepthSynchronizer {
    fn name(&self) -> &'static str {
        self.core.name
    }

    fn bind_pane(&self, id: PaneId, pane: SharedPane) {
        self.core.bind(id, pane, |manager, pane| {
            pane.apply_cursor(manager.cursor_depth());
        });
    }

    fn unbind_pane(&self, id: PaneId) -> bool {
        self.core.unbind(id)
    }

    fn accepts(&self, event: &PaneEvent) -> bool {
        matches!(event, PaneEvent::Click { modifiers, .. } if !modifiers.shift)
    }

    fn handle_pane_event(&self, pane: PaneId, event: &PaneEvent) -> Result<bool, DepthError> {
        match *event {
            PaneEvent::Click { px, modifiers } if !modifiers.shift => {
                self.core.forward(Some(pane), event.kind(), |m, token| {
                    let depth = m.coordinate_system().pixel_to_depth(px);
                    m.set_cursor_depth_from(depth, !modifiers.alt, token)
                })
            }
            _ => Ok(false),
        }
    }

    fn stats(&self) -> SyncStats {
        self.core.stats.get()
    }
}

impl CursorObserver for DepthSynchronizer {
    fn on_cursor_changed(&self, event: &CursorChanged) {
        self.core
            .propagate(event.origin, |pane| pane.apply_cursor(event.depth));
    }
}
