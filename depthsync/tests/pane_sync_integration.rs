//! Integration tests for pane synchronization.
//!
//! These tests drive a document session the way a UI would:
//! - raw pane events routed through the synchronizers
//! - pan input batched into one update per frame, with inertia on release
//! - echoing panes that report every update back as input
//! - several panes agreeing on depth↔pixel placement at any zoom
//!
//! Run with: `cargo test --test pane_sync_integration`

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::{Duration, Instant};

use depthsync::app::{DocumentSession, EngineConfig};
use depthsync::coord::{DepthCoordinateSystem, DepthRange};
use depthsync::crosshole::DocumentId;
use depthsync::state::StateConfig;
use depthsync::stream::InMemorySource;
use depthsync::sync::{
    DepthPane, Modifiers, PaneEvent, PaneId, ScrollSynchronizer, SharedManager, Synchronizer,
};

// ============================================================================
// Helper Types
// ============================================================================

/// A pane that places depths the way a real track would.
struct TrackPane {
    coords: Option<DepthCoordinateSystem>,
    height_px: f64,
    viewport_updates: usize,
    cursor: Option<f64>,
    selection: Option<DepthRange>,
}

impl TrackPane {
    fn new(height_px: f64) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            coords: None,
            height_px,
            viewport_updates: 0,
            cursor: None,
            selection: None,
        }))
    }

    fn pixel_of(&self, depth: f64) -> f64 {
        self.coords
            .as_ref()
            .map(|c| c.depth_to_pixel(depth))
            .expect("pane has a viewport")
    }
}

impl DepthPane for TrackPane {
    fn apply_viewport(&mut self, range: DepthRange) {
        self.coords = DepthCoordinateSystem::fitting(&range, self.height_px).ok();
        self.viewport_updates += 1;
    }

    fn apply_cursor(&mut self, depth: f64) {
        self.cursor = Some(depth);
    }

    fn apply_selection(&mut self, selection: Option<DepthRange>) {
        self.selection = selection;
    }

    fn apply_zoom(&mut self, _zoom: f64) {}
}

/// A pane that reports every viewport it is given back as a drag, like a
/// scroll view whose "scrolled" signal fires on programmatic moves too.
struct EchoPane {
    id: PaneId,
    sync: Weak<ScrollSynchronizer>,
    last: Option<DepthRange>,
    updates: usize,
}

impl DepthPane for EchoPane {
    fn apply_viewport(&mut self, range: DepthRange) {
        self.updates += 1;
        let moved = self.last.map_or(0.0, |last| (range.top() - last.top()) * 10.0);
        self.last = Some(range);
        if let Some(sync) = self.sync.upgrade() {
            let echo = PaneEvent::Drag {
                start_px: moved,
                end_px: 0.0,
                modifiers: Modifiers::NONE,
            };
            let _ = sync.handle_pane_event(self.id, &echo);
        }
    }

    fn apply_cursor(&mut self, _depth: f64) {}

    fn apply_selection(&mut self, _selection: Option<DepthRange>) {}

    fn apply_zoom(&mut self, _zoom: f64) {}
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 500 px viewport, 10 px/m, 200 m document.
fn scenario_config() -> EngineConfig {
    EngineConfig::default().with_state(
        StateConfig::new(200.0)
            .with_viewport_height_px(500.0)
            .with_base_scale(10.0),
    )
}

fn open_session() -> DocumentSession {
    let source = Arc::new(InMemorySource::synthetic(200.0, 0.25, &["GR", "RHOB"]));
    DocumentSession::open(DocumentId(1), source, &scenario_config(), None).unwrap()
}

fn wheel(delta: f64) -> PaneEvent {
    PaneEvent::Wheel {
        delta,
        modifiers: Modifiers::NONE,
    }
}

fn manager_of(session: &DocumentSession) -> SharedManager {
    Rc::clone(session.manager())
}

/// A frame clock stepping at the default 16 ms interval.
struct FrameClock {
    now: Instant,
}

impl FrameClock {
    fn new() -> Self {
        Self { now: Instant::now() }
    }

    fn now(&self) -> Instant {
        self.now
    }

    fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    /// Run the session's frame and advance to the next one.
    fn frame(&mut self, session: &mut DocumentSession) -> f64 {
        let report = session.frame(self.now).unwrap();
        self.now += Duration::from_millis(16);
        report.applied_px
    }
}

/// Route an event and run a frame, then let the originating pane scroll
/// itself the way a native scroll view does.
fn scroll_from(
    session: &mut DocumentSession,
    clock: &mut FrameClock,
    id: PaneId,
    pane: &Rc<RefCell<TrackPane>>,
    event: PaneEvent,
) {
    session.handle_pane_event(id, &event, clock.now()).unwrap();
    clock.frame(session);
    let range = session.viewport_range();
    pane.borrow_mut().apply_viewport(range);
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[test]
fn test_reference_scenario() {
    let mut session = open_session();
    let mut clock = FrameClock::new();
    let manager = manager_of(&session);

    manager.borrow_mut().set_viewport_range(0.0, 50.0).unwrap();
    assert_eq!(
        manager.borrow().coordinate_system().depth_to_pixel(25.0),
        250.0
    );

    manager.borrow_mut().set_cursor_depth(25.0, false).unwrap();
    manager.borrow_mut().set_zoom_level(2.0).unwrap();
    let range = manager.borrow().viewport_range();
    assert!((range.span() - 25.0).abs() < 1e-9);
    assert!((range.top() - 12.5).abs() < 1e-9);
    assert!((range.bottom() - 37.5).abs() < 1e-9);

    let before = manager.borrow().viewport_range();
    session
        .handle_pane_event(PaneId(1), &wheel(120.0), clock.now())
        .unwrap();
    assert_eq!(manager.borrow().viewport_range(), before);
    clock.frame(&mut session);
    assert!(manager.borrow().viewport_range().top() > before.top());

    for _ in 0..200 {
        session
            .handle_pane_event(PaneId(1), &wheel(120.0), clock.now())
            .unwrap();
        clock.frame(&mut session);
        assert!(manager.borrow().viewport_range().bottom() <= 200.0 + 1e-9);
    }
    assert!((manager.borrow().viewport_range().bottom() - 200.0).abs() < 1e-9);
}

#[test]
fn test_burst_of_wheel_events_emits_once_per_frame() {
    let mut session = open_session();
    let mut clock = FrameClock::new();
    let panes: Vec<_> = (1..=3).map(|_| TrackPane::new(500.0)).collect();
    for (n, pane) in panes.iter().enumerate() {
        session.bind_pane(PaneId(n as u32 + 1), pane.clone());
    }
    let follower = &panes[2];
    let baseline = follower.borrow().viewport_updates;

    // A high-resolution wheel reporting far faster than the frame rate.
    for i in 0..20 {
        let at = clock.now() + Duration::from_micros(250 * i);
        session.handle_pane_event(PaneId(1), &wheel(12.0), at).unwrap();
    }
    assert_eq!(follower.borrow().viewport_updates, baseline);
    assert_eq!(session.viewport_range().top(), 0.0);

    clock.advance(Duration::from_millis(5));
    assert_eq!(clock.frame(&mut session), 240.0);
    assert_eq!(follower.borrow().viewport_updates, baseline + 1);
    assert!((session.viewport_range().top() - 24.0).abs() < 1e-9);

    // Nothing left to apply on the next frame.
    assert_eq!(clock.frame(&mut session), 0.0);
    assert_eq!(follower.borrow().viewport_updates, baseline + 1);
}

#[test]
fn test_drag_release_keeps_panes_moving() {
    let mut session = open_session();
    let mut clock = FrameClock::new();
    let a = TrackPane::new(500.0);
    let b = TrackPane::new(500.0);
    session.bind_pane(PaneId(1), a.clone());
    session.bind_pane(PaneId(2), b.clone());

    // Drag content up 40 px per frame.
    for _ in 0..6 {
        let drag = PaneEvent::Drag {
            start_px: 400.0,
            end_px: 360.0,
            modifiers: Modifiers::NONE,
        };
        scroll_from(&mut session, &mut clock, PaneId(1), &a, drag);
    }
    let released_at = session.viewport_range();
    session
        .handle_pane_event(PaneId(1), &PaneEvent::Release, clock.now())
        .unwrap();
    clock.advance(Duration::from_millis(16));

    let mut steps = Vec::new();
    for _ in 0..8 {
        steps.push(clock.frame(&mut session));
    }
    assert!(steps.iter().all(|px| *px > 0.0), "{steps:?}");
    assert!(steps.windows(2).all(|w| w[1] < w[0]), "{steps:?}");
    assert!(session.viewport_range().top() > released_at.top());

    // Coasting reaches the pane that was dragged as well.
    let range = session.viewport_range();
    for pane in [&a, &b] {
        assert!(pane.borrow().pixel_of(range.top()).abs() < 1e-6);
    }
}

#[test]
fn test_wheel_in_one_pane_moves_the_others_once() {
    let mut session = open_session();
    let mut clock = FrameClock::new();
    let panes: Vec<_> = (1..=3).map(|_| TrackPane::new(500.0)).collect();
    for (n, pane) in panes.iter().enumerate() {
        session.bind_pane(PaneId(n as u32 + 1), pane.clone());
    }
    let baseline: Vec<usize> = panes.iter().map(|p| p.borrow().viewport_updates).collect();

    session
        .handle_pane_event(PaneId(1), &wheel(240.0), clock.now())
        .unwrap();
    clock.frame(&mut session);

    let range = session.viewport_range();
    assert_eq!(panes[0].borrow().viewport_updates, baseline[0]);
    for (pane, before) in panes.iter().zip(&baseline).skip(1) {
        assert_eq!(pane.borrow().viewport_updates, before + 1);
        assert!((pane.borrow().pixel_of(range.top())).abs() < 1e-9);
    }
}

#[test]
fn test_echoing_panes_update_at_most_once_per_gesture() {
    let session = open_session();
    let manager = manager_of(&session);
    let sync = ScrollSynchronizer::new(Rc::clone(&manager));

    let make = |id| {
        Rc::new(RefCell::new(EchoPane {
            id: PaneId(id),
            sync: Rc::downgrade(&sync),
            last: None,
            updates: 0,
        }))
    };
    let a = make(1);
    let b = make(2);
    sync.bind_pane(PaneId(1), a.clone());
    sync.bind_pane(PaneId(2), b.clone());

    let stats_before = sync.stats();
    let (a_before, b_before) = (a.borrow().updates, b.borrow().updates);
    let drag = PaneEvent::Drag {
        start_px: 300.0,
        end_px: 100.0,
        modifiers: Modifiers::NONE,
    };
    assert!(sync.handle_pane_event(PaneId(1), &drag).unwrap());

    assert_eq!(a.borrow().updates, a_before);
    assert_eq!(b.borrow().updates, b_before + 1);
    let stats = sync.stats();
    assert_eq!(stats.forwarded - stats_before.forwarded, 1);
    assert!(stats.dropped_echoes > stats_before.dropped_echoes);
    assert!((manager.borrow().viewport_range().top() - 20.0).abs() < 1e-9);
}

#[test]
fn test_panes_agree_within_one_pixel_at_every_zoom() {
    let mut session = open_session();
    let mut clock = FrameClock::new();
    let a = TrackPane::new(500.0);
    let b = TrackPane::new(500.0);
    session.bind_pane(PaneId(1), a.clone());
    session.bind_pane(PaneId(2), b.clone());
    let manager = manager_of(&session);

    for zoom in [0.5, 1.0, 2.0, 3.7] {
        manager.borrow_mut().set_zoom_level(zoom).unwrap();
        scroll_from(&mut session, &mut clock, PaneId(1), &a, wheel(-60.0));
        scroll_from(&mut session, &mut clock, PaneId(2), &b, wheel(200.0));

        let range = manager.borrow().viewport_range();
        for depth in [range.top(), range.center(), range.bottom() - 0.01] {
            let pa = a.borrow().pixel_of(depth);
            let pb = b.borrow().pixel_of(depth);
            let truth = manager.borrow().coordinate_system().depth_to_pixel(depth);
            assert!((pa - pb).abs() <= 1.0, "zoom {zoom}: {pa} vs {pb}");
            assert!((pa - truth).abs() <= 1.0, "zoom {zoom}: {pa} vs {truth}");
        }
    }
}

#[test]
fn test_selection_and_cursor_reach_other_panes() {
    let mut session = open_session();
    let now = Instant::now();
    let a = TrackPane::new(500.0);
    let b = TrackPane::new(500.0);
    session.bind_pane(PaneId(1), a.clone());
    session.bind_pane(PaneId(2), b.clone());

    let select = PaneEvent::Drag {
        start_px: 100.0,
        end_px: 200.0,
        modifiers: Modifiers::SHIFT,
    };
    assert!(session.handle_pane_event(PaneId(1), &select, now).unwrap());
    let selection = b.borrow().selection.expect("selection propagated");
    assert!((selection.top() - 10.0).abs() < 1e-9);
    assert!((selection.bottom() - 20.0).abs() < 1e-9);

    let click = PaneEvent::Click {
        px: 123.0,
        modifiers: Modifiers::ALT,
    };
    assert!(session.handle_pane_event(PaneId(2), &click, now).unwrap());
    assert!((a.borrow().cursor.unwrap() - 12.3).abs() < 1e-9);

    let clear = PaneEvent::Click {
        px: 0.0,
        modifiers: Modifiers::SHIFT,
    };
    assert!(session.handle_pane_event(PaneId(2), &clear, now).unwrap());
    assert!(a.borrow().selection.is_none());
}

#[test]
fn test_programmatic_change_reaches_every_pane() {
    let session = open_session();
    let a = TrackPane::new(500.0);
    let b = TrackPane::new(500.0);
    session.bind_pane(PaneId(1), a.clone());
    session.bind_pane(PaneId(2), b.clone());
    let before = (a.borrow().viewport_updates, b.borrow().viewport_updates);

    session
        .manager()
        .borrow_mut()
        .scroll_to_depth(120.0)
        .unwrap();

    assert_eq!(a.borrow().viewport_updates, before.0 + 1);
    assert_eq!(b.borrow().viewport_updates, before.1 + 1);
}
