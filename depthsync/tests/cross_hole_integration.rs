//! Integration tests for cross-hole display synchronization.
//!
//! Several documents are opened in one engine; display edits in one are
//! mirrored to the others subject to the persisted sync settings and the
//! per-document override modifier.
//!
//! Run with: `cargo test --test cross_hole_integration`

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use depthsync::app::{EngineConfig, ViewportEngine};
use depthsync::crosshole::{
    Color, CurveStyle, DisplayChange, DisplayConfig, DisplaySink, DocumentId, JsonFileStore,
    LineStyle, MemberState, MemoryStore, SettingsStore, SyncSettings,
};
use depthsync::state::StateConfig;
use depthsync::stream::InMemorySource;

const D1: DocumentId = DocumentId(1);
const D2: DocumentId = DocumentId(2);
const D3: DocumentId = DocumentId(3);

// ============================================================================
// Helper Types
// ============================================================================

/// A document view that keeps its own copy of the display config.
struct DocumentView {
    display: RefCell<DisplayConfig>,
    changes: RefCell<Vec<DisplayChange>>,
}

impl DocumentView {
    fn new(display: DisplayConfig) -> Rc<Self> {
        Rc::new(Self {
            display: RefCell::new(display),
            changes: RefCell::new(Vec::new()),
        })
    }

    fn color_of(&self, curve: &str) -> Color {
        self.display.borrow().style(curve).unwrap().color
    }
}

impl DisplaySink for DocumentView {
    fn apply_display_change(&self, change: &DisplayChange) {
        self.display.borrow_mut().apply(change);
        self.changes.borrow_mut().push(change.clone());
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn well_display() -> DisplayConfig {
    DisplayConfig::new()
        .with_curve("GR", CurveStyle::default())
        .with_curve("RHOB", CurveStyle::default())
}

fn red() -> Color {
    Color::rgb(255, 0, 0)
}

fn color_gr(color: Color) -> DisplayChange {
    DisplayChange::Color {
        curve: "GR".into(),
        color,
    }
}

fn engine_with_store(store: Box<dyn SettingsStore>) -> ViewportEngine {
    let config = EngineConfig::default().with_state(StateConfig::new(500.0));
    ViewportEngine::new(config, store)
}

fn open(engine: &mut ViewportEngine, id: DocumentId) -> Rc<DocumentView> {
    let view = DocumentView::new(well_display());
    let source = Arc::new(InMemorySource::synthetic(500.0, 1.0, &["GR", "RHOB"]));
    engine
        .open_document(id, source, well_display(), view.clone())
        .unwrap();
    view
}

/// The user edits a document locally, then the edit is published.
fn edit(
    engine: &ViewportEngine,
    view: &DocumentView,
    id: DocumentId,
    change: DisplayChange,
) -> usize {
    view.display.borrow_mut().apply(&change);
    engine.cross_hole().publish_change(id, change)
}

// ============================================================================
// Propagation
// ============================================================================

#[test]
fn test_color_change_reaches_other_documents() {
    let mut engine = engine_with_store(Box::new(MemoryStore::new()));
    let v1 = open(&mut engine, D1);
    let v2 = open(&mut engine, D2);
    let v3 = open(&mut engine, D3);

    let delivered = edit(&engine, &v1, D1, color_gr(red()));

    assert_eq!(delivered, 2);
    assert_eq!(v2.color_of("GR"), red());
    assert_eq!(v3.color_of("GR"), red());
    assert!(v1.changes.borrow().is_empty());
    assert_eq!(engine.cross_hole().config(D2).unwrap(), *v2.display.borrow());
}

#[test]
fn test_overridden_document_edits_locally() {
    let mut engine = engine_with_store(Box::new(MemoryStore::new()));
    let v1 = open(&mut engine, D1);
    let v2 = open(&mut engine, D2);

    assert!(engine.cross_hole().handle_modifier(D1, "alt", true));
    assert_eq!(engine.cross_hole().member_state(D1), Some(MemberState::Overridden));

    let delivered = edit(&engine, &v1, D1, color_gr(red()));
    assert_eq!(delivered, 0);
    assert_eq!(v2.color_of("GR"), Color::BLACK);
    assert_eq!(v1.color_of("GR"), red());
}

#[test]
fn test_releasing_override_reconciles_with_the_group() {
    let mut engine = engine_with_store(Box::new(MemoryStore::new()));
    let v1 = open(&mut engine, D1);
    let v2 = open(&mut engine, D2);

    engine.cross_hole().set_override(D2, true);
    edit(&engine, &v1, D1, color_gr(red()));
    assert_eq!(v2.color_of("GR"), Color::BLACK);

    engine.cross_hole().set_override(D2, false);
    assert_eq!(v2.color_of("GR"), red());
    assert_eq!(engine.cross_hole().member_state(D2), Some(MemberState::Synced));
}

#[test]
fn test_disabled_fields_stay_local() {
    let mut engine = engine_with_store(Box::new(MemoryStore::new()));
    let v1 = open(&mut engine, D1);
    let v2 = open(&mut engine, D2);

    engine.cross_hole().update_settings(|s| s.sync_colors = false);
    assert_eq!(edit(&engine, &v1, D1, color_gr(red())), 0);
    assert_eq!(v2.color_of("GR"), Color::BLACK);

    let dashed = DisplayChange::Style {
        curve: "RHOB".into(),
        style: LineStyle::Dashed,
    };
    assert_eq!(edit(&engine, &v1, D1, dashed), 1);
    assert_eq!(
        v2.display.borrow().style("RHOB").unwrap().style,
        LineStyle::Dashed
    );
}

#[test]
fn test_manual_sync_when_auto_sync_is_off() {
    let mut engine = engine_with_store(Box::new(MemoryStore::new()));
    let v1 = open(&mut engine, D1);
    let v2 = open(&mut engine, D2);

    engine.cross_hole().update_settings(|s| s.auto_sync = false);
    assert_eq!(edit(&engine, &v1, D1, color_gr(red())), 0);
    assert_eq!(v2.color_of("GR"), Color::BLACK);

    assert_eq!(engine.cross_hole().sync_now(D1), 1);
    assert_eq!(v2.color_of("GR"), red());
}

#[test]
fn test_closed_document_leaves_the_group() {
    let mut engine = engine_with_store(Box::new(MemoryStore::new()));
    let v1 = open(&mut engine, D1);
    let v2 = open(&mut engine, D2);

    engine.close_document(D2).unwrap();
    assert!(!engine.cross_hole().is_registered(D2));
    assert_eq!(edit(&engine, &v1, D1, color_gr(red())), 0);
    assert!(v2.changes.borrow().is_empty());
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_settings_survive_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sync.json");

    {
        let engine = engine_with_store(Box::new(JsonFileStore::new(&path)));
        assert_eq!(engine.cross_hole().settings(), SyncSettings::default());
        engine.cross_hole().update_settings(|s| {
            s.sync_thickness = false;
            s.override_key = "Ctrl".into();
        });
    }
    assert!(path.exists());

    let mut engine = engine_with_store(Box::new(JsonFileStore::new(&path)));
    let settings = engine.cross_hole().settings();
    assert!(!settings.sync_thickness);
    assert_eq!(settings.override_key, "Ctrl");

    // The persisted override key is the one the modifier handler honors.
    open(&mut engine, D1);
    assert!(!engine.cross_hole().handle_modifier(D1, "Alt", true));
    assert!(engine.cross_hole().handle_modifier(D1, "ctrl", true));
}

#[test]
fn test_corrupt_settings_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sync.json");
    std::fs::write(&path, "{ not json").unwrap();

    let engine = engine_with_store(Box::new(JsonFileStore::new(&path)));
    assert_eq!(engine.cross_hole().settings(), SyncSettings::default());
}
