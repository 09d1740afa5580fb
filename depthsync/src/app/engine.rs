//! The application root.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::{Handle, Runtime};
use tracing::info;

use super::config::EngineConfig;
use super::error::EngineError;
use super::session::{DocumentSession, FrameReport};
use crate::crosshole::{
    CrossHoleSyncManager, DisplayConfig, DisplaySink, DocumentId, JsonFileStore, SettingsStore,
};
use crate::stream::SampleSource;

/// Owns the cross-hole sync group and one [`DocumentSession`] per open
/// document.
///
/// All methods run on the UI thread. Background chunk loads run on the
/// runtime given to [`with_runtime`](Self::with_runtime) or created by
/// [`start_sync`](Self::start_sync); without one, only synchronous loads happen.
///
/// # Example
///
/// ```ignore
/// use depthsync::app::{EngineConfig, ViewportEngine};
///
/// let mut engine = ViewportEngine::start_sync(EngineConfig::default())?;
/// let session = engine.open_document(id, source, display, sink)?;
/// session.bind_pane(PaneId(1), pane);
/// ```
pub struct ViewportEngine {
    sessions: BTreeMap<DocumentId, DocumentSession>,
    cross_hole: CrossHoleSyncManager,
    config: EngineConfig,
    runtime_handle: Option<Handle>,
    /// Present when the engine created its own runtime. Dropped last so
    /// sessions cancel their loads first.
    runtime: Option<Runtime>,
}

impl std::fmt::Debug for ViewportEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportEngine")
            .field("documents", &self.document_ids())
            .field("cross_hole", &self.cross_hole)
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}

impl ViewportEngine {
    /// Create an engine without background loading.
    pub fn new(config: EngineConfig, store: Box<dyn SettingsStore>) -> Self {
        Self {
            sessions: BTreeMap::new(),
            cross_hole: CrossHoleSyncManager::new(store),
            config,
            runtime_handle: None,
            runtime: None,
        }
    }

    /// Run background loads on an existing runtime.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime_handle = Some(runtime);
        self
    }

    /// Create an engine with its own Tokio runtime and sync settings stored
    /// in the default location.
    ///
    /// For non-async callers such as CLI commands. The runtime lives as long
    /// as the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no config directory or the runtime cannot
    /// be created.
    pub fn start_sync(config: EngineConfig) -> Result<Self, EngineError> {
        let store = JsonFileStore::at_default_location()?;
        Self::start_sync_with_store(config, Box::new(store))
    }

    /// Like [`start_sync`](Self::start_sync) with an explicit settings store.
    pub fn start_sync_with_store(
        config: EngineConfig,
        store: Box<dyn SettingsStore>,
    ) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("depthsync-io")
            .enable_all()
            .build()
            .map_err(|e| EngineError::RuntimeCreation(e.to_string()))?;

        let mut engine = Self::new(config, store).with_runtime(runtime.handle().clone());
        engine.runtime = Some(runtime);
        info!("Viewport engine started with background loading");
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cross_hole(&self) -> &CrossHoleSyncManager {
        &self.cross_hole
    }

    /// Open a document and join it to the cross-hole sync group.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateDocument`] if `id` is already open, or
    /// a depth error if the configuration is malformed.
    pub fn open_document(
        &mut self,
        id: DocumentId,
        source: Arc<dyn SampleSource>,
        display: DisplayConfig,
        sink: Rc<dyn DisplaySink>,
    ) -> Result<&mut DocumentSession, EngineError> {
        if self.sessions.contains_key(&id) {
            return Err(EngineError::DuplicateDocument(id));
        }
        let session = DocumentSession::open(id, source, &self.config, self.runtime_handle.clone())?;
        self.cross_hole.register(id, display, sink);
        Ok(self.sessions.entry(id).or_insert(session))
    }

    /// Close a document and leave the sync group.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownDocument`] if `id` is not open.
    pub fn close_document(&mut self, id: DocumentId) -> Result<(), EngineError> {
        let mut session = self
            .sessions
            .remove(&id)
            .ok_or(EngineError::UnknownDocument(id))?;
        self.cross_hole.unregister(id);
        session.close();
        Ok(())
    }

    pub fn session(&self, id: DocumentId) -> Result<&DocumentSession, EngineError> {
        self.sessions.get(&id).ok_or(EngineError::UnknownDocument(id))
    }

    pub fn session_mut(&mut self, id: DocumentId) -> Result<&mut DocumentSession, EngineError> {
        self.sessions
            .get_mut(&id)
            .ok_or(EngineError::UnknownDocument(id))
    }

    pub fn document_ids(&self) -> Vec<DocumentId> {
        self.sessions.keys().copied().collect()
    }

    /// Run one frame for every open document.
    pub fn frame(&mut self, now: Instant) -> Result<Vec<(DocumentId, FrameReport)>, EngineError> {
        self.sessions
            .iter_mut()
            .map(|(id, session)| -> Result<_, EngineError> { Ok((*id, session.frame(now)?)) })
            .collect()
    }

    /// Close every document.
    pub fn shutdown(&mut self) {
        let ids = self.document_ids();
        for id in ids {
            // Ids come from the open set.
            let _ = self.close_document(id);
        }
        info!("Viewport engine shut down");
    }
}

impl Drop for ViewportEngine {
    fn drop(&mut self) {
        for session in self.sessions.values_mut() {
            session.stream_mut().shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crosshole::{Color, CurveStyle, DisplayChange, MemoryStore};
    use crate::stream::InMemorySource;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Sink(RefCell<Vec<DisplayChange>>);

    impl DisplaySink for Sink {
        fn apply_display_change(&self, change: &DisplayChange) {
            self.0.borrow_mut().push(change.clone());
        }
    }

    fn engine() -> ViewportEngine {
        ViewportEngine::new(EngineConfig::default(), Box::new(MemoryStore::new()))
    }

    fn source() -> Arc<InMemorySource> {
        Arc::new(InMemorySource::synthetic(300.0, 1.0, &["GR"]))
    }

    fn display() -> DisplayConfig {
        DisplayConfig::new().with_curve("GR", CurveStyle::default())
    }

    #[test]
    fn test_open_and_close_document() {
        let mut engine = engine();
        let id = DocumentId(1);
        engine
            .open_document(id, source(), display(), Rc::new(Sink::default()))
            .unwrap();
        assert!(engine.cross_hole().is_registered(id));
        assert_eq!(engine.document_ids(), vec![id]);

        engine.close_document(id).unwrap();
        assert!(!engine.cross_hole().is_registered(id));
        assert!(matches!(
            engine.close_document(id),
            Err(EngineError::UnknownDocument(_))
        ));
    }

    #[test]
    fn test_duplicate_document_rejected() {
        let mut engine = engine();
        let id = DocumentId(1);
        engine
            .open_document(id, source(), display(), Rc::new(Sink::default()))
            .unwrap();
        let err = engine
            .open_document(id, source(), display(), Rc::new(Sink::default()))
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateDocument(_)));
    }

    #[test]
    fn test_documents_keep_independent_depth() {
        let mut engine = engine();
        let sink = Rc::new(Sink::default());
        engine
            .open_document(DocumentId(1), source(), display(), sink.clone())
            .unwrap();
        engine
            .open_document(DocumentId(2), source(), display(), sink)
            .unwrap();

        engine
            .session(DocumentId(1))
            .unwrap()
            .manager()
            .borrow_mut()
            .scroll_to_depth(150.0)
            .unwrap();
        assert_ne!(
            engine.session(DocumentId(1)).unwrap().viewport_range(),
            engine.session(DocumentId(2)).unwrap().viewport_range()
        );

        let red = DisplayChange::Color {
            curve: "GR".into(),
            color: Color::rgb(255, 0, 0),
        };
        assert_eq!(engine.cross_hole().publish_change(DocumentId(1), red), 1);
    }

    #[test]
    fn test_frame_runs_every_session() {
        let mut engine = engine();
        for n in 1..=2 {
            engine
                .open_document(DocumentId(n), source(), display(), Rc::new(Sink::default()))
                .unwrap();
        }
        let reports = engine.frame(Instant::now()).unwrap();
        assert_eq!(reports.len(), 2);
        engine.shutdown();
        assert!(engine.document_ids().is_empty());
    }

    #[test]
    fn test_start_sync_owns_runtime() {
        let store = Box::new(MemoryStore::new());
        let mut engine = ViewportEngine::start_sync_with_store(EngineConfig::default(), store).unwrap();
        let session = engine
            .open_document(DocumentId(1), source(), display(), Rc::new(Sink::default()))
            .unwrap();
        let report = session.frame(Instant::now()).unwrap();
        // Default window: viewport chunks plus two on each side.
        assert!(report.prefetch_started > 0);
    }
}
