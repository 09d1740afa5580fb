//! Engine configuration.
//!
//! `EngineConfig` combines the per-component configurations so every open
//! document is set up consistently.

use crate::cache::CacheConfig;
use crate::scroll::ScrollConfig;
use crate::state::StateConfig;
use crate::stream::StreamConfig;

/// Top-level configuration passed to [`ViewportEngine`](super::ViewportEngine).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineConfig {
    /// Viewport and zoom settings; `document_max_depth` is replaced per
    /// document when its source knows its depth.
    pub state: StateConfig,

    /// Rendered-segment cache settings.
    pub cache: CacheConfig,

    /// Scroll batching and inertia settings.
    pub scroll: ScrollConfig,

    /// Chunk streaming settings.
    pub stream: StreamConfig,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(mut self, state: StateConfig) -> Self {
        self.state = state;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_scroll(mut self, scroll: ScrollConfig) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// State configuration for a document `max_depth` meters deep.
    pub(crate) fn state_for_document(&self, max_depth: Option<f64>) -> StateConfig {
        let mut state = self.state.clone();
        if let Some(depth) = max_depth.filter(|d| d.is_finite() && *d > 0.0) {
            state.document_max_depth = depth;
        }
        state
    }
}
