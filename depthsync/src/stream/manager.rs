//! Windowed chunk streaming with background prefetch.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::chunk::{chunks_covering, DepthChunk, SourceError};
use super::source::SampleSource;
use crate::coord::DepthRange;

/// Default depth span of one chunk (meters).
pub const DEFAULT_CHUNK_SPAN_M: f64 = 50.0;

/// Default number of resident chunks.
pub const DEFAULT_MAX_LOADED_CHUNKS: u64 = 64;

/// Default number of chunks prefetched on each side of the viewport.
pub const DEFAULT_PREFETCH_CHUNKS: u64 = 2;

/// Configuration for [`DataStreamManager`].
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Depth span of one chunk, in meters.
    pub chunk_span_m: f64,
    /// Upper bound on resident chunks; least recently used are evicted.
    pub max_loaded_chunks: u64,
    /// Chunks kept loaded beyond each end of the viewport.
    pub prefetch_chunks: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_span_m: DEFAULT_CHUNK_SPAN_M,
            max_loaded_chunks: DEFAULT_MAX_LOADED_CHUNKS,
            prefetch_chunks: DEFAULT_PREFETCH_CHUNKS,
        }
    }
}

impl StreamConfig {
    /// Create a config with the given chunk span; non-positive spans fall
    /// back to the default.
    pub fn new(chunk_span_m: f64) -> Self {
        Self::default().with_chunk_span(chunk_span_m)
    }

    pub fn with_chunk_span(mut self, span_m: f64) -> Self {
        self.chunk_span_m = if span_m.is_finite() && span_m > 0.0 {
            span_m
        } else {
            DEFAULT_CHUNK_SPAN_M
        };
        self
    }

    pub fn with_max_loaded_chunks(mut self, max: u64) -> Self {
        self.max_loaded_chunks = max.max(1);
        self
    }

    pub fn with_prefetch_chunks(mut self, count: u64) -> Self {
        self.prefetch_chunks = count;
        self
    }
}

/// Stream counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Chunks read from the source on the calling thread.
    pub sync_loads: u64,
    /// Chunks read in the background and inserted.
    pub background_loads: u64,
    /// Loaded chunks that turned out to be gaps.
    pub unavailable: u64,
    /// Background loads cancelled because they left the window.
    pub cancelled: u64,
    /// Finished background loads dropped because they arrived out of window.
    pub discarded: u64,
    pub resident: u64,
    pub pending: usize,
}

impl StreamStats {
    pub fn total_loads(&self) -> u64 {
        self.sync_loads + self.background_loads
    }
}

struct Completed {
    index: u64,
    generation: u64,
    result: Result<DepthChunk, SourceError>,
}

struct PendingLoad {
    generation: u64,
    cancel: CancellationToken,
}

/// Supplies depth chunks on demand with bounded memory.
///
/// Chunk loads requested through [`get_chunk`](Self::get_chunk) run on the
/// calling thread. Prefetch loads run on the tokio blocking pool and report
/// back over a channel; only [`drain_completed`](Self::drain_completed),
/// called from the owning thread, inserts them into the chunk table.
pub struct DataStreamManager {
    config: StreamConfig,
    source: Arc<dyn SampleSource>,
    chunks: Cache<u64, Arc<DepthChunk>>,
    runtime: Option<Handle>,
    window: Option<RangeInclusive<u64>>,
    pending: HashMap<u64, PendingLoad>,
    next_generation: u64,
    completed_tx: mpsc::UnboundedSender<Completed>,
    completed_rx: mpsc::UnboundedReceiver<Completed>,
    stats: StreamStats,
}

impl std::fmt::Debug for DataStreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStreamManager")
            .field("config", &self.config)
            .field("window", &self.window)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl DataStreamManager {
    /// Create a manager without background prefetch.
    pub fn new(source: Arc<dyn SampleSource>, config: StreamConfig) -> Self {
        let chunks = Cache::builder()
            .max_capacity(config.max_loaded_chunks)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        Self {
            config,
            source,
            chunks,
            runtime: None,
            window: None,
            pending: HashMap::new(),
            next_generation: 0,
            completed_tx,
            completed_rx,
            stats: StreamStats::default(),
        }
    }

    /// Run prefetch loads on `runtime`.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Chunks covering `range`, loading missing ones synchronously.
    pub fn get_chunk(&mut self, range: &DepthRange) -> Vec<Arc<DepthChunk>> {
        chunks_covering(range, self.config.chunk_span_m)
            .map(|index| self.chunk_at(index))
            .collect()
    }

    fn chunk_at(&mut self, index: u64) -> Arc<DepthChunk> {
        if let Some(chunk) = self.chunks.get(&index) {
            return chunk;
        }
        // A background load for this chunk is now redundant.
        if let Some(pending) = self.pending.remove(&index) {
            pending.cancel.cancel();
        }

        let chunk = Arc::new(DepthChunk::load(
            self.source.as_ref(),
            index,
            self.config.chunk_span_m,
        ));
        self.stats.sync_loads += 1;
        if !chunk.is_loaded() {
            self.stats.unavailable += 1;
        }
        trace!(chunk = index, status = ?chunk.status, "Chunk loaded");
        self.chunks.insert(index, Arc::clone(&chunk));
        chunk
    }

    /// Whether chunk `index` is resident. Does not touch LRU order.
    pub fn is_resident(&self, index: u64) -> bool {
        self.chunks.contains_key(&index)
    }

    /// Recompute the prefetch window around `viewport`.
    ///
    /// Pending loads for chunks outside the new window are cancelled.
    pub fn update_window(&mut self, viewport: &DepthRange) {
        let covering = chunks_covering(viewport, self.config.chunk_span_m);
        let margin = self.config.prefetch_chunks;
        let window =
            covering.start().saturating_sub(margin)..=covering.end().saturating_add(margin);
        self.set_window(window);
    }

    /// Widen the window to include `range`, e.g. the region ahead of fast motion.
    pub fn extend_window(&mut self, range: &DepthRange) {
        let covering = chunks_covering(range, self.config.chunk_span_m);
        let window = match &self.window {
            Some(current) => {
                (*current.start()).min(*covering.start())..=(*current.end()).max(*covering.end())
            }
            None => covering,
        };
        self.set_window(window);
    }

    fn set_window(&mut self, window: RangeInclusive<u64>) {
        let before = self.pending.len();
        self.pending.retain(|index, pending| {
            let keep = window.contains(index);
            if !keep {
                pending.cancel.cancel();
            }
            keep
        });
        let cancelled = (before - self.pending.len()) as u64;
        if cancelled > 0 {
            debug!(cancelled, window = ?window, "Cancelled out-of-window chunk loads");
        }
        self.stats.cancelled += cancelled;
        self.window = Some(window);
    }

    pub fn window(&self) -> Option<RangeInclusive<u64>> {
        self.window.clone()
    }

    /// Spawn background loads for missing chunks in the window.
    ///
    /// Returns the number of loads started. Without a runtime this does
    /// nothing.
    pub fn prefetch_idle(&mut self) -> usize {
        let (Some(runtime), Some(window)) = (self.runtime.clone(), self.window.clone()) else {
            return 0;
        };
        let max_depth = self.source.max_depth();

        let mut started = 0;
        for index in window {
            if self.chunks.contains_key(&index) || self.pending.contains_key(&index) {
                continue;
            }
            let span = self.config.chunk_span_m;
            if max_depth.is_some_and(|max| index as f64 * span > max) {
                break;
            }
            // Keep resident + in-flight within the chunk budget.
            if self.chunks.entry_count() + (self.pending.len() as u64) >= self.config.max_loaded_chunks {
                break;
            }

            self.next_generation += 1;
            let generation = self.next_generation;
            let cancel = CancellationToken::new();
            let task_cancel = cancel.clone();
            let source = Arc::clone(&self.source);
            let tx = self.completed_tx.clone();

            runtime.spawn_blocking(move || {
                let result = if task_cancel.is_cancelled() {
                    Err(SourceError::Cancelled(index))
                } else {
                    // A panicking source becomes a gap.
                    let loaded = std::panic::catch_unwind(AssertUnwindSafe(|| {
                        DepthChunk::load(source.as_ref(), index, span)
                    }));
                    match loaded {
                        Ok(_) if task_cancel.is_cancelled() => Err(SourceError::Cancelled(index)),
                        Ok(chunk) => Ok(chunk),
                        Err(panic) => Err(SourceError::TaskFailed {
                            index,
                            reason: panic_message(panic.as_ref()),
                        }),
                    }
                };
                // The manager may be gone; nothing to report to then.
                let _ = tx.send(Completed {
                    index,
                    generation,
                    result,
                });
            });

            self.pending.insert(index, PendingLoad { generation, cancel });
            started += 1;
        }

        if started > 0 {
            debug!(started, pending = self.pending.len(), "Prefetch loads started");
        }
        started
    }

    /// Insert finished background loads that are still wanted.
    ///
    /// Returns the number of chunks inserted.
    pub fn drain_completed(&mut self) -> usize {
        let mut inserted = 0;
        while let Ok(completed) = self.completed_rx.try_recv() {
            if self.accept(completed) {
                inserted += 1;
            }
        }
        inserted
    }

    /// Wait until every pending background load has reported back.
    ///
    /// Returns the number of chunks inserted.
    pub async fn wait_pending(&mut self) -> usize {
        let mut inserted = self.drain_completed();
        while !self.pending.is_empty() {
            let Some(completed) = self.completed_rx.recv().await else {
                break;
            };
            if self.accept(completed) {
                inserted += 1;
            }
        }
        inserted
    }

    fn accept(&mut self, completed: Completed) -> bool {
        let Completed {
            index,
            generation,
            result,
        } = completed;

        let current = self
            .pending
            .get(&index)
            .is_some_and(|pending| pending.generation == generation);
        if current {
            self.pending.remove(&index);
        }

        let chunk = match result {
            Ok(chunk) => chunk,
            Err(SourceError::Cancelled(_)) => return false,
            Err(e) => {
                warn!(error = %e, "Background chunk load failed");
                DepthChunk::unavailable(index, self.config.chunk_span_m)
            }
        };

        let in_window = self.window.as_ref().is_some_and(|w| w.contains(&index));
        if !current || !in_window || self.chunks.contains_key(&index) {
            self.stats.discarded += 1;
            trace!(chunk = index, "Discarded stale background load");
            return false;
        }

        if !chunk.is_loaded() {
            self.stats.unavailable += 1;
        }
        self.stats.background_loads += 1;
        self.chunks.insert(index, Arc::new(chunk));
        true
    }

    /// Sample depths within `range`, for cursor snapping.
    pub fn sample_depths(&mut self, range: &DepthRange) -> Vec<f64> {
        self.get_chunk(range)
            .iter()
            .flat_map(|chunk| chunk.sample_depths().collect::<Vec<_>>())
            .filter(|depth| range.contains(*depth))
            .collect()
    }

    /// Drop resident chunks overlapping `range`, e.g. after the data changed.
    pub fn invalidate_range(&mut self, range: &DepthRange) {
        for index in chunks_covering(range, self.config.chunk_span_m) {
            self.chunks.invalidate(&index);
            if let Some(pending) = self.pending.remove(&index) {
                pending.cancel.cancel();
            }
        }
    }

    /// Resident chunk count, after applying pending evictions.
    pub fn loaded_chunk_count(&self) -> u64 {
        self.chunks.run_pending_tasks();
        self.chunks.entry_count()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            resident: self.loaded_chunk_count(),
            pending: self.pending.len(),
            ..self.stats
        }
    }

    /// Cancel every pending load.
    pub fn shutdown(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.cancel.cancel();
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Drop for DataStreamManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
