//! Byte-budgeted LRU cache of rendered viewport segments.

use std::sync::Arc;

use lru::LruCache;
use tracing::{debug, trace, warn};

use super::types::{CacheConfig, CacheKey, CacheStats, Lod, RenderedSegment, SegmentHandle};
use crate::coord::DepthRange;

/// Caches rendered pixel buffers keyed by (depth range, zoom, LOD).
///
/// Entries are evicted least-recently-used first once the byte budget is
/// exceeded. A single buffer larger than the whole budget is returned to the
/// caller without being stored.
///
/// A render that fails validation is discarded and rendered once more. If the
/// retry is also invalid the cache disables itself: every later request is
/// rendered and returned uncached, so a broken renderer degrades throughput
/// instead of poisoning the cache.
pub struct ViewportCacheManager {
    config: CacheConfig,
    entries: LruCache<CacheKey, SegmentHandle>,
    total_bytes: usize,
    fast_motion: bool,
    disabled: bool,
    hits: u64,
    misses: u64,
    evictions: u64,
    invalidations: u64,
    corrupt_renders: u64,
    uncached_renders: u64,
}

impl std::fmt::Debug for ViewportCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportCacheManager")
            .field("entries", &self.entries.len())
            .field("total_bytes", &self.total_bytes)
            .field("budget_bytes", &self.config.budget_bytes)
            .field("disabled", &self.disabled)
            .finish()
    }
}

impl Default for ViewportCacheManager {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ViewportCacheManager {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            // Bounded by bytes, not by count.
            entries: LruCache::unbounded(),
            total_bytes: 0,
            fast_motion: false,
            disabled: false,
            hits: 0,
            misses: 0,
            evictions: 0,
            invalidations: 0,
            corrupt_renders: 0,
            uncached_renders: 0,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached segment for the key, rendering it on a miss.
    ///
    /// `render` receives the requested range, zoom and LOD.
    pub fn get_or_render<F>(
        &mut self,
        range: &DepthRange,
        zoom: f64,
        lod: Lod,
        mut render: F,
    ) -> SegmentHandle
    where
        F: FnMut(&DepthRange, f64, Lod) -> RenderedSegment,
    {
        if self.disabled {
            self.uncached_renders += 1;
            return Arc::new(render(range, zoom, lod));
        }

        let key = CacheKey::new(range, zoom, lod);
        if let Some(segment) = self.entries.get(&key) {
            self.hits += 1;
            trace!(range = %range, zoom, lod = %lod, "Viewport cache hit");
            return Arc::clone(segment);
        }
        self.misses += 1;

        let mut segment = render(range, zoom, lod);
        if !segment.is_valid() {
            self.corrupt_renders += 1;
            warn!(
                range = %range,
                segment = ?segment,
                "Corrupt render discarded, retrying once"
            );
            segment = render(range, zoom, lod);
            if !segment.is_valid() {
                self.corrupt_renders += 1;
                self.disable();
                self.uncached_renders += 1;
                return Arc::new(segment);
            }
        }

        let size = segment.size_bytes();
        let segment = Arc::new(segment);
        if size > self.config.budget_bytes {
            self.uncached_renders += 1;
            debug!(
                size,
                budget = self.config.budget_bytes,
                "Segment larger than cache budget, not cached"
            );
            return segment;
        }

        if let Some(previous) = self.entries.put(key, Arc::clone(&segment)) {
            self.total_bytes -= previous.size_bytes();
        }
        self.total_bytes += size;
        self.evict_over_budget();
        segment
    }

    /// Whether a segment for the key is cached. Does not touch LRU order.
    pub fn contains(&self, range: &DepthRange, zoom: f64, lod: Lod) -> bool {
        self.entries.contains(&CacheKey::new(range, zoom, lod))
    }

    fn evict_over_budget(&mut self) {
        while self.total_bytes > self.config.budget_bytes {
            match self.entries.pop_lru() {
                Some((key, segment)) => {
                    self.total_bytes -= segment.size_bytes();
                    self.evictions += 1;
                    trace!(key = ?key, bytes = segment.size_bytes(), "Evicted segment");
                }
                None => break,
            }
        }
    }

    fn disable(&mut self) {
        warn!(
            corrupt_renders = self.corrupt_renders,
            "Renderer keeps producing invalid buffers, viewport caching disabled"
        );
        self.disabled = true;
        self.entries.clear();
        self.total_bytes = 0;
    }

    /// Remove every entry whose key matches. Returns the number removed.
    pub fn invalidate<P>(&mut self, predicate: P) -> usize
    where
        P: Fn(&CacheKey) -> bool,
    {
        let doomed: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, _)| *key)
            .collect();

        for key in &doomed {
            if let Some(segment) = self.entries.pop(key) {
                self.total_bytes -= segment.size_bytes();
            }
        }
        self.invalidations += doomed.len() as u64;
        if !doomed.is_empty() {
            debug!(removed = doomed.len(), "Invalidated cached segments");
        }
        doomed.len()
    }

    /// Remove every entry overlapping `range`, e.g. after its data changed.
    pub fn invalidate_range(&mut self, range: &DepthRange) -> usize {
        self.invalidate(|key| key.range().map_or(true, |r| r.overlaps(range)))
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.invalidations += self.entries.len() as u64;
        self.entries.clear();
        self.total_bytes = 0;
    }

    // ==================== LOD policy ====================

    /// Detail level to render at for `zoom` given the current motion state.
    pub fn lod_for(&self, zoom: f64) -> Lod {
        if self.fast_motion || zoom < self.config.lod_zoom_threshold {
            Lod::Reduced(self.config.reduced_factor)
        } else {
            Lod::Full
        }
    }

    /// Enter or leave fast motion.
    pub fn set_fast_motion(&mut self, fast: bool) {
        if self.fast_motion != fast {
            debug!(fast, "Viewport cache motion state changed");
        }
        self.fast_motion = fast;
    }

    pub fn is_fast_motion(&self) -> bool {
        self.fast_motion
    }

    /// Leave fast motion and drop reduced entries so the next request
    /// renders at full resolution.
    pub fn on_motion_settled(&mut self) -> usize {
        self.fast_motion = false;
        let threshold = self.config.lod_zoom_threshold;
        // Reduced entries for zoom levels that always render reduced stay.
        self.invalidate(|key| key.lod().is_reduced() && key.zoom() >= threshold)
    }

    // ==================== Diagnostics ====================

    /// Hits over lookups, 0.0 before the first lookup.
    pub fn cache_hit_rate(&self) -> f64 {
        self.stats().hit_rate()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Bytes held by cached segments.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            invalidations: self.invalidations,
            corrupt_renders: self.corrupt_renders,
            uncached_renders: self.uncached_renders,
            entry_count: self.entries.len(),
            total_bytes: self.total_bytes,
            budget_bytes: self.config.budget_bytes,
            disabled: self.disabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn range(top: f64, bottom: f64) -> DepthRange {
        DepthRange::new(top, bottom).unwrap()
    }

    /// 10x10 RGBA segment = 400 bytes.
    fn render_ok(_range: &DepthRange, _zoom: f64, lod: Lod) -> RenderedSegment {
        RenderedSegment::filled(10, 10, [255, 0, 0, 255], lod)
    }

    fn render_corrupt(_range: &DepthRange, _zoom: f64, lod: Lod) -> RenderedSegment {
        RenderedSegment {
            width: 10,
            height: 10,
            pixels: vec![0; 7],
            lod,
        }
    }

    #[test]
    fn test_second_request_is_hit() {
        let mut cache = ViewportCacheManager::default();
        let renders = Cell::new(0);
        let mut render = |r: &DepthRange, z: f64, l: Lod| {
            renders.set(renders.get() + 1);
            render_ok(r, z, l)
        };

        let first = cache.get_or_render(&range(0.0, 50.0), 1.0, Lod::Full, &mut render);
        let second = cache.get_or_render(&range(0.0, 50.0), 1.0, Lod::Full, &mut render);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(renders.get(), 1);
        assert_eq!(cache.cache_hit_rate(), 0.5);
    }

    #[test]
    fn test_invalidate_then_miss() {
        let mut cache = ViewportCacheManager::default();
        cache.get_or_render(&range(0.0, 50.0), 1.0, Lod::Full, render_ok);

        assert_eq!(cache.invalidate_range(&range(40.0, 60.0)), 1);
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.total_bytes(), 0);

        cache.get_or_render(&range(0.0, 50.0), 1.0, Lod::Full, render_ok);
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_invalidate_range_spares_disjoint_entries() {
        let mut cache = ViewportCacheManager::default();
        cache.get_or_render(&range(0.0, 50.0), 1.0, Lod::Full, render_ok);
        cache.get_or_render(&range(50.0, 100.0), 1.0, Lod::Full, render_ok);

        assert_eq!(cache.invalidate_range(&range(60.0, 70.0)), 1);
        assert!(cache.contains(&range(0.0, 50.0), 1.0, Lod::Full));
        assert!(!cache.contains(&range(50.0, 100.0), 1.0, Lod::Full));
    }

    #[test]
    fn test_lru_eviction_under_budget() {
        let mut cache = ViewportCacheManager::new(CacheConfig::default().with_budget_bytes(1000));
        cache.get_or_render(&range(0.0, 10.0), 1.0, Lod::Full, render_ok);
        cache.get_or_render(&range(10.0, 20.0), 1.0, Lod::Full, render_ok);
        // Touch the first so the second becomes least recently used.
        cache.get_or_render(&range(0.0, 10.0), 1.0, Lod::Full, render_ok);
        cache.get_or_render(&range(20.0, 30.0), 1.0, Lod::Full, render_ok);

        assert_eq!(cache.entry_count(), 2);
        assert_eq!(cache.total_bytes(), 800);
        assert!(cache.contains(&range(0.0, 10.0), 1.0, Lod::Full));
        assert!(!cache.contains(&range(10.0, 20.0), 1.0, Lod::Full));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_oversized_segment_not_cached() {
        let mut cache = ViewportCacheManager::new(CacheConfig::default().with_budget_bytes(100));
        let segment = cache.get_or_render(&range(0.0, 10.0), 1.0, Lod::Full, render_ok);

        assert_eq!(segment.size_bytes(), 400);
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.stats().uncached_renders, 1);
    }

    #[test]
    fn test_corrupt_render_retried_once() {
        let mut cache = ViewportCacheManager::default();
        let calls = Cell::new(0);
        let segment = cache.get_or_render(&range(0.0, 10.0), 1.0, Lod::Full, |r, z, l| {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                render_corrupt(r, z, l)
            } else {
                render_ok(r, z, l)
            }
        });

        assert!(segment.is_valid());
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.entry_count(), 1);
        assert!(!cache.is_disabled());
    }

    #[test]
    fn test_repeated_corruption_disables_caching() {
        let mut cache = ViewportCacheManager::default();
        cache.get_or_render(&range(0.0, 10.0), 1.0, Lod::Full, render_ok);
        cache.get_or_render(&range(10.0, 20.0), 1.0, Lod::Full, render_corrupt);

        assert!(cache.is_disabled());
        assert_eq!(cache.entry_count(), 0);

        // Still serves renders, just uncached.
        let segment = cache.get_or_render(&range(0.0, 10.0), 1.0, Lod::Full, render_ok);
        assert!(segment.is_valid());
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.stats().corrupt_renders, 2);
    }

    #[test]
    fn test_lod_policy() {
        let mut cache = ViewportCacheManager::default();
        assert_eq!(cache.lod_for(1.0), Lod::Full);
        assert_eq!(cache.lod_for(0.1), Lod::Reduced(4));

        cache.set_fast_motion(true);
        assert_eq!(cache.lod_for(1.0), Lod::Reduced(4));
    }

    #[test]
    fn test_settle_drops_reduced_entries() {
        let mut cache = ViewportCacheManager::default();
        cache.set_fast_motion(true);
        let lod = cache.lod_for(1.0);
        cache.get_or_render(&range(0.0, 10.0), 1.0, lod, render_ok);
        cache.get_or_render(&range(0.0, 10.0), 0.1, Lod::Reduced(4), render_ok);
        cache.get_or_render(&range(10.0, 20.0), 1.0, Lod::Full, render_ok);

        assert_eq!(cache.on_motion_settled(), 1);
        assert!(!cache.is_fast_motion());
        assert_eq!(cache.lod_for(1.0), Lod::Full);
        assert!(cache.contains(&range(10.0, 20.0), 1.0, Lod::Full));
        assert!(cache.contains(&range(0.0, 10.0), 0.1, Lod::Reduced(4)));
    }
}
