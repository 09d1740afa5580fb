//! Viewport render cache.
//!
//! Panes render depth segments into RGBA pixel buffers. Re-rendering on every
//! frame is too slow for smooth scrolling, so finished buffers are kept in a
//! byte-budgeted LRU cache keyed by what was rendered:
//!
//! - the depth range, quantized to micrometres
//! - the zoom level, quantized to 1e-6
//! - the level of detail ([`Lod`])
//!
//! During fast motion panes render at reduced detail; once motion settles the
//! reduced entries are dropped so the next frame renders at full resolution.

mod types;
mod viewport;

pub use types::{
    CacheConfig, CacheKey, CacheStats, Lod, RenderedSegment, SegmentHandle, BYTES_PER_PIXEL,
    DEFAULT_BUDGET_BYTES, DEFAULT_LOD_ZOOM_THRESHOLD, DEFAULT_REDUCED_FACTOR,
};
pub use viewport::ViewportCacheManager;
