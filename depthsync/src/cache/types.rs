//! Cache key, entry and statistics types.

use std::fmt;
use std::sync::Arc;

use crate::coord::DepthRange;

/// Default byte budget for cached segments (100 MiB).
pub const DEFAULT_BUDGET_BYTES: usize = 100 * 1024 * 1024;

/// Default downsampling factor for [`Lod::Reduced`] renders.
pub const DEFAULT_REDUCED_FACTOR: u32 = 4;

/// Default zoom below which renders use reduced detail.
pub const DEFAULT_LOD_ZOOM_THRESHOLD: f64 = 0.25;

/// Bytes per pixel of a rendered segment (RGBA8).
pub const BYTES_PER_PIXEL: usize = 4;

const DEPTH_QUANTUM_PER_M: f64 = 1e6;
const ZOOM_QUANTUM: f64 = 1e6;

/// Level of detail for a rendered segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lod {
    /// Full resolution.
    Full,
    /// Downsampled by the given factor, used during fast motion.
    Reduced(u32),
}

impl Lod {
    pub fn is_reduced(&self) -> bool {
        matches!(self, Lod::Reduced(_))
    }

    /// Factor by which each dimension is divided.
    pub fn factor(&self) -> u32 {
        match self {
            Lod::Full => 1,
            Lod::Reduced(factor) => (*factor).max(1),
        }
    }
}

impl fmt::Display for Lod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lod::Full => write!(f, "full"),
            Lod::Reduced(factor) => write!(f, "1/{}", factor),
        }
    }
}

/// Hashable cache key: depths in micrometres, zoom in millionths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    top_um: i64,
    bottom_um: i64,
    zoom_q: i64,
    lod: Lod,
}

impl CacheKey {
    pub fn new(range: &DepthRange, zoom: f64, lod: Lod) -> Self {
        Self {
            top_um: quantize(range.top(), DEPTH_QUANTUM_PER_M),
            bottom_um: quantize(range.bottom(), DEPTH_QUANTUM_PER_M),
            zoom_q: quantize(zoom, ZOOM_QUANTUM),
            lod,
        }
    }

    /// The depth range this key covers, reconstructed from the quantized ends.
    pub fn range(&self) -> Option<DepthRange> {
        DepthRange::new(
            self.top_um as f64 / DEPTH_QUANTUM_PER_M,
            self.bottom_um as f64 / DEPTH_QUANTUM_PER_M,
        )
        .ok()
    }

    pub fn zoom(&self) -> f64 {
        self.zoom_q as f64 / ZOOM_QUANTUM
    }

    pub fn lod(&self) -> Lod {
        self.lod
    }
}

fn quantize(value: f64, quantum: f64) -> i64 {
    // `as` saturates on overflow and maps NaN to 0.
    (value * quantum).round() as i64
}

/// A rendered pixel buffer for one depth segment.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedSegment {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major.
    pub pixels: Vec<u8>,
    pub lod: Lod,
}

impl fmt::Debug for RenderedSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedSegment")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .field("lod", &self.lod)
            .finish()
    }
}

impl RenderedSegment {
    /// An opaque buffer of the given size filled with one color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4], lod: Lod) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * BYTES_PER_PIXEL)
            .collect();
        Self {
            width,
            height,
            pixels,
            lod,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }

    /// Whether the buffer is usable: non-empty and sized `width × height × 4`.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }
}

/// Shared handle to a cached segment.
pub type SegmentHandle = Arc<RenderedSegment>;

/// Configuration for the viewport cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Byte budget across all entries.
    pub budget_bytes: usize,
    /// Downsampling factor for reduced renders.
    pub reduced_factor: u32,
    /// Zoom below which renders use reduced detail.
    pub lod_zoom_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            budget_bytes: DEFAULT_BUDGET_BYTES,
            reduced_factor: DEFAULT_REDUCED_FACTOR,
            lod_zoom_threshold: DEFAULT_LOD_ZOOM_THRESHOLD,
        }
    }
}

impl CacheConfig {
    pub fn with_budget_bytes(mut self, budget_bytes: usize) -> Self {
        self.budget_bytes = budget_bytes;
        self
    }

    pub fn with_reduced_factor(mut self, factor: u32) -> Self {
        self.reduced_factor = factor.max(1);
        self
    }

    pub fn with_lod_zoom_threshold(mut self, threshold: f64) -> Self {
        self.lod_zoom_threshold = threshold;
        self
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
    /// Renders that failed validation.
    pub corrupt_renders: u64,
    /// Renders returned without being stored.
    pub uncached_renders: u64,
    pub entry_count: usize,
    pub total_bytes: usize,
    pub budget_bytes: usize,
    /// Whether caching was disabled after repeated corrupt renders.
    pub disabled: bool,
}

impl CacheStats {
    /// Hits over lookups, 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_quantization() {
        let a = DepthRange::new(10.0, 20.0).unwrap();
        let b = DepthRange::new(10.000_000_1, 20.0).unwrap();
        assert_eq!(CacheKey::new(&a, 1.0, Lod::Full), CacheKey::new(&b, 1.0, Lod::Full));
        assert_ne!(
            CacheKey::new(&a, 1.0, Lod::Full),
            CacheKey::new(&a, 1.0, Lod::Reduced(4))
        );
        assert_ne!(CacheKey::new(&a, 1.0, Lod::Full), CacheKey::new(&a, 1.1, Lod::Full));
    }

    #[test]
    fn test_key_range_roundtrip() {
        let range = DepthRange::new(12.5, 37.5).unwrap();
        let key = CacheKey::new(&range, 2.0, Lod::Full);
        assert_eq!(key.range(), Some(range));
        assert_eq!(key.zoom(), 2.0);
    }

    #[test]
    fn test_segment_validation() {
        assert!(RenderedSegment::filled(4, 2, [0, 0, 0, 255], Lod::Full).is_valid());
        assert!(!RenderedSegment::filled(0, 2, [0; 4], Lod::Full).is_valid());

        let mut truncated = RenderedSegment::filled(4, 2, [0; 4], Lod::Full);
        truncated.pixels.pop();
        assert!(!truncated.is_valid());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
