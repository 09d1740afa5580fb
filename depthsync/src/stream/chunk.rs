//! Fixed-span depth chunks.

use std::ops::RangeInclusive;

use thiserror::Error;
use tracing::warn;

use super::source::{DepthSample, SampleRead, SampleSource};
use crate::coord::DepthRange;

/// Why a background load produced no chunk.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Chunk {0} load cancelled")]
    Cancelled(u64),

    #[error("Chunk {index} load task failed: {reason}")]
    TaskFailed { index: u64, reason: String },
}

/// Whether a chunk holds data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Loaded,
    /// The source had no data for this span; a typed gap, not an error.
    Unavailable,
}

/// The samples for one fixed depth span.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthChunk {
    pub index: u64,
    pub range: DepthRange,
    pub samples: Vec<DepthSample>,
    pub status: ChunkStatus,
}

impl DepthChunk {
    /// Read chunk `index` from `source`.
    pub fn load(source: &dyn SampleSource, index: u64, span_m: f64) -> Self {
        let range = chunk_range(index, span_m);
        match source.read_samples(range.top(), range.bottom()) {
            SampleRead::Samples(mut samples) => {
                samples.retain(|s| s.depth.is_finite());
                for sample in &mut samples {
                    sample.normalize();
                }
                Self {
                    index,
                    range,
                    samples,
                    status: ChunkStatus::Loaded,
                }
            }
            SampleRead::NoData => {
                warn!(chunk = index, range = %range, "No data for chunk");
                Self::unavailable(index, span_m)
            }
        }
    }

    /// An empty chunk marking a gap.
    pub fn unavailable(index: u64, span_m: f64) -> Self {
        Self {
            index,
            range: chunk_range(index, span_m),
            samples: Vec::new(),
            status: ChunkStatus::Unavailable,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.status == ChunkStatus::Loaded
    }

    pub fn sample_depths(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.depth)
    }
}

/// Index of the chunk containing `depth`. Negative depths map to chunk 0.
pub fn chunk_index(depth: f64, span_m: f64) -> u64 {
    let index = (depth / span_m).floor();
    if index.is_finite() && index > 0.0 {
        index as u64
    } else {
        0
    }
}

/// Depth range `[index·span, (index+1)·span)` of a chunk.
pub fn chunk_range(index: u64, span_m: f64) -> DepthRange {
    let top = index as f64 * span_m;
    DepthRange::new_unchecked(top, top + span_m)
}

/// Indices of the chunks overlapping `range`.
pub fn chunks_covering(range: &DepthRange, span_m: f64) -> RangeInclusive<u64> {
    let first = chunk_index(range.top(), span_m);
    let end = (range.bottom() / span_m).ceil();
    let last = if end.is_finite() && end >= 1.0 {
        (end as u64 - 1).max(first)
    } else {
        first
    };
    first..=last
}
