//! Depth-chunked data streaming.
//!
//! Well logs can be far larger than what is on screen. The document's depth
//! axis is split into fixed-span chunks (`index = ⌊depth / span⌋`) that are
//! read from a [`SampleSource`] on demand, kept in a bounded LRU table, and
//! prefetched in the background around the visible window.
//!
//! Missing data is a value, not an error: a chunk the source cannot supply is
//! [`ChunkStatus::Unavailable`], and a non-finite curve value is
//! [`Reading::NoData`].

mod chunk;
mod manager;
mod source;

pub use chunk::{
    chunk_index, chunk_range, chunks_covering, ChunkStatus, DepthChunk, SourceError,
};
pub use manager::{
    DataStreamManager, StreamConfig, StreamStats, DEFAULT_CHUNK_SPAN_M, DEFAULT_MAX_LOADED_CHUNKS,
    DEFAULT_PREFETCH_CHUNKS,
};
pub use source::{DepthSample, InMemorySource, Reading, SampleRead, SampleSource};
