//! Session telemetry.
//!
//! Frame timing and a diagnostics snapshot gathered from the cache, the
//! synchronizers and the stream manager of one document session.
//!
//! ```text
//! frame(now) ──► FrameRateMeter ─┐
//! cache / sync / stream stats ───┴──► Diagnostics ──► CLI, logs
//! ```

mod fps;
mod snapshot;

pub use fps::{FrameRateMeter, DEFAULT_FPS_WINDOW};
pub use snapshot::{format_bytes, Diagnostics};
