//! Application root and per-document sessions.
//!
//! [`ViewportEngine`] owns the one [`CrossHoleSyncManager`] shared by all open
//! documents and a [`DocumentSession`] per document. Each session wires one
//! depth state manager to its three synchronizers, viewport cache, scroll
//! optimizer and data stream, and drives them once per frame.
//!
//! ```text
//! ┌──────────────────────── ViewportEngine ─────────────────────────┐
//! │  CrossHoleSyncManager  (display config across documents)        │
//! │                                                                  │
//! │  DocumentSession ×N                                              │
//! │    DepthStateManager ◄── Scroll/Selection/Depth synchronizers ──►│ panes
//! │    ScrollOptimizer ──► pan, LOD, prefetch direction              │
//! │    ViewportCacheManager (rendered segments)                      │
//! │    DataStreamManager ──► tokio blocking pool (prefetch)          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`CrossHoleSyncManager`]: crate::crosshole::CrossHoleSyncManager

mod config;
mod engine;
mod error;
mod session;

pub use config::EngineConfig;
pub use engine::ViewportEngine;
pub use error::EngineError;
pub use session::{render_strip, DocumentSession, FrameReport, RenderRequest, STRIP_WIDTH_PX};
