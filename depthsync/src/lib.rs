//! DepthSync - depth-synchronized viewports for well-log panes
//!
//! This library keeps any number of rendering panes (log tracks, lithology
//! columns, annotations) showing the same depth window of one document. A
//! single [`DepthStateManager`](state::DepthStateManager) per document owns
//! viewport, cursor, selection and zoom; synchronizers translate pane input
//! into state changes and push each change back into the other panes exactly
//! once. Around that core sit a rendered-segment cache, a scroll optimizer,
//! a chunked data stream with background prefetch, and cross-document sync
//! of display settings.
//!
//! Start with [`app::ViewportEngine`], which wires everything per document.

pub mod app;
pub mod cache;
pub mod config;
pub mod coord;
pub mod crosshole;
pub mod logging;
pub mod scroll;
pub mod state;
pub mod stream;
pub mod sync;
pub mod telemetry;
pub mod timing;

/// Library version, from Cargo metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
