//! Per-document depth state.
//!
//! A [`DepthStateManager`] is the single source of truth for what one open
//! document shows: viewport range, cursor depth, selection and zoom. Panes
//! never talk to each other; they subscribe to the manager through the typed
//! observer traits in [`events`] and are driven by its notifications.

mod config;
mod events;
mod manager;

pub use config::{
    StateConfig, DEFAULT_BASE_SCALE_PX_PER_M, DEFAULT_DOCUMENT_MAX_DEPTH, DEFAULT_MAX_ZOOM,
    DEFAULT_MIN_ZOOM, DEFAULT_SNAP_TOLERANCE_M, DEFAULT_SNAP_UNIT_M, DEFAULT_VIEWPORT_HEIGHT_PX,
    DEFAULT_WHEEL_ZOOM_STEP, WHEEL_UNITS_PER_NOTCH,
};
pub use events::{
    CursorChanged, CursorObserver, SelectionChanged, SelectionObserver, SubscriptionId,
    ViewportChanged, ViewportObserver, ZoomChanged, ZoomObserver,
};
pub use manager::{DepthState, DepthStateManager};
