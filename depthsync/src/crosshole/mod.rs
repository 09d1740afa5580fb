//! Cross-hole display sync.
//!
//! Several well documents can be open side by side. When one changes which
//! curves are shown or how they are drawn, [`CrossHoleSyncManager`] mirrors the
//! change into the others, gated per field by [`SyncSettings`]. A document can
//! hold a temporary override (by default while Alt is down) to diverge; on
//! release it snaps back to the group configuration.

mod display;
mod manager;
mod settings;

pub use display::{Color, CurveStyle, DisplayChange, DisplayConfig, LineStyle, SyncField};
pub use manager::{CrossHoleStats, CrossHoleSyncManager, DisplaySink, DocumentId, MemberState};
pub use settings::{
    default_settings_path, JsonFileStore, MemoryStore, SettingsError, SettingsStore,
    SyncSettings, DEFAULT_OVERRIDE_KEY, SETTINGS_FILE_NAME,
};
