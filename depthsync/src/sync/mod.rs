//! Pane synchronization.
//!
//! Three synchronizers bind rendering panes to a document's
//! [`DepthStateManager`](crate::state::DepthStateManager):
//!
//! - [`ScrollSynchronizer`]: viewport and zoom, driven by wheel and drag
//! - [`SelectionSynchronizer`]: selection, driven by Shift+drag and Shift+click
//! - [`DepthSynchronizer`]: cursor, driven by click
//!
//! Panes are never wired to each other. Input flows pane → synchronizer →
//! manager, and the manager's single notification flows back out to the
//! other panes. [`DebounceToken`]s stamped on each forwarded operation stop
//! an echoing pane from bouncing the change back.

mod pane;
mod synchronizer;
mod token;

pub use pane::{DepthPane, Modifiers, PaneEvent, PaneId};
pub use synchronizer::{
    DepthSynchronizer, ScrollSynchronizer, SelectionSynchronizer, SharedManager, SharedPane,
    SyncStats, Synchronizer,
};
pub use token::{DebounceToken, IssuerId, TokenIssuer};
