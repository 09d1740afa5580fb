//! Typed change notifications emitted by the state manager.
//!
//! Each event kind has its own observer trait, registered explicitly. Events
//! carry the new value so observers never need to read back from the manager
//! while it is emitting.

use std::rc::{Rc, Weak};

use crate::coord::DepthRange;
use crate::sync::DebounceToken;

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// The visible window changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportChanged {
    /// New visible window.
    pub range: DepthRange,
    /// Scale that maps the window onto the viewport height.
    pub scale_px_per_m: f64,
    /// Manager revision after this change.
    pub revision: u64,
    /// Token of the synchronizer operation that caused the change, if any.
    pub origin: Option<DebounceToken>,
}

/// The cursor moved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorChanged {
    pub depth: f64,
    pub revision: u64,
    pub origin: Option<DebounceToken>,
}

/// The selection was set or cleared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionChanged {
    pub selection: Option<DepthRange>,
    pub revision: u64,
    pub origin: Option<DebounceToken>,
}

/// The zoom multiplier changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomChanged {
    pub zoom: f64,
    pub scale_px_per_m: f64,
    pub revision: u64,
    pub origin: Option<DebounceToken>,
}

/// Receives [`ViewportChanged`] notifications.
pub trait ViewportObserver {
    fn on_viewport_changed(&self, event: &ViewportChanged);
}

/// Receives [`CursorChanged`] notifications.
pub trait CursorObserver {
    fn on_cursor_changed(&self, event: &CursorChanged);
}

/// Receives [`SelectionChanged`] notifications.
pub trait SelectionObserver {
    fn on_selection_changed(&self, event: &SelectionChanged);
}

/// Receives [`ZoomChanged`] notifications.
pub trait ZoomObserver {
    fn on_zoom_changed(&self, event: &ZoomChanged);
}

/// Weakly held observers of one event kind, in subscription order.
pub(crate) struct ObserverList<T: ?Sized> {
    entries: Vec<(SubscriptionId, Weak<T>)>,
}

impl<T: ?Sized> Default for ObserverList<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: ?Sized> ObserverList<T> {
    pub(crate) fn add(&mut self, id: SubscriptionId, observer: Weak<T>) {
        self.entries.push((id, observer));
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Upgrade every live observer, pruning dropped ones.
    ///
    /// The returned list is detached from `self`, so observers can be called
    /// without holding a borrow of the list.
    pub(crate) fn live(&mut self) -> Vec<Rc<T>> {
        self.entries.retain(|(_, observer)| observer.strong_count() > 0);
        self.entries
            .iter()
            .filter_map(|(_, observer)| observer.upgrade())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, observer)| observer.strong_count() > 0)
            .count()
    }
}
