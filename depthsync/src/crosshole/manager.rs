//! Display-configuration sync across a group of open documents.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info, warn};

use super::display::{DisplayChange, DisplayConfig};
use super::settings::{SettingsStore, SyncSettings};
use crate::sync::{DebounceToken, TokenIssuer};

/// Identifies an open document within the sync group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Receives display changes mirrored from other documents.
///
/// A sink may publish its own changes back from inside this call; such
/// re-entrant publishes are dropped.
pub trait DisplaySink {
    fn apply_display_change(&self, change: &DisplayChange);
}

/// Sync participation of a registered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    Synced,
    /// Temporarily excluded: neither sends nor receives broadcasts.
    Overridden,
}

/// Counters for cross-document traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrossHoleStats {
    pub broadcasts: u64,
    pub deliveries: u64,
    pub suppressed: u64,
    pub dropped_reentrant: u64,
    pub persist_failures: u64,
}

struct Member {
    id: DocumentId,
    config: DisplayConfig,
    state: MemberState,
    sink: Rc<dyn DisplaySink>,
}

/// Mirrors curve selection and styling between documents.
///
/// Depth is never shared here; each document keeps its own viewport. Members
/// are kept in registration order, which is also the delivery order.
pub struct CrossHoleSyncManager {
    settings: RefCell<SyncSettings>,
    store: Box<dyn SettingsStore>,
    members: RefCell<Vec<Member>>,
    /// Configuration the synced members converge to.
    group: RefCell<Option<DisplayConfig>>,
    issuer: TokenIssuer,
    broadcasting: Cell<Option<DebounceToken>>,
    stats: Cell<CrossHoleStats>,
}

impl CrossHoleSyncManager {
    /// Create a manager with settings loaded from `store`.
    ///
    /// An unreadable store falls back to defaults.
    pub fn new(store: Box<dyn SettingsStore>) -> Self {
        let settings = match store.load() {
            Ok(Some(settings)) => settings,
            Ok(None) => SyncSettings::default(),
            Err(e) => {
                warn!(error = %e, "Failed to load sync settings, using defaults");
                SyncSettings::default()
            }
        };
        Self {
            settings: RefCell::new(settings),
            store,
            members: RefCell::new(Vec::new()),
            group: RefCell::new(None),
            issuer: TokenIssuer::new(),
            broadcasting: Cell::new(None),
            stats: Cell::new(CrossHoleStats::default()),
        }
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings.borrow().clone()
    }

    /// Replace the settings and persist them.
    pub fn set_settings(&self, settings: SyncSettings) {
        self.update_settings(|current| *current = settings);
    }

    /// Edit the settings in place and persist them. Persistence failures are
    /// logged, never returned.
    pub fn update_settings(&self, edit: impl FnOnce(&mut SyncSettings)) {
        let snapshot = {
            let mut settings = self.settings.borrow_mut();
            edit(&mut settings);
            settings.clone()
        };
        match self.store.save(&snapshot) {
            Ok(()) => info!(
                enabled = snapshot.enabled,
                auto_sync = snapshot.auto_sync,
                "Sync settings saved"
            ),
            Err(e) => {
                self.bump(|s| s.persist_failures += 1);
                warn!(error = %e, "Failed to persist sync settings");
            }
        }
    }

    /// Add a document to the group. Returns `false` if already registered.
    ///
    /// The first member's configuration seeds the group configuration.
    pub fn register(
        &self,
        id: DocumentId,
        config: DisplayConfig,
        sink: Rc<dyn DisplaySink>,
    ) -> bool {
        let mut members = self.members.borrow_mut();
        if members.iter().any(|m| m.id == id) {
            return false;
        }
        let mut group = self.group.borrow_mut();
        if group.is_none() {
            *group = Some(config.clone());
        }
        members.push(Member {
            id,
            config,
            state: MemberState::Synced,
            sink,
        });
        info!(document = %id, members = members.len(), "Document joined sync group");
        true
    }

    /// Remove a document. Returns `false` if it was not registered.
    pub fn unregister(&self, id: DocumentId) -> bool {
        let removed = {
            let mut members = self.members.borrow_mut();
            let before = members.len();
            members.retain(|m| m.id != id);
            let removed = members.len() != before;
            if members.is_empty() {
                *self.group.borrow_mut() = None;
            }
            removed
        };
        if removed {
            info!(document = %id, "Document left sync group");
        }
        removed
    }

    pub fn is_registered(&self, id: DocumentId) -> bool {
        self.members.borrow().iter().any(|m| m.id == id)
    }

    pub fn member_state(&self, id: DocumentId) -> Option<MemberState> {
        self.members
            .borrow()
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.state)
    }

    /// The manager's view of a document's display configuration.
    pub fn config(&self, id: DocumentId) -> Option<DisplayConfig> {
        self.members
            .borrow()
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.config.clone())
    }

    /// Registered documents in registration order.
    pub fn members(&self) -> Vec<(DocumentId, MemberState)> {
        self.members
            .borrow()
            .iter()
            .map(|m| (m.id, m.state))
            .collect()
    }

    pub fn group_config(&self) -> Option<DisplayConfig> {
        self.group.borrow().clone()
    }

    pub fn stats(&self) -> CrossHoleStats {
        self.stats.get()
    }

    /// Record a local change on `from` and mirror it to the other synced
    /// members. Returns the number of documents it was delivered to.
    pub fn publish_change(&self, from: DocumentId, change: DisplayChange) -> usize {
        if let Some(token) = self.broadcasting.get() {
            self.bump(|s| s.dropped_reentrant += 1);
            debug!(document = %from, token = %token, "Dropped re-entrant display change");
            return 0;
        }

        let settings = self.settings();
        let targets = {
            let mut members = self.members.borrow_mut();
            let Some(source) = members.iter_mut().find(|m| m.id == from) else {
                debug!(document = %from, "Change from unregistered document ignored");
                return 0;
            };
            source.config.apply(&change);
            if source.state == MemberState::Overridden {
                self.bump(|s| s.suppressed += 1);
                return 0;
            }
            if !(settings.enabled && settings.auto_sync && settings.allows(change.field())) {
                return 0;
            }

            if let Some(group) = self.group.borrow_mut().as_mut() {
                group.apply(&change);
            }
            members
                .iter_mut()
                .filter(|m| m.id != from && m.state == MemberState::Synced)
                .map(|m| {
                    m.config.apply(&change);
                    Rc::clone(&m.sink)
                })
                .collect::<Vec<_>>()
        };

        let delivered = self.deliver(&targets, std::slice::from_ref(&change));
        debug!(document = %from, field = ?change.field(), delivered, "Display change broadcast");
        delivered
    }

    /// Push `from`'s whole configuration to every other synced member,
    /// regardless of `auto_sync`. Returns the number of documents updated.
    pub fn sync_now(&self, from: DocumentId) -> usize {
        if self.broadcasting.get().is_some() {
            self.bump(|s| s.dropped_reentrant += 1);
            return 0;
        }
        let settings = self.settings();
        if !settings.enabled {
            return 0;
        }

        let deliveries = {
            let mut members = self.members.borrow_mut();
            let Some(source) = members.iter().find(|m| m.id == from) else {
                return 0;
            };
            if source.state == MemberState::Overridden {
                self.bump(|s| s.suppressed += 1);
                return 0;
            }
            let source_config = source.config.clone();

            let mut group = self.group.borrow_mut();
            let group = group.get_or_insert_with(DisplayConfig::default);
            for change in group.diff(&source_config) {
                if settings.allows(change.field()) {
                    group.apply(&change);
                }
            }

            members
                .iter_mut()
                .filter(|m| m.id != from && m.state == MemberState::Synced)
                .filter_map(|m| {
                    let changes = allowed_changes(&m.config, &source_config, &settings);
                    if changes.is_empty() {
                        return None;
                    }
                    for change in &changes {
                        m.config.apply(change);
                    }
                    Some((Rc::clone(&m.sink), changes))
                })
                .collect::<Vec<_>>()
        };

        let updated = deliveries.len();
        self.with_token(|| {
            for (sink, changes) in &deliveries {
                for change in changes {
                    sink.apply_display_change(change);
                }
            }
        });
        self.bump(|s| {
            s.broadcasts += 1;
            s.deliveries += updated as u64;
        });
        info!(document = %from, updated, "Manual sync pushed");
        updated
    }

    /// Hold or release a document's override. Returns `true` if the state
    /// changed. Releasing reconciles the document to the group configuration.
    pub fn set_override(&self, id: DocumentId, overridden: bool) -> bool {
        let settings = self.settings();
        let reconcile = {
            let mut members = self.members.borrow_mut();
            let Some(member) = members.iter_mut().find(|m| m.id == id) else {
                return false;
            };
            let wanted = if overridden {
                MemberState::Overridden
            } else {
                MemberState::Synced
            };
            if member.state == wanted {
                return false;
            }
            member.state = wanted;

            if overridden || !settings.enabled {
                None
            } else {
                let group = self.group.borrow();
                group.as_ref().map(|group| {
                    let changes = allowed_changes(&member.config, group, &settings);
                    for change in &changes {
                        member.config.apply(change);
                    }
                    (Rc::clone(&member.sink), changes)
                })
            }
        };

        match reconcile {
            Some((sink, changes)) => {
                let count = changes.len();
                self.with_token(|| {
                    for change in &changes {
                        sink.apply_display_change(change);
                    }
                });
                info!(document = %id, changes = count, "Override released, reconciled to group");
            }
            None if overridden => info!(document = %id, "Override held"),
            None => info!(document = %id, "Override released"),
        }
        true
    }

    /// Route a modifier key press/release. Returns `true` if it toggled the
    /// document's override.
    pub fn handle_modifier(&self, id: DocumentId, key: &str, pressed: bool) -> bool {
        let matches = self
            .settings
            .borrow()
            .override_key
            .eq_ignore_ascii_case(key.trim());
        matches && self.set_override(id, pressed)
    }

    fn deliver(&self, targets: &[Rc<dyn DisplaySink>], changes: &[DisplayChange]) -> usize {
        self.with_token(|| {
            for sink in targets {
                for change in changes {
                    sink.apply_display_change(change);
                }
            }
        });
        self.bump(|s| {
            s.broadcasts += 1;
            s.deliveries += targets.len() as u64;
        });
        targets.len()
    }

    fn with_token(&self, f: impl FnOnce()) {
        let token = self.issuer.issue(None);
        self.broadcasting.set(Some(token));
        f();
        self.broadcasting.set(None);
    }

    fn bump(&self, f: impl FnOnce(&mut CrossHoleStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl fmt::Debug for CrossHoleSyncManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossHoleSyncManager")
            .field("settings", &self.settings.borrow())
            .field("members", &self.members())
            .field("stats", &self.stats.get())
            .finish()
    }
}

fn allowed_changes(
    current: &DisplayConfig,
    target: &DisplayConfig,
    settings: &SyncSettings,
) -> Vec<DisplayChange> {
    current
        .diff(target)
        .into_iter()
        .filter(|change| settings.allows(change.field()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crosshole::display::{Color, CurveStyle};
    use crate::crosshole::settings::{MemoryStore, SettingsError};
    use std::sync::Arc;

    const D1: DocumentId = DocumentId(1);
    const D2: DocumentId = DocumentId(2);
    const D3: DocumentId = DocumentId(3);

    #[derive(Default)]
    struct RecordingSink {
        received: RefCell<Vec<DisplayChange>>,
    }

    impl DisplaySink for RecordingSink {
        fn apply_display_change(&self, change: &DisplayChange) {
            self.received.borrow_mut().push(change.clone());
        }
    }

    /// Publishes every received change back, like a view that reports its edits.
    struct EchoSink {
        manager: Rc<CrossHoleSyncManager>,
        id: DocumentId,
        received: Cell<usize>,
    }

    impl DisplaySink for EchoSink {
        fn apply_display_change(&self, change: &DisplayChange) {
            self.received.set(self.received.get() + 1);
            self.manager.publish_change(self.id, change.clone());
        }
    }

    struct FailingStore;

    impl SettingsStore for FailingStore {
        fn load(&self) -> Result<Option<SyncSettings>, SettingsError> {
            Err(SettingsError::NoConfigDir)
        }

        fn save(&self, _settings: &SyncSettings) -> Result<(), SettingsError> {
            Err(SettingsError::NoConfigDir)
        }
    }

    fn gr_config() -> DisplayConfig {
        DisplayConfig::new().with_curve("GR", CurveStyle::default())
    }

    fn red_gr() -> DisplayChange {
        DisplayChange::Color {
            curve: "GR".into(),
            color: Color::rgb(255, 0, 0),
        }
    }

    fn manager() -> CrossHoleSyncManager {
        CrossHoleSyncManager::new(Box::new(MemoryStore::new()))
    }

    fn with_two(manager: &CrossHoleSyncManager) -> (Rc<RecordingSink>, Rc<RecordingSink>) {
        let s1 = Rc::new(RecordingSink::default());
        let s2 = Rc::new(RecordingSink::default());
        assert!(manager.register(D1, gr_config(), s1.clone()));
        assert!(manager.register(D2, gr_config(), s2.clone()));
        (s1, s2)
    }

    #[test]
    fn test_color_change_reaches_other_document() {
        let manager = manager();
        let (s1, s2) = with_two(&manager);

        assert_eq!(manager.publish_change(D1, red_gr()), 1);
        assert_eq!(*s2.received.borrow(), vec![red_gr()]);
        assert!(s1.received.borrow().is_empty());
        assert_eq!(
            manager.config(D2).unwrap().style("GR").unwrap().color,
            Color::rgb(255, 0, 0)
        );
    }

    #[test]
    fn test_overridden_source_does_not_broadcast() {
        let manager = manager();
        let (_s1, s2) = with_two(&manager);

        assert!(manager.set_override(D1, true));
        assert_eq!(manager.publish_change(D1, red_gr()), 0);
        assert!(s2.received.borrow().is_empty());
        assert_eq!(manager.stats().suppressed, 1);
    }

    #[test]
    fn test_overridden_target_ignores_broadcast() {
        let manager = manager();
        let (_s1, s2) = with_two(&manager);

        manager.set_override(D2, true);
        assert_eq!(manager.publish_change(D1, red_gr()), 0);
        assert!(s2.received.borrow().is_empty());
    }

    #[test]
    fn test_release_reconciles_to_group() {
        let manager = manager();
        let (_s1, s2) = with_two(&manager);

        manager.set_override(D2, true);
        manager.publish_change(D1, red_gr());
        assert!(s2.received.borrow().is_empty());

        assert!(manager.set_override(D2, false));
        assert_eq!(*s2.received.borrow(), vec![red_gr()]);
        assert_eq!(manager.member_state(D2), Some(MemberState::Synced));
    }

    #[test]
    fn test_release_discards_local_override_edits() {
        let manager = manager();
        let (_s1, s2) = with_two(&manager);

        manager.set_override(D2, true);
        let blue = DisplayChange::Color {
            curve: "GR".into(),
            color: Color::rgb(0, 0, 255),
        };
        manager.publish_change(D2, blue);
        manager.set_override(D2, false);

        assert_eq!(
            s2.received.borrow().last(),
            Some(&DisplayChange::Color {
                curve: "GR".into(),
                color: Color::BLACK,
            })
        );
    }

    #[test]
    fn test_field_flag_gates_broadcast() {
        let manager = manager();
        let (_s1, s2) = with_two(&manager);
        manager.update_settings(|s| s.sync_colors = false);

        assert_eq!(manager.publish_change(D1, red_gr()), 0);
        let thicker = DisplayChange::Thickness {
            curve: "GR".into(),
            thickness: 3.0,
        };
        assert_eq!(manager.publish_change(D1, thicker.clone()), 1);
        assert_eq!(*s2.received.borrow(), vec![thicker]);
    }

    #[test]
    fn test_auto_sync_off_requires_sync_now() {
        let manager = manager();
        let (_s1, s2) = with_two(&manager);
        manager.update_settings(|s| s.auto_sync = false);

        assert_eq!(manager.publish_change(D1, red_gr()), 0);
        assert!(s2.received.borrow().is_empty());

        assert_eq!(manager.sync_now(D1), 1);
        assert_eq!(*s2.received.borrow(), vec![red_gr()]);
        assert_eq!(manager.sync_now(D1), 0);
    }

    #[test]
    fn test_disabled_blocks_everything() {
        let manager = manager();
        let (_s1, s2) = with_two(&manager);
        manager.update_settings(|s| s.enabled = false);

        assert_eq!(manager.publish_change(D1, red_gr()), 0);
        assert_eq!(manager.sync_now(D1), 0);
        assert!(s2.received.borrow().is_empty());
    }

    #[test]
    fn test_reentrant_publish_dropped() {
        let manager = Rc::new(manager());
        let s1 = Rc::new(RecordingSink::default());
        let echo = Rc::new(EchoSink {
            manager: Rc::clone(&manager),
            id: D2,
            received: Cell::new(0),
        });
        let s3 = Rc::new(RecordingSink::default());
        manager.register(D1, gr_config(), s1.clone());
        manager.register(D2, gr_config(), echo.clone());
        manager.register(D3, gr_config(), s3.clone());

        assert_eq!(manager.publish_change(D1, red_gr()), 2);
        assert_eq!(echo.received.get(), 1);
        assert_eq!(s3.received.borrow().len(), 1);
        assert!(s1.received.borrow().is_empty());
        assert_eq!(manager.stats().dropped_reentrant, 1);

        // The sink holds a strong reference back to the manager.
        manager.unregister(D2);
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        struct OrderSink(DocumentId, Rc<RefCell<Vec<DocumentId>>>);
        impl DisplaySink for OrderSink {
            fn apply_display_change(&self, _change: &DisplayChange) {
                self.1.borrow_mut().push(self.0);
            }
        }

        let manager = manager();
        for id in [D3, D1, D2] {
            manager.register(id, gr_config(), Rc::new(OrderSink(id, Rc::clone(&order))));
        }
        manager.publish_change(D1, red_gr());
        assert_eq!(*order.borrow(), vec![D3, D2]);
    }

    #[test]
    fn test_modifier_toggles_override() {
        let manager = manager();
        with_two(&manager);

        assert!(!manager.handle_modifier(D1, "Ctrl", true));
        assert!(manager.handle_modifier(D1, "alt", true));
        assert_eq!(manager.member_state(D1), Some(MemberState::Overridden));
        assert!(manager.handle_modifier(D1, "Alt", false));
        assert_eq!(manager.member_state(D1), Some(MemberState::Synced));
    }

    #[test]
    fn test_register_and_unregister() {
        let manager = manager();
        with_two(&manager);
        assert!(!manager.register(D1, gr_config(), Rc::new(RecordingSink::default())));
        assert_eq!(
            manager.members(),
            vec![(D1, MemberState::Synced), (D2, MemberState::Synced)]
        );

        assert!(manager.unregister(D1));
        assert!(!manager.unregister(D1));
        assert_eq!(manager.publish_change(D1, red_gr()), 0);
        manager.unregister(D2);
        assert!(manager.group_config().is_none());
    }

    #[test]
    fn test_settings_persist_through_store() {
        let store = Arc::new(MemoryStore::new());
        struct Shared(Arc<MemoryStore>);
        impl SettingsStore for Shared {
            fn load(&self) -> Result<Option<SyncSettings>, SettingsError> {
                self.0.load()
            }
            fn save(&self, settings: &SyncSettings) -> Result<(), SettingsError> {
                self.0.save(settings)
            }
        }

        let manager = CrossHoleSyncManager::new(Box::new(Shared(Arc::clone(&store))));
        manager.update_settings(|s| s.sync_styles = false);
        assert_eq!(store.save_count(), 1);
        assert!(!store.stored().unwrap().sync_styles);

        let reloaded = CrossHoleSyncManager::new(Box::new(Shared(store)));
        assert!(!reloaded.settings().sync_styles);
    }

    #[test]
    fn test_persist_failure_is_not_fatal() {
        let manager = CrossHoleSyncManager::new(Box::new(FailingStore));
        assert_eq!(manager.settings(), SyncSettings::default());
        manager.update_settings(|s| s.auto_sync = false);
        assert!(!manager.settings().auto_sync);
        assert_eq!(manager.stats().persist_failures, 1);
    }
}
