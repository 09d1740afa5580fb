//! Rendering pane interface and raw pane input.

use std::fmt;

use crate::coord::DepthRange;

/// Identity of a pane bound to a synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneId(pub u32);

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pane#{}", self.0)
    }
}

/// Keyboard modifiers held during a pane event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: false,
    };

    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        shift: false,
        alt: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        ctrl: false,
        shift: true,
        alt: false,
    };

    pub const ALT: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: true,
    };
}

/// Raw input from a pane, in pane pixel rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaneEvent {
    /// Mouse wheel; 120 units per notch.
    Wheel { delta: f64, modifiers: Modifiers },
    /// Drag from one row to another.
    Drag {
        start_px: f64,
        end_px: f64,
        modifiers: Modifiers,
    },
    /// Single click at a row.
    Click { px: f64, modifiers: Modifiers },
    /// End of a drag; a fast drag keeps moving under inertia.
    Release,
}

impl PaneEvent {
    pub fn modifiers(&self) -> Modifiers {
        match self {
            PaneEvent::Wheel { modifiers, .. }
            | PaneEvent::Drag { modifiers, .. }
            | PaneEvent::Click { modifiers, .. } => *modifiers,
            PaneEvent::Release => Modifiers::NONE,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            PaneEvent::Wheel { .. } => "wheel",
            PaneEvent::Drag { .. } => "drag",
            PaneEvent::Click { .. } => "click",
            PaneEvent::Release => "release",
        }
    }
}

/// A surface that renders part of a document against the shared depth state.
///
/// The `apply_*` methods are passive entry points: they update what the pane
/// shows and must not call back into the state manager. A pane that reports
/// its own scroll position back through [`PaneEvent`]s while applying is
/// tolerated; the synchronizer drops such echoes.
pub trait DepthPane {
    fn apply_viewport(&mut self, range: DepthRange);

    fn apply_cursor(&mut self, depth: f64);

    fn apply_selection(&mut self, selection: Option<DepthRange>);

    fn apply_zoom(&mut self, zoom: f64);
}
