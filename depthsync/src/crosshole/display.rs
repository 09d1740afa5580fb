//! Display configuration mirrored between documents.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = String;

    /// Parse `#rrggbb` or `rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("Invalid color '{}': expected #rrggbb", s));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| format!("Invalid color '{}': expected #rrggbb", s))
        };
        Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// How a curve line is drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

/// Per-curve display settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveStyle {
    pub color: Color,
    pub style: LineStyle,
    pub thickness: f64,
    pub visible: bool,
}

impl Default for CurveStyle {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            style: LineStyle::Solid,
            thickness: 1.0,
            visible: true,
        }
    }
}

/// Which display field a change touches; each is gated by its own sync flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncField {
    Selection,
    Colors,
    Styles,
    Thickness,
    Visibility,
}

/// One display-configuration change. Never carries depth.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayChange {
    CurveSelection(Vec<String>),
    Color { curve: String, color: Color },
    Style { curve: String, style: LineStyle },
    Thickness { curve: String, thickness: f64 },
    Visibility { curve: String, visible: bool },
}

impl DisplayChange {
    pub fn field(&self) -> SyncField {
        match self {
            DisplayChange::CurveSelection(_) => SyncField::Selection,
            DisplayChange::Color { .. } => SyncField::Colors,
            DisplayChange::Style { .. } => SyncField::Styles,
            DisplayChange::Thickness { .. } => SyncField::Thickness,
            DisplayChange::Visibility { .. } => SyncField::Visibility,
        }
    }
}

/// Selected curves plus per-curve styling for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub selected_curves: Vec<String>,
    pub curves: BTreeMap<String, CurveStyle>,
}

impl DisplayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a curve with the given style and select it.
    pub fn with_curve(mut self, name: impl Into<String>, style: CurveStyle) -> Self {
        let name = name.into();
        if !self.selected_curves.contains(&name) {
            self.selected_curves.push(name.clone());
        }
        self.curves.insert(name, style);
        self
    }

    pub fn style(&self, curve: &str) -> Option<&CurveStyle> {
        self.curves.get(curve)
    }

    /// Apply a change. Returns `true` if anything changed.
    ///
    /// Style changes for an unknown curve add it with default styling first.
    pub fn apply(&mut self, change: &DisplayChange) -> bool {
        match change {
            DisplayChange::CurveSelection(curves) => {
                if self.selected_curves == *curves {
                    return false;
                }
                self.selected_curves = curves.clone();
                true
            }
            DisplayChange::Color { curve, color } => {
                replace(&mut self.curves.entry(curve.clone()).or_default().color, *color)
            }
            DisplayChange::Style { curve, style } => {
                replace(&mut self.curves.entry(curve.clone()).or_default().style, *style)
            }
            DisplayChange::Thickness { curve, thickness } => replace(
                &mut self.curves.entry(curve.clone()).or_default().thickness,
                *thickness,
            ),
            DisplayChange::Visibility { curve, visible } => {
                replace(&mut self.curves.entry(curve.clone()).or_default().visible, *visible)
            }
        }
    }

    /// Changes that turn `self` into `target`, for curves `target` knows.
    pub fn diff(&self, target: &DisplayConfig) -> Vec<DisplayChange> {
        let mut changes = Vec::new();
        if self.selected_curves != target.selected_curves {
            changes.push(DisplayChange::CurveSelection(target.selected_curves.clone()));
        }
        for (curve, wanted) in &target.curves {
            let current = self.curves.get(curve).copied().unwrap_or_default();
            if current.color != wanted.color {
                changes.push(DisplayChange::Color {
                    curve: curve.clone(),
                    color: wanted.color,
                });
            }
            if current.style != wanted.style {
                changes.push(DisplayChange::Style {
                    curve: curve.clone(),
                    style: wanted.style,
                });
            }
            if current.thickness != wanted.thickness {
                changes.push(DisplayChange::Thickness {
                    curve: curve.clone(),
                    thickness: wanted.thickness,
                });
            }
            if current.visible != wanted.visible {
                changes.push(DisplayChange::Visibility {
                    curve: curve.clone(),
                    visible: wanted.visible,
                });
            }
        }
        changes
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
