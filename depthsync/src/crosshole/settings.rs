//! Persisted cross-hole sync settings.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::display::SyncField;

/// Default modifier key that holds a per-document override.
pub const DEFAULT_OVERRIDE_KEY: &str = "Alt";

/// Settings file name under the depthsync config directory.
pub const SETTINGS_FILE_NAME: &str = "sync.json";

/// Errors from reading, writing or editing sync settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown sync setting '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for sync setting '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Could not determine a config directory")]
    NoConfigDir,
}

/// Which display fields are mirrored across documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub enabled: bool,
    pub sync_selection: bool,
    pub sync_colors: bool,
    pub sync_styles: bool,
    pub sync_thickness: bool,
    pub sync_visibility: bool,
    pub auto_sync: bool,
    pub override_key: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_selection: true,
            sync_colors: true,
            sync_styles: true,
            sync_thickness: true,
            sync_visibility: true,
            auto_sync: true,
            override_key: DEFAULT_OVERRIDE_KEY.to_string(),
        }
    }
}

impl SyncSettings {
    /// Setting names accepted by [`SyncSettings::get`] and [`SyncSettings::set`].
    pub const KEYS: [&'static str; 8] = [
        "enabled",
        "sync_selection",
        "sync_colors",
        "sync_styles",
        "sync_thickness",
        "sync_visibility",
        "auto_sync",
        "override_key",
    ];

    /// Whether changes to `field` are mirrored. Ignores `enabled`.
    pub fn allows(&self, field: SyncField) -> bool {
        match field {
            SyncField::Selection => self.sync_selection,
            SyncField::Colors => self.sync_colors,
            SyncField::Styles => self.sync_styles,
            SyncField::Thickness => self.sync_thickness,
            SyncField::Visibility => self.sync_visibility,
        }
    }

    /// Read a setting by name as text.
    pub fn get(&self, key: &str) -> Result<String, SettingsError> {
        let value = match key {
            "override_key" => return Ok(self.override_key.clone()),
            _ => *self.flag(key)?,
        };
        Ok(value.to_string())
    }

    /// Update a setting by name from text.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        if key == "override_key" {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(SettingsError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
            self.override_key = trimmed.to_string();
            return Ok(());
        }

        let parsed = parse_bool(value).ok_or_else(|| SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        })?;
        *self.flag_mut(key)? = parsed;
        Ok(())
    }

    fn flag(&self, key: &str) -> Result<&bool, SettingsError> {
        Ok(match key {
            "enabled" => &self.enabled,
            "sync_selection" => &self.sync_selection,
            "sync_colors" => &self.sync_colors,
            "sync_styles" => &self.sync_styles,
            "sync_thickness" => &self.sync_thickness,
            "sync_visibility" => &self.sync_visibility,
            "auto_sync" => &self.auto_sync,
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        })
    }

    fn flag_mut(&mut self, key: &str) -> Result<&mut bool, SettingsError> {
        Ok(match key {
            "enabled" => &mut self.enabled,
            "sync_selection" => &mut self.sync_selection,
            "sync_colors" => &mut self.sync_colors,
            "sync_styles" => &mut self.sync_styles,
            "sync_thickness" => &mut self.sync_thickness,
            "sync_visibility" => &mut self.sync_visibility,
            "auto_sync" => &mut self.auto_sync,
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Where sync settings live between sessions.
pub trait SettingsStore {
    /// Load stored settings; `Ok(None)` if nothing has been saved yet.
    fn load(&self) -> Result<Option<SyncSettings>, SettingsError>;

    fn save(&self, settings: &SyncSettings) -> Result<(), SettingsError>;
}

/// Settings stored as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.config/depthsync/sync.json` (platform config dir).
    pub fn at_default_location() -> Result<Self, SettingsError> {
        default_settings_path()
            .map(Self::new)
            .ok_or(SettingsError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Option<SyncSettings>, SettingsError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|source| SettingsError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, settings: &SyncSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        // Write to a temp file, then rename so a crash never leaves half a file.
        let tmp_path = self.path.with_extension("tmp");
        let file = File::create(&tmp_path).map_err(|e| self.io_error(e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, settings).map_err(|source| {
            SettingsError::Parse {
                path: tmp_path.clone(),
                source,
            }
        })?;
        writer.flush().map_err(|e| self.io_error(e))?;
        drop(writer);

        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))
    }
}

/// Default settings path, if the platform has a config directory.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("depthsync").join(SETTINGS_FILE_NAME))
}

/// Settings kept in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    stored: Mutex<Option<SyncSettings>>,
    saves: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: SyncSettings) -> Self {
        Self {
            stored: Mutex::new(Some(settings)),
            saves: Mutex::new(0),
        }
    }

    pub fn stored(&self) -> Option<SyncSettings> {
        self.stored.lock().clone()
    }

    pub fn save_count(&self) -> u64 {
        *self.saves.lock()
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Option<SyncSettings>, SettingsError> {
        Ok(self.stored.lock().clone())
    }

    fn save(&self, settings: &SyncSettings) -> Result<(), SettingsError> {
        *self.stored.lock() = Some(settings.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
