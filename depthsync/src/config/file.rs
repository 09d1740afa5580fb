//! INI configuration file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::app::EngineConfig;
use crate::cache::CacheConfig;
use crate::logging::LoggingConfig;
use crate::scroll::ScrollConfig;
use crate::state::StateConfig;
use crate::stream::StreamConfig;

/// Config file name under the depthsync config directory.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors reading, writing or editing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// Directory holding depthsync's config files.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("depthsync")
}

/// Path of the INI config file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// `[viewport]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportSettings {
    pub height_px: f64,
    pub base_scale_px_per_m: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub wheel_zoom_step: f64,
    pub wheel_pan_px_per_unit: f64,
    pub snap_tolerance_m: f64,
    pub snap_unit_m: f64,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        let state = StateConfig::default();
        Self {
            height_px: state.viewport_height_px,
            base_scale_px_per_m: state.base_scale_px_per_m,
            min_zoom: state.min_zoom,
            max_zoom: state.max_zoom,
            wheel_zoom_step: state.wheel_zoom_step,
            wheel_pan_px_per_unit: state.wheel_pan_px_per_unit,
            snap_tolerance_m: state.snap_tolerance_m,
            snap_unit_m: state.snap_unit_m,
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub budget_bytes: usize,
    pub reduced_factor: u32,
    pub lod_zoom_threshold: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let cache = CacheConfig::default();
        Self {
            budget_bytes: cache.budget_bytes,
            reduced_factor: cache.reduced_factor,
            lod_zoom_threshold: cache.lod_zoom_threshold,
        }
    }
}

/// `[scroll]` section. Durations are whole milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollSettings {
    pub frame_interval_ms: u64,
    pub fast_velocity_px_per_s: f64,
    pub quiet_period_ms: u64,
    pub inertia_time_constant_ms: u64,
    pub prefetch_screens: f64,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        let scroll = ScrollConfig::default();
        Self {
            frame_interval_ms: scroll.frame_interval.as_millis() as u64,
            fast_velocity_px_per_s: scroll.fast_velocity_px_per_s,
            quiet_period_ms: scroll.quiet_period.as_millis() as u64,
            inertia_time_constant_ms: scroll.inertia_time_constant.as_millis() as u64,
            prefetch_screens: scroll.prefetch_screens,
        }
    }
}

/// `[stream]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    pub chunk_span_m: f64,
    pub max_loaded_chunks: u64,
    pub prefetch_chunks: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        let stream = StreamConfig::default();
        Self {
            chunk_span_m: stream.chunk_span_m,
            max_loaded_chunks: stream.max_loaded_chunks,
            prefetch_chunks: stream.prefetch_chunks,
        }
    }
}

/// The whole configuration file.
///
/// Missing sections and keys keep their defaults, so a partial file is valid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub viewport: ViewportSettings,
    pub cache: CacheSettings,
    pub scroll: ScrollSettings,
    pub stream: StreamSettings,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Load from the default path. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Build from parsed INI. Every present value is validated.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in super::ConfigKey::all() {
            if let Some(value) = ini
                .section(Some(key.section()))
                .and_then(|section| section.get(key.key_name()))
            {
                key.set(&mut config, value)?;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Check constraints spanning more than one setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.viewport.min_zoom > self.viewport.max_zoom {
            return Err(ConfigError::InvalidValue {
                key: "viewport.min_zoom".to_string(),
                value: self.viewport.min_zoom.to_string(),
                reason: format!("must not exceed max_zoom ({})", self.viewport.max_zoom),
            });
        }
        Ok(())
    }

    /// Save to the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, writing a temp file first and renaming it into place.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }

        let tmp_path = path.with_extension("tmp");
        self.to_ini().write_to_file(&tmp_path).map_err(write_error)?;
        fs::rename(&tmp_path, path).map_err(write_error)
    }

    /// Render every setting as INI.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in super::ConfigKey::all() {
            let value = key.get(self);
            // Unset optional values are left out.
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini
    }

    /// Component configuration for the engine.
    pub fn to_engine_config(&self) -> EngineConfig {
        let viewport = &self.viewport;
        let state = StateConfig {
            viewport_height_px: viewport.height_px,
            base_scale_px_per_m: viewport.base_scale_px_per_m,
            min_zoom: viewport.min_zoom,
            max_zoom: viewport.max_zoom,
            wheel_zoom_step: viewport.wheel_zoom_step,
            wheel_pan_px_per_unit: viewport.wheel_pan_px_per_unit,
            snap_tolerance_m: viewport.snap_tolerance_m,
            snap_unit_m: viewport.snap_unit_m,
            ..StateConfig::default()
        };
        let cache = CacheConfig::default()
            .with_budget_bytes(self.cache.budget_bytes)
            .with_reduced_factor(self.cache.reduced_factor)
            .with_lod_zoom_threshold(self.cache.lod_zoom_threshold);
        let scroll = ScrollConfig {
            inertia_time_constant: Duration::from_millis(self.scroll.inertia_time_constant_ms),
            ..ScrollConfig::default()
        }
        .with_frame_interval(Duration::from_millis(self.scroll.frame_interval_ms))
        .with_fast_velocity(self.scroll.fast_velocity_px_per_s)
        .with_quiet_period(Duration::from_millis(self.scroll.quiet_period_ms))
        .with_prefetch_screens(self.scroll.prefetch_screens);
        let stream = StreamConfig::new(self.stream.chunk_span_m)
            .with_max_loaded_chunks(self.stream.max_loaded_chunks)
            .with_prefetch_chunks(self.stream.prefetch_chunks);

        EngineConfig::new()
            .with_state(state)
            .with_cache(cache)
            .with_scroll(scroll)
            .with_stream(stream)
    }
}

/// Format a byte count in the largest binary unit that divides it exactly.
pub fn format_size(bytes: usize) -> String {
    const KIB: usize = 1024;
    match bytes {
        0 => "0".to_string(),
        b if b % (KIB * KIB * KIB) == 0 => format!("{}GB", b / (KIB * KIB * KIB)),
        b if b % (KIB * KIB) == 0 => format!("{}MB", b / (KIB * KIB)),
        b if b % KIB == 0 => format!("{}KB", b / KIB),
        b => b.to_string(),
    }
}

/// Parse a byte size such as `100MB`, `1.5 GiB` or `4096`.
///
/// Units are binary (`KB` = `KiB` = 1024 bytes).
pub fn parse_size(input: &str) -> Option<usize> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let value: f64 = number.trim().parse().ok()?;
    let multiplier: f64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1.0,
        "K" | "KB" | "KIB" => 1024.0,
        "M" | "MB" | "MIB" => 1024.0 * 1024.0,
        "G" | "GB" | "GIB" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    let bytes = value * multiplier;
    if bytes.is_finite() && bytes >= 0.0 && bytes <= usize::MAX as f64 {
        Some(bytes.round() as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096"), Some(4096));
        assert_eq!(parse_size("100MB"), Some(100 * 1024 * 1024));
        assert_eq!(parse_size("1.5 GiB"), Some(1536 * 1024 * 1024));
        assert_eq!(parse_size("2k"), Some(2048));
        assert_eq!(parse_size("lots"), None);
        assert_eq!(parse_size("-1MB"), None);
    }

    #[test]
    fn test_format_size_is_exact() {
        assert_eq!(format_size(100 * 1024 * 1024), "100MB");
        assert_eq!(format_size(3 * 1024), "3KB");
        assert_eq!(format_size(1500), "1500");
        assert_eq!(parse_size(&format_size(1536 * 1024)), Some(1536 * 1024));
    }

    #[test]
    fn test_zoom_bounds_checked_together() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "[viewport]\nmin_zoom = 200\nmax_zoom = 400\n").unwrap();
        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.viewport.min_zoom, 200.0);

        fs::write(&path, "[viewport]\nmin_zoom = 500\n").unwrap();
        assert!(ConfigFile::load_from(&path).is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("config.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("depthsync").join("config.ini");
        let mut config = ConfigFile::default();
        config.viewport.height_px = 800.0;
        config.cache.budget_bytes = 8 * 1024 * 1024;
        config.stream.chunk_span_m = 25.0;
        config.logging.file = Some(PathBuf::from("/var/log/depthsync.log"));

        config.save_to(&path).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(ConfigFile::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "[stream]\nchunk_span_m = 10\n").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.stream.chunk_span_m, 10.0);
        assert_eq!(config.cache, CacheSettings::default());
    }

    #[test]
    fn test_invalid_value_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "[viewport]\nheight_px = tall\n").unwrap();

        assert!(matches!(
            ConfigFile::load_from(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_to_engine_config() {
        let mut config = ConfigFile::default();
        config.viewport.height_px = 500.0;
        config.scroll.quiet_period_ms = 250;
        config.stream.prefetch_chunks = 4;

        let engine = config.to_engine_config();
        assert_eq!(engine.state.viewport_height_px, 500.0);
        assert_eq!(engine.scroll.quiet_period, Duration::from_millis(250));
        assert_eq!(engine.stream.prefetch_chunks, 4);
        assert_eq!(engine.cache, CacheConfig::default());
    }
}
