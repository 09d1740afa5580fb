//! Typed access to individual configuration settings by `section.key` name.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::{format_size, parse_size, ConfigError, ConfigFile};

/// Every setting in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    ViewportHeightPx,
    ViewportBaseScale,
    ViewportMinZoom,
    ViewportMaxZoom,
    ViewportWheelZoomStep,
    ViewportWheelPanPx,
    ViewportSnapTolerance,
    ViewportSnapUnit,

    CacheBudget,
    CacheReducedFactor,
    CacheLodZoomThreshold,

    ScrollFrameIntervalMs,
    ScrollFastVelocity,
    ScrollQuietPeriodMs,
    ScrollInertiaTimeConstantMs,
    ScrollPrefetchScreens,

    StreamChunkSpan,
    StreamMaxLoadedChunks,
    StreamPrefetchChunks,

    LoggingFilter,
    LoggingFile,
    LoggingAnsi,
}

const ALL_KEYS: [ConfigKey; 22] = [
    ConfigKey::ViewportHeightPx,
    ConfigKey::ViewportBaseScale,
    ConfigKey::ViewportMinZoom,
    ConfigKey::ViewportMaxZoom,
    ConfigKey::ViewportWheelZoomStep,
    ConfigKey::ViewportWheelPanPx,
    ConfigKey::ViewportSnapTolerance,
    ConfigKey::ViewportSnapUnit,
    ConfigKey::CacheBudget,
    ConfigKey::CacheReducedFactor,
    ConfigKey::CacheLodZoomThreshold,
    ConfigKey::ScrollFrameIntervalMs,
    ConfigKey::ScrollFastVelocity,
    ConfigKey::ScrollQuietPeriodMs,
    ConfigKey::ScrollInertiaTimeConstantMs,
    ConfigKey::ScrollPrefetchScreens,
    ConfigKey::StreamChunkSpan,
    ConfigKey::StreamMaxLoadedChunks,
    ConfigKey::StreamPrefetchChunks,
    ConfigKey::LoggingFilter,
    ConfigKey::LoggingFile,
    ConfigKey::LoggingAnsi,
];

impl ConfigKey {
    /// All keys in file order.
    pub fn all() -> &'static [ConfigKey] {
        &ALL_KEYS
    }

    /// INI section name.
    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            ViewportHeightPx | ViewportBaseScale | ViewportMinZoom | ViewportMaxZoom
            | ViewportWheelZoomStep | ViewportWheelPanPx | ViewportSnapTolerance
            | ViewportSnapUnit => "viewport",
            CacheBudget | CacheReducedFactor | CacheLodZoomThreshold => "cache",
            ScrollFrameIntervalMs | ScrollFastVelocity | ScrollQuietPeriodMs
            | ScrollInertiaTimeConstantMs | ScrollPrefetchScreens => "scroll",
            StreamChunkSpan | StreamMaxLoadedChunks | StreamPrefetchChunks => "stream",
            LoggingFilter | LoggingFile | LoggingAnsi => "logging",
        }
    }

    /// Key name within its section.
    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            ViewportHeightPx => "height_px",
            ViewportBaseScale => "base_scale_px_per_m",
            ViewportMinZoom => "min_zoom",
            ViewportMaxZoom => "max_zoom",
            ViewportWheelZoomStep => "wheel_zoom_step",
            ViewportWheelPanPx => "wheel_pan_px_per_unit",
            ViewportSnapTolerance => "snap_tolerance_m",
            ViewportSnapUnit => "snap_unit_m",
            CacheBudget => "budget",
            CacheReducedFactor => "reduced_factor",
            CacheLodZoomThreshold => "lod_zoom_threshold",
            ScrollFrameIntervalMs => "frame_interval_ms",
            ScrollFastVelocity => "fast_velocity_px_per_s",
            ScrollQuietPeriodMs => "quiet_period_ms",
            ScrollInertiaTimeConstantMs => "inertia_time_constant_ms",
            ScrollPrefetchScreens => "prefetch_screens",
            StreamChunkSpan => "chunk_span_m",
            StreamMaxLoadedChunks => "max_loaded_chunks",
            StreamPrefetchChunks => "prefetch_chunks",
            LoggingFilter => "filter",
            LoggingFile => "file",
            LoggingAnsi => "ansi",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as text; empty when an optional value is unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        let v = &config.viewport;
        let s = &config.scroll;
        match self {
            ViewportHeightPx => v.height_px.to_string(),
            ViewportBaseScale => v.base_scale_px_per_m.to_string(),
            ViewportMinZoom => v.min_zoom.to_string(),
            ViewportMaxZoom => v.max_zoom.to_string(),
            ViewportWheelZoomStep => v.wheel_zoom_step.to_string(),
            ViewportWheelPanPx => v.wheel_pan_px_per_unit.to_string(),
            ViewportSnapTolerance => v.snap_tolerance_m.to_string(),
            ViewportSnapUnit => v.snap_unit_m.to_string(),
            CacheBudget => format_size(config.cache.budget_bytes),
            CacheReducedFactor => config.cache.reduced_factor.to_string(),
            CacheLodZoomThreshold => config.cache.lod_zoom_threshold.to_string(),
            ScrollFrameIntervalMs => s.frame_interval_ms.to_string(),
            ScrollFastVelocity => s.fast_velocity_px_per_s.to_string(),
            ScrollQuietPeriodMs => s.quiet_period_ms.to_string(),
            ScrollInertiaTimeConstantMs => s.inertia_time_constant_ms.to_string(),
            ScrollPrefetchScreens => s.prefetch_screens.to_string(),
            StreamChunkSpan => config.stream.chunk_span_m.to_string(),
            StreamMaxLoadedChunks => config.stream.max_loaded_chunks.to_string(),
            StreamPrefetchChunks => config.stream.prefetch_chunks.to_string(),
            LoggingFilter => config.logging.filter.clone(),
            LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            LoggingAnsi => config.logging.ansi.to_string(),
        }
    }

    /// Validate `value` and store it.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let value = value.trim();
        match self {
            ViewportHeightPx => config.viewport.height_px = self.positive(value)?,
            ViewportBaseScale => config.viewport.base_scale_px_per_m = self.positive(value)?,
            ViewportMinZoom => config.viewport.min_zoom = self.positive(value)?,
            ViewportMaxZoom => config.viewport.max_zoom = self.positive(value)?,
            ViewportWheelZoomStep => {
                let step = self.positive(value)?;
                if step <= 1.0 {
                    return Err(self.invalid(value, "must be greater than 1"));
                }
                config.viewport.wheel_zoom_step = step;
            }
            ViewportWheelPanPx => config.viewport.wheel_pan_px_per_unit = self.positive(value)?,
            ViewportSnapTolerance => config.viewport.snap_tolerance_m = self.non_negative(value)?,
            ViewportSnapUnit => config.viewport.snap_unit_m = self.non_negative(value)?,
            CacheBudget => {
                config.cache.budget_bytes = parse_size(value)
                    .ok_or_else(|| self.invalid(value, "expected a size such as 100MB"))?
            }
            CacheReducedFactor => {
                let factor: u32 = self.parse(value)?;
                if factor < 2 {
                    return Err(self.invalid(value, "must be at least 2"));
                }
                config.cache.reduced_factor = factor;
            }
            CacheLodZoomThreshold => config.cache.lod_zoom_threshold = self.non_negative(value)?,
            ScrollFrameIntervalMs => config.scroll.frame_interval_ms = self.parse(value)?,
            ScrollFastVelocity => config.scroll.fast_velocity_px_per_s = self.positive(value)?,
            ScrollQuietPeriodMs => config.scroll.quiet_period_ms = self.parse(value)?,
            ScrollInertiaTimeConstantMs => {
                config.scroll.inertia_time_constant_ms = self.parse(value)?
            }
            ScrollPrefetchScreens => config.scroll.prefetch_screens = self.non_negative(value)?,
            StreamChunkSpan => config.stream.chunk_span_m = self.positive(value)?,
            StreamMaxLoadedChunks => {
                let max: u64 = self.parse(value)?;
                if max == 0 {
                    return Err(self.invalid(value, "must be at least 1"));
                }
                config.stream.max_loaded_chunks = max;
            }
            StreamPrefetchChunks => config.stream.prefetch_chunks = self.parse(value)?,
            LoggingFilter => {
                if value.is_empty() {
                    return Err(self.invalid(value, "must not be empty"));
                }
                config.logging.filter = value.to_string();
            }
            LoggingFile => {
                config.logging.file = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            LoggingAnsi => config.logging.ansi = self.parse(value)?,
        }
        Ok(())
    }

    fn parse<T: FromStr>(&self, value: &str) -> Result<T, ConfigError>
    where
        T::Err: fmt::Display,
    {
        value
            .parse()
            .map_err(|e: T::Err| self.invalid(value, &e.to_string()))
    }

    fn positive(&self, value: &str) -> Result<f64, ConfigError> {
        let parsed: f64 = self.parse(value)?;
        if parsed.is_finite() && parsed > 0.0 {
            Ok(parsed)
        } else {
            Err(self.invalid(value, "must be a positive number"))
        }
    }

    fn non_negative(&self, value: &str) -> Result<f64, ConfigError> {
        let parsed: f64 = self.parse(value)?;
        if parsed.is_finite() && parsed >= 0.0 {
            Ok(parsed)
        } else {
            Err(self.invalid(value, "must be zero or positive"))
        }
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    /// Parse `section.key`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_round_trips_its_default() {
        let defaults = ConfigFile::default();
        for key in ConfigKey::all() {
            let value = key.get(&defaults);
            if value.is_empty() {
                continue;
            }
            let mut config = ConfigFile::default();
            key.set(&mut config, &value)
                .unwrap_or_else(|e| panic!("{} rejected its default: {}", key, e));
            assert_eq!(config, defaults, "{}", key);
        }
    }

    #[test]
    fn test_parse_key_names() {
        assert_eq!(
            "cache.budget".parse::<ConfigKey>().unwrap(),
            ConfigKey::CacheBudget
        );
        assert_eq!(
            "Stream.Chunk_Span_M".parse::<ConfigKey>().unwrap(),
            ConfigKey::StreamChunkSpan
        );
        assert!(matches!(
            "cache.nope".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<String> = ConfigKey::all().iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ConfigKey::all().len());
    }

    #[test]
    fn test_set_validates() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::ViewportHeightPx.set(&mut config, "-5").is_err());
        assert!(ConfigKey::ViewportWheelZoomStep.set(&mut config, "1.0").is_err());
        assert!(ConfigKey::CacheReducedFactor.set(&mut config, "1").is_err());
        assert!(ConfigKey::StreamMaxLoadedChunks.set(&mut config, "0").is_err());
        assert!(ConfigKey::LoggingAnsi.set(&mut config, "sometimes").is_err());
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_cache_budget_accepts_sizes() {
        let mut config = ConfigFile::default();
        ConfigKey::CacheBudget.set(&mut config, "64MB").unwrap();
        assert_eq!(config.cache.budget_bytes, 64 * 1024 * 1024);
        assert_eq!(ConfigKey::CacheBudget.get(&config), "64MB");

        ConfigKey::CacheBudget.set(&mut config, "1000").unwrap();
        assert_eq!(ConfigKey::CacheBudget.get(&config), "1000");
    }

    #[test]
    fn test_logging_file_clears_on_empty() {
        let mut config = ConfigFile::default();
        ConfigKey::LoggingFile.set(&mut config, "/tmp/a.log").unwrap();
        assert_eq!(ConfigKey::LoggingFile.get(&config), "/tmp/a.log");
        ConfigKey::LoggingFile.set(&mut config, "").unwrap();
        assert!(config.logging.file.is_none());
    }
}
