//! Configuration file support.
//!
//! Settings live in an INI file at `~/.config/depthsync/config.ini` (the
//! platform config directory) with `[viewport]`, `[cache]`, `[scroll]`,
//! `[stream]` and `[logging]` sections. [`ConfigKey`] addresses single
//! settings for the `config get|set|list` commands.

mod file;
mod keys;

pub use file::{
    config_directory, config_file_path, format_size, parse_size, CacheSettings, ConfigError,
    ConfigFile, ScrollSettings, StreamSettings, ViewportSettings, CONFIG_FILE_NAME,
};
pub use keys::ConfigKey;
