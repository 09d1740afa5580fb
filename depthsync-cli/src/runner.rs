//! Shared setup for commands that run the engine.

use depthsync::config::{config_file_path, ConfigFile};
use depthsync::logging::{init_logging, LoggingGuard};
use tracing::info;

use crate::error::CliError;

/// Loads the configuration file and installs logging for the lifetime of a
/// command.
pub struct CliRunner {
    config: ConfigFile,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Load `config.ini` (defaults if absent) and start logging.
    ///
    /// `verbose` raises the filter to debug for this run.
    pub fn new(verbose: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;
        let mut logging = config.logging.clone();
        if verbose {
            logging = logging.with_filter("depthsync=debug");
        }
        let guard = init_logging(&logging)?;
        Ok(Self {
            config,
            _logging: guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log which command is starting and where its settings came from.
    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = depthsync::VERSION,
            config = %config_file_path().display(),
            "Starting depthsync"
        );
    }
}
