//! CLI error type and exit handling.

use std::fmt;

use depthsync::app::EngineError;
use depthsync::config::ConfigError;
use depthsync::coord::DepthError;
use depthsync::crosshole::SettingsError;
use depthsync::logging::LoggingError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Bad or unreadable configuration.
    Config(String),
    /// Cross-hole sync settings could not be read or written.
    Sync(String),
    /// Logging could not be set up.
    Logging(String),
    /// The engine refused an operation.
    Engine(String),
    /// Invalid command-line arguments beyond what clap checks.
    Usage(String),
}

impl CliError {
    /// Print the error and exit with a non-zero status.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        std::process::exit(1);
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Sync(msg) => write!(f, "Sync settings error: {}", msg),
            CliError::Logging(msg) => write!(f, "Logging error: {}", msg),
            CliError::Engine(msg) => write!(f, "Engine error: {}", msg),
            CliError::Usage(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<SettingsError> for CliError {
    fn from(e: SettingsError) -> Self {
        CliError::Sync(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e.to_string())
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e.to_string())
    }
}

impl From<DepthError> for CliError {
    fn from(e: DepthError) -> Self {
        CliError::Engine(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: CliError = ConfigError::UnknownKey("viewport.nope".to_string()).into();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("viewport.nope"));
    }

    #[test]
    fn test_usage_error_displays_plain_message() {
        let err = CliError::Usage("--frames must be positive".to_string());
        assert_eq!(err.to_string(), "--frames must be positive");
    }
}
