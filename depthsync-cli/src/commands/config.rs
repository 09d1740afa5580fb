//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path` for
//! viewing and editing `config.ini` from the command line, and
//! `config engine` for what those settings mean once the engine runs.

use clap::Subcommand;
use depthsync::app::EngineConfig;
use depthsync::config::{config_file_path, ConfigFile, ConfigKey};
use depthsync::telemetry::format_bytes;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., stream.chunk_span_m)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., cache.budget)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,

    /// Show the engine settings derived from the configuration
    Engine,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key),
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => run_path(),
        ConfigCommands::Engine => run_engine(),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'depthsync config list' to see available keys.",
            key
        ))
    })
}

fn shown(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

fn run_get(key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load()?;
    println!("{}", shown(&config_key.get(&config)));
    Ok(())
}

/// Set a configuration value.
fn run_set(key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;

    let mut config = ConfigFile::load()?;
    config_key.set(&mut config, value)?;
    config.validate()?;
    config.save()?;

    println!("Set {} = {}", config_key.name(), config_key.get(&config));

    Ok(())
}

/// Every key, grouped under its ini section.
fn run_list() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    println!("# {}", config_file_path().display());

    let mut section = None;
    for key in ConfigKey::all() {
        if section != Some(key.section()) {
            section = Some(key.section());
            println!();
            println!("[{}]", key.section());
        }
        println!("{} = {}", key.key_name(), shown(&key.get(&config)));
    }
    Ok(())
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

/// Show what the engine will actually run with.
fn run_engine() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    config.validate()?;
    let engine = config.to_engine_config();

    println!("Engine Settings");
    println!("===============");
    for (heading, rows) in engine_report(&engine) {
        println!();
        println!("{}", heading);
        for (label, value) in rows {
            println!("  {:<18}{}", format!("{}:", label), value);
        }
    }
    Ok(())
}

type ReportSection = (&'static str, Vec<(&'static str, String)>);

/// Derived figures per engine component, in display order.
fn engine_report(engine: &EngineConfig) -> Vec<ReportSection> {
    let state = &engine.state;
    let scroll = &engine.scroll;
    let cache = &engine.cache;
    let stream = &engine.stream;

    // Meters on screen for a given zoom.
    let span_at = |zoom: f64| state.viewport_height_px / (state.base_scale_px_per_m * zoom);
    let coast_px = scroll.fast_velocity_px_per_s * scroll.inertia_time_constant.as_secs_f64();
    let frame_ms = scroll.frame_interval.as_secs_f64() * 1000.0;

    vec![
        (
            "Viewport",
            vec![
                ("Height", format!("{:.0} px", state.viewport_height_px)),
                ("Span at 1x", format!("{:.1} m", span_at(1.0))),
                (
                    "Zoom",
                    format!(
                        "{}x to {}x ({:.2} m to {:.1} m on screen)",
                        state.min_zoom,
                        state.max_zoom,
                        span_at(state.max_zoom),
                        span_at(state.min_zoom)
                    ),
                ),
            ],
        ),
        (
            "Scrolling",
            vec![
                (
                    "Frame budget",
                    format!("{:.0} ms ({:.0} fps)", frame_ms, 1000.0 / frame_ms),
                ),
                (
                    "Fast motion",
                    format!("above {:.0} px/s", scroll.fast_velocity_px_per_s),
                ),
                (
                    "Coast at fast",
                    format!(
                        "{:.0} px ({:.1} m at 1x)",
                        coast_px,
                        coast_px / state.base_scale_px_per_m
                    ),
                ),
                (
                    "Settles after",
                    format!("{} ms", scroll.quiet_period.as_millis()),
                ),
            ],
        ),
        (
            "Cache",
            vec![
                ("Budget", format_bytes(cache.budget_bytes)),
                (
                    "Reduced LOD",
                    format!(
                        "1/{} below {}x zoom or in fast motion",
                        cache.reduced_factor, cache.lod_zoom_threshold
                    ),
                ),
            ],
        ),
        (
            "Streaming",
            vec![
                ("Chunk span", format!("{} m", stream.chunk_span_m)),
                (
                    "Resident limit",
                    format!(
                        "{} chunks ({} m)",
                        stream.max_loaded_chunks,
                        stream.chunk_span_m * stream.max_loaded_chunks as f64
                    ),
                ),
                (
                    "Prefetch",
                    format!(
                        "{} chunks each side, {} screens ahead of fast motion",
                        stream.prefetch_chunks, scroll.prefetch_screens
                    ),
                ),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthsync::state::StateConfig;
    use depthsync::stream::StreamConfig;

    fn row<'a>(report: &'a [ReportSection], heading: &str, label: &str) -> &'a str {
        report
            .iter()
            .find(|(h, _)| *h == heading)
            .and_then(|(_, rows)| rows.iter().find(|(l, _)| *l == label))
            .map(|(_, value)| value.as_str())
            .unwrap()
    }

    #[test]
    fn test_engine_report_from_defaults() {
        let report = engine_report(&EngineConfig::default());
        let headings: Vec<_> = report.iter().map(|(h, _)| *h).collect();
        assert_eq!(headings, ["Viewport", "Scrolling", "Cache", "Streaming"]);

        assert_eq!(row(&report, "Viewport", "Span at 1x"), "60.0 m");
        assert!(row(&report, "Scrolling", "Frame budget").starts_with("16 ms"));
        assert_eq!(row(&report, "Cache", "Budget"), "100.0 MiB");
        assert_eq!(row(&report, "Streaming", "Resident limit"), "64 chunks (3200 m)");
    }

    #[test]
    fn test_engine_report_follows_overrides() {
        let engine = EngineConfig::default()
            .with_state(
                StateConfig::default()
                    .with_viewport_height_px(500.0)
                    .with_base_scale(20.0),
            )
            .with_stream(StreamConfig::new(25.0));
        let report = engine_report(&engine);

        assert_eq!(row(&report, "Viewport", "Span at 1x"), "25.0 m");
        assert_eq!(row(&report, "Streaming", "Chunk span"), "25 m");
        assert!(row(&report, "Viewport", "Zoom").contains("0.25 m"));
    }

    #[test]
    fn test_parse_key_accepts_known_key() {
        assert!(parse_key("stream.chunk_span_m").is_ok());
    }

    #[test]
    fn test_unset_values_are_marked() {
        assert_eq!(shown(""), "(not set)");
        assert_eq!(shown("64 MB"), "64 MB");
    }

    #[test]
    fn test_parse_key_rejects_unknown_key() {
        let err = parse_key("nope.nothing").unwrap_err();
        assert!(err.to_string().contains("depthsync config list"));
    }
}
