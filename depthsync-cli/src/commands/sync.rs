//! Cross-hole sync settings commands.
//!
//! `sync show`, `sync set` and `sync path` read and edit the persisted
//! settings that decide which display fields are mirrored between open
//! documents.

use clap::Subcommand;
use depthsync::crosshole::{JsonFileStore, SettingsStore, SyncSettings};

use crate::error::CliError;

/// Sync subcommands.
#[derive(Debug, Subcommand)]
pub enum SyncCommands {
    /// Show the current sync settings
    Show,

    /// Change one sync setting
    Set {
        /// Setting name (e.g., sync_colors, auto_sync, override_key)
        key: String,

        /// New value (true/false, or a key name for override_key)
        value: String,
    },

    /// Restore every sync setting to its default
    Reset,

    /// Show the sync settings file path
    Path,
}

/// Run a sync subcommand.
pub fn run(command: SyncCommands) -> Result<(), CliError> {
    let store = JsonFileStore::at_default_location()?;
    match command {
        SyncCommands::Show => run_show(&store),
        SyncCommands::Set { key, value } => run_set(&store, &key, &value),
        SyncCommands::Reset => run_reset(&store),
        SyncCommands::Path => {
            println!("{}", store.path().display());
            Ok(())
        }
    }
}

fn load(store: &dyn SettingsStore) -> Result<SyncSettings, CliError> {
    Ok(store.load()?.unwrap_or_default())
}

fn run_show(store: &dyn SettingsStore) -> Result<(), CliError> {
    let settings = load(store)?;

    println!("Cross-Hole Sync Settings");
    println!("========================");
    println!();
    for line in render_settings(&settings)? {
        println!("{}", line);
    }

    Ok(())
}

fn run_set(store: &dyn SettingsStore, key: &str, value: &str) -> Result<(), CliError> {
    let mut settings = load(store)?;
    settings.set(key, value).map_err(|e| {
        CliError::Sync(format!(
            "{}. Known settings: {}",
            e,
            SyncSettings::KEYS.join(", ")
        ))
    })?;
    store.save(&settings)?;

    println!("Set {} = {}", key, settings.get(key)?);
    Ok(())
}

fn run_reset(store: &dyn SettingsStore) -> Result<(), CliError> {
    store.save(&SyncSettings::default())?;
    println!("Sync settings restored to defaults");
    Ok(())
}

/// One `  key = value` line per setting, in a fixed order.
fn render_settings(settings: &SyncSettings) -> Result<Vec<String>, CliError> {
    let width = SyncSettings::KEYS.iter().map(|k| k.len()).max().unwrap_or(0);
    SyncSettings::KEYS
        .iter()
        .map(|key| Ok(format!("  {:<width$} = {}", key, settings.get(key)?)))
        .collect()
}
