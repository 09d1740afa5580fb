//! DepthSync CLI - Command-line interface
//!
//! Drives the DepthSync library: run a scripted scroll simulation, and
//! inspect or edit the configuration and cross-hole sync settings.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use commands::sync::SyncCommands;

#[derive(Parser)]
#[command(name = "depthsync")]
#[command(about = "Depth-synchronized viewport engine for well-log panes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fling a synthetic well and report scroll, cache and stream diagnostics
    Simulate {
        /// Depth of the synthetic document in meters
        #[arg(long, default_value = "3000")]
        depth: f64,

        /// Chunk span in meters (overrides stream.chunk_span_m)
        #[arg(long)]
        chunk_span: Option<f64>,

        /// Number of frames to run
        #[arg(long, default_value = "240")]
        frames: u32,

        /// Fling velocity in pixels per second (positive scrolls deeper)
        #[arg(long, default_value = "4000", allow_hyphen_values = true)]
        velocity: f64,

        /// Panes bound to the flung document
        #[arg(long, default_value = "3")]
        panes: u32,

        /// Log at debug level
        #[arg(short, long)]
        verbose: bool,
    },

    /// View and modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// View and modify cross-hole sync settings
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate {
            depth,
            chunk_span,
            frames,
            velocity,
            panes,
            verbose,
        } => commands::simulate::run(SimulateArgs {
            depth,
            chunk_span,
            frames,
            velocity,
            panes,
            verbose,
        }),
        Commands::Config { command } => commands::config::run(command),
        Commands::Sync { command } => commands::sync::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
