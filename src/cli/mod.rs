//! CLI interface for padtrig

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Turns piezo drum pad signals into MIDI notes
#[derive(Parser)]
#[command(name = "padtrig")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read the pads and send MIDI until interrupted
    Run {
        /// Configuration file path
        #[arg(short, long, default_value = "padtrig.yaml")]
        config: PathBuf,
    },

    /// Replay a capture through the engine and print the notes it produces
    Replay {
        /// Configuration file path
        #[arg(short, long, default_value = "padtrig.yaml")]
        config: PathBuf,

        /// Capture file path
        #[arg(long)]
        capture: PathBuf,

        /// Also send the notes to the configured MIDI port
        #[arg(long)]
        send: bool,
    },

    /// List available MIDI output ports
    Ports,

    /// Validate a configuration file
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "padtrig.yaml")]
        config: PathBuf,
    },

    /// Generate an example configuration file
    Init,
}
