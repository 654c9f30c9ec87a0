//! padtrig - Piezo drum pads to MIDI

use anyhow::{Context, Result};
use clap::Parser;
use padtrig::config::{self, PadtrigConfig};
use padtrig::engine::{
    list_midi_ports, EngineSettings, MemoryTransport, MonotonicClock, StatusBlinker, StatusTask,
    SysfsLed, Transport, TriggerEngine,
};
use padtrig::session::{self, open_source, open_transport};
use padtrig::sources::Capture;
use padtrig::trigger::{HiHatController, HiHatState, NoteResolver, PedalWatcher};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run { config: config_path } => run(&config_path)?,

        Commands::Replay {
            config: config_path,
            capture,
            send,
        } => replay(&config_path, &capture, send)?,

        Commands::Ports => {
            let ports = list_midi_ports()?;
            if ports.is_empty() {
                println!("No MIDI output ports found.");
            } else {
                println!("MIDI output ports:");
                for port in ports {
                    println!("  - {}", port);
                }
            }
        }

        Commands::Check { config: config_path } => {
            println!("Checking configuration at {:?}...", config_path);

            match config::load_config(&config_path) {
                Ok(cfg) => {
                    println!("Configuration is valid!");
                    print_summary(&cfg);
                }
                Err(e) => {
                    println!("Configuration is invalid: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Init => {
            let example_config = include_str!("../padtrig.example.yaml");

            let path = "padtrig.yaml";
            if Path::new(path).exists() {
                println!("padtrig.yaml already exists. Not overwriting.");
            } else {
                std::fs::write(path, example_config)?;
                println!("Created padtrig.yaml with example configuration.");
            }
        }
    }

    Ok(())
}

fn run(config_path: &Path) -> Result<()> {
    println!("Loading configuration from {:?}...", config_path);
    let cfg = config::load_config(config_path)?;
    print_summary(&cfg);

    let source = open_source(&cfg)?;
    let transport = open_transport(&cfg.midi)?;
    println!("Sending to MIDI port '{}'", transport.port_name());

    let hihat = Arc::new(HiHatState::new());

    let mut watcher = match &cfg.pedal {
        Some(pedal) => {
            let mut watcher = PedalWatcher::new(&pedal.gpio_value, pedal.poll_interval());
            watcher
                .start(HiHatController::new(Arc::clone(&hihat)))
                .with_context(|| format!("failed to watch hi-hat pedal {}", pedal.gpio_value))?;
            Some(watcher)
        }
        None => None,
    };

    let mut status = cfg
        .status
        .as_ref()
        .map(|status| StatusBlinker::new(SysfsLed::new(&status.led)));

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))?;

    let mut engine = TriggerEngine::new(
        source,
        transport,
        MonotonicClock::new(),
        cfg.pads(),
        EngineSettings::from_config(&cfg),
        hihat,
    );

    println!("Running. Press Ctrl-C to stop.");
    let result = engine.run(
        &running,
        status.as_mut().map(|s| s as &mut dyn StatusTask),
    );

    if let Some(watcher) = watcher.as_mut() {
        watcher.stop();
    }

    let stats = engine.stats();
    println!(
        "\nStopped after {} passes: {} notes, {} failed samples, {} dropped notes",
        stats.passes, stats.notes, stats.sample_failures, stats.write_failures
    );

    result?;
    Ok(())
}

fn replay(config_path: &Path, capture_path: &Path, send: bool) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    let capture = Capture::load(capture_path)?;
    info!(
        frames = capture.frames.len(),
        duration = ?capture.duration(),
        "Replaying capture"
    );

    let transport: Box<dyn Transport> = if send {
        Box::new(open_transport(&cfg.midi)?)
    } else {
        Box::new(MemoryTransport::new())
    };

    let outcome = session::replay(&cfg, &capture, transport);

    for played in outcome.notes.iter().filter(|n| n.event.on) {
        let bytes = played.event.message(cfg.midi.channel).to_bytes();
        println!(
            "{:>8.3}s  input {}  note {:>3}  velocity {:>3}  [{:02X} {:02X} {:02X}]",
            played.at.as_secs_f64(),
            played.event.input,
            played.event.note,
            played.event.velocity,
            bytes[0],
            bytes[1],
            bytes[2]
        );
    }

    println!(
        "\n{} frames, {} notes, {} dropped",
        capture.frames.len(),
        outcome.stats.notes,
        outcome.stats.write_failures
    );
    Ok(())
}

fn print_summary(cfg: &PadtrigConfig) {
    println!(
        "  Converter: {} bits, {:.2} V reference",
        cfg.adc.resolution_bits, cfg.adc.reference_voltage
    );
    println!(
        "  Velocity: gain {:.2}, range {}-{}",
        cfg.velocity.gain, cfg.velocity.min, cfg.velocity.max
    );
    println!("  MIDI channel: {}", cfg.midi.channel + 1);
    println!("  Source: {:?}", cfg.source.kind);
    if let Some(pedal) = &cfg.pedal {
        println!("  Hi-hat pedal: {}", pedal.gpio_value);
    }
    println!("  Pads: {}", cfg.pads.len());
    for pad in &cfg.pads {
        let note = match pad.note {
            NoteResolver::Fixed(note) => format!("note {}", note),
            NoteResolver::HiHat { closed, open } => {
                format!("notes {} closed / {} open", closed, open)
            }
        };
        println!(
            "    - {} (input {}, {:.2} V, {} ms) -> {}",
            pad.name, pad.input, pad.threshold_volts, pad.settle_ms, note
        );
    }
}
