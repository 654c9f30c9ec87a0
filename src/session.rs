//! Wiring a configuration into a running engine
//!
//! Picks the signal source and transport backends named in the
//! configuration, and drives captures through the engine for replay.

use crate::config::{MidiConfig, PadtrigConfig, SourceKind};
use crate::engine::{
    EngineSettings, EngineStats, ManualClock, MidirTransport, NoteEvent, Transport, TriggerEngine,
};
use crate::mapping::max_code_for_bits;
use crate::sources::{
    AudioInputConfig, AudioSource, Capture, IioConfig, IioSource, ReplaySource, SignalSource,
};
use crate::trigger::{HiHatController, HiHatState};
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Open the live signal source named in the configuration
pub fn open_source(config: &PadtrigConfig) -> Result<Box<dyn SignalSource>> {
    let max_code = max_code_for_bits(config.adc.resolution_bits);

    let source: Box<dyn SignalSource> = match config.source.kind {
        SourceKind::Iio => {
            let iio = IioConfig::from_settings(&config.source.settings)?;
            info!(device = ?iio.device, "Using IIO converter");
            Box::new(IioSource::new(iio, max_code))
        }
        SourceKind::Audio => {
            let audio = AudioInputConfig::from_settings(&config.source.settings)?;
            Box::new(AudioSource::open(&audio, max_code)?)
        }
        SourceKind::Replay => {
            bail!("Replay sources are driven by the replay command, not run")
        }
    };

    Ok(source)
}

/// Open the MIDI transport named in the configuration
pub fn open_transport(midi: &MidiConfig) -> Result<MidirTransport> {
    if let Some(name) = &midi.virtual_port {
        #[cfg(unix)]
        return MidirTransport::create_virtual(name);

        #[cfg(not(unix))]
        bail!("Virtual MIDI port '{}' is only supported on unix", name);
    }

    MidirTransport::connect(midi.port.as_deref())
}

/// A note produced during replay, with its capture time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayedNote {
    pub at: Duration,
    pub event: NoteEvent,
}

/// Result of replaying a capture
pub struct ReplayOutcome<T> {
    pub notes: Vec<ReplayedNote>,
    pub stats: EngineStats,
    pub transport: T,
}

/// Drive every frame of `capture` through a fresh engine
///
/// Each frame sets the clock, applies any pedal change, then runs one pass.
pub fn replay<T: Transport>(
    config: &PadtrigConfig,
    capture: &Capture,
    transport: T,
) -> ReplayOutcome<T> {
    let max_code = max_code_for_bits(config.adc.resolution_bits);
    let hihat = Arc::new(HiHatState::new());
    let mut pedal = HiHatController::new(Arc::clone(&hihat));

    let mut engine = TriggerEngine::new(
        ReplaySource::new(max_code),
        transport,
        ManualClock::new(),
        config.pads(),
        EngineSettings::from_config(config),
        hihat,
    );

    let mut notes = Vec::new();
    for frame in &capture.frames {
        engine.clock_mut().set(frame.at());
        if let Some(down) = frame.pedal_down {
            pedal.on_pedal(down);
        }
        engine.source_mut().load_frame(frame);

        let report = engine.poll_once();
        notes.extend(report.events.into_iter().map(|event| ReplayedNote {
            at: frame.at(),
            event,
        }));
    }

    let stats = engine.stats();
    ReplayOutcome {
        notes,
        stats,
        transport: engine.into_transport(),
    }
}
