//! Trigger engine for padtrig
//!
//! A cooperative polling loop: drain inbound MIDI, sample every sense line in
//! order, run each reading through its gate chain, and send a note pair for
//! every firing. Settle windows are per pad, so one pad's dead time never
//! holds up the others.

mod clock;
mod midi;
mod port;
mod status;
mod transport;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use midi::{emit, EventEmitter, MidiMessage, NoteEvent};
pub use port::{list_midi_ports, MidirTransport};
pub use status::{LinkState, StatusBlinker, StatusLed, StatusTask, SysfsLed};
pub use transport::{drain, packetize, MemoryTransport, Packet, Transport, TransportError};

use crate::config::PadtrigConfig;
use crate::mapping::{VelocityMapper, VelocityRange};
use crate::sources::SignalSource;
use crate::trigger::{sense_lines, HiHatState, LineOutcome, Pad, SenseLine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("signal source failed on {passes} consecutive passes")]
    SourceUnavailable { passes: u32 },
}

/// Engine parameters that are not per pad
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Converter reference voltage
    pub reference_voltage: f64,
    /// Stretch applied to the 7-bit velocity scale
    pub velocity_gain: f64,
    /// Range sent velocities are clamped into
    pub velocity_range: VelocityRange,
    /// MIDI cable (jack) number
    pub cable: u8,
    /// MIDI channel, 0 for channel 1
    pub channel: u8,
    /// Consecutive fully failed passes before giving up (0 = never)
    pub max_consecutive_failures: u32,
    /// Pause between passes
    pub poll_interval: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &PadtrigConfig) -> Self {
        Self {
            reference_voltage: config.adc.reference_voltage,
            velocity_gain: config.velocity.gain,
            velocity_range: VelocityRange::new(config.velocity.min, config.velocity.max),
            cable: config.midi.cable,
            channel: config.midi.channel,
            max_consecutive_failures: config.engine.max_consecutive_failures,
            poll_interval: Duration::from_micros(config.engine.poll_interval_us),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            reference_voltage: 3.3,
            velocity_gain: 1.5,
            velocity_range: VelocityRange::default(),
            cable: 0,
            channel: 0,
            max_consecutive_failures: 1000,
            poll_interval: Duration::ZERO,
        }
    }
}

/// What happened during one polling pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Inbound packets discarded
    pub drained: usize,
    /// Note events written to the transport, in emission order
    pub events: Vec<NoteEvent>,
    /// Sense lines that could not be sampled
    pub failed_lines: usize,
    /// Note pairs the transport rejected
    pub write_failures: usize,
}

/// Running totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub passes: u64,
    pub notes: u64,
    pub sample_failures: u64,
    pub write_failures: u64,
}

/// The trigger-to-event engine
pub struct TriggerEngine<S, T, C> {
    source: S,
    emitter: EventEmitter<T>,
    clock: C,
    lines: Vec<SenseLine>,
    /// Per line: failed on its last sample
    line_failing: Vec<bool>,
    mapper: VelocityMapper,
    velocity_range: VelocityRange,
    hihat: Arc<HiHatState>,
    max_consecutive_failures: u32,
    poll_interval: Duration,
    consecutive_failures: u32,
    stats: EngineStats,
}

impl<S, T, C> TriggerEngine<S, T, C>
where
    S: SignalSource,
    T: Transport,
    C: Clock,
{
    pub fn new(
        source: S,
        transport: T,
        clock: C,
        pads: Vec<Pad>,
        settings: EngineSettings,
        hihat: Arc<HiHatState>,
    ) -> Self {
        let mapper = VelocityMapper::new(
            source.max_code(),
            settings.reference_voltage,
            settings.velocity_gain,
        );

        let lines = sense_lines(pads);

        Self {
            source,
            emitter: EventEmitter::new(transport, settings.cable, settings.channel),
            clock,
            line_failing: vec![false; lines.len()],
            lines,
            mapper,
            velocity_range: settings.velocity_range,
            hihat,
            max_consecutive_failures: settings.max_consecutive_failures,
            poll_interval: settings.poll_interval,
            consecutive_failures: 0,
            stats: EngineStats::default(),
        }
    }

    /// One pass: drain, then sample and evaluate every sense line in order
    pub fn poll_once(&mut self) -> PassReport {
        let mut report = PassReport {
            drained: drain(self.emitter.transport_mut()),
            ..Default::default()
        };

        for (line, failing) in self.lines.iter_mut().zip(self.line_failing.iter_mut()) {
            let reading = match self.source.read(line.input()) {
                Ok(reading) => reading,
                Err(e) => {
                    // Warn on the first failure only; a missing input fails every pass.
                    if !*failing {
                        warn!(input = line.input(), err = %e, "Sample failed; skipping line until it recovers");
                    }
                    *failing = true;
                    report.failed_lines += 1;
                    continue;
                }
            };
            if *failing {
                info!(input = line.input(), "Sense line recovered");
                *failing = false;
            }

            let volts = self.mapper.to_voltage(reading.raw);
            let now = self.clock.now();

            match line.evaluate(volts, now, &self.hihat) {
                LineOutcome::Fired { index, note } => {
                    let velocity = self
                        .velocity_range
                        .clamp(self.mapper.to_velocity(reading.raw));
                    let pad = line.pad(index).map(|p| p.name.as_str()).unwrap_or("?");
                    debug!(
                        pad,
                        input = reading.input,
                        raw = reading.raw,
                        volts,
                        note,
                        velocity,
                        "Pad fired"
                    );

                    match self.emitter.emit(note, velocity) {
                        Ok(()) => report
                            .events
                            .extend(NoteEvent::pair(reading.input, note, velocity)),
                        Err(e) => {
                            warn!(pad, note, err = %e, "Dropped note");
                            report.write_failures += 1;
                        }
                    }
                }
                LineOutcome::Settling { .. } | LineOutcome::Quiet => {}
            }
        }

        self.stats.passes += 1;
        self.stats.notes += (report.events.len() / 2) as u64;
        self.stats.sample_failures += report.failed_lines as u64;
        self.stats.write_failures += report.write_failures as u64;
        report
    }

    /// A pass with the failure policy applied
    ///
    /// A pass in which no sense line could be sampled counts as failed; too
    /// many of those in a row is fatal.
    pub fn step(&mut self) -> Result<PassReport, EngineError> {
        let report = self.poll_once();

        if !self.lines.is_empty() && report.failed_lines == self.lines.len() {
            self.consecutive_failures += 1;
            if self.max_consecutive_failures > 0
                && self.consecutive_failures >= self.max_consecutive_failures
            {
                return Err(EngineError::SourceUnavailable {
                    passes: self.consecutive_failures,
                });
            }
        } else {
            self.consecutive_failures = 0;
        }

        Ok(report)
    }

    /// Poll until `running` is cleared or the source gives out
    pub fn run(
        &mut self,
        running: &AtomicBool,
        mut status: Option<&mut dyn StatusTask>,
    ) -> Result<(), EngineError> {
        info!(
            source = self.source.name(),
            lines = self.lines.len(),
            "Trigger engine running"
        );

        while running.load(Ordering::SeqCst) {
            if let Err(e) = self.step() {
                error!(err = %e, "Trigger engine stopping");
                return Err(e);
            }

            if let Some(status) = status.as_deref_mut() {
                status.tick(self.clock.now(), self.emitter.transport().link());
            }

            if !self.poll_interval.is_zero() {
                std::thread::sleep(self.poll_interval);
            }
        }

        info!(
            passes = self.stats.passes,
            notes = self.stats.notes,
            "Trigger engine stopped"
        );
        Ok(())
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn transport(&self) -> &T {
        self.emitter.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.emitter.transport_mut()
    }

    /// Tear down the engine and hand back its transport
    pub fn into_transport(self) -> T {
        self.emitter.into_transport()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{SampleReading, SourceError};
    use crate::trigger::NoteResolver;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    /// Source with settable codes and optionally failing inputs
    #[derive(Default)]
    struct ScriptedSource {
        codes: HashMap<u8, u16>,
        failing: Vec<u8>,
        reads: Vec<u8>,
    }

    impl ScriptedSource {
        fn set(&mut self, input: u8, raw: u16) {
            self.codes.insert(input, raw);
        }
    }

    impl SignalSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn max_code(&self) -> u16 {
            4095
        }

        fn sample(&mut self, input: u8) -> Result<u16, SourceError> {
            self.reads.push(input);
            if self.failing.contains(&input) {
                return Err(SourceError::UnknownInput(input));
            }
            Ok(self.codes.get(&input).copied().unwrap_or(0))
        }
    }

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn kit() -> Vec<Pad> {
        vec![
            Pad::new("kick", 0, 0.4, ms(500), NoteResolver::Fixed(36)),
            Pad::new("snare", 1, 0.2, ms(100), NoteResolver::Fixed(38)),
            Pad::new(
                "hat",
                2,
                0.2,
                ms(100),
                NoteResolver::HiHat {
                    closed: 42,
                    open: 46,
                },
            ),
        ]
    }

    fn engine(
        pads: Vec<Pad>,
    ) -> TriggerEngine<ScriptedSource, MemoryTransport, ManualClock> {
        TriggerEngine::new(
            ScriptedSource::default(),
            MemoryTransport::new(),
            ManualClock::new(),
            pads,
            EngineSettings::default(),
            Arc::new(HiHatState::new()),
        )
    }

    #[test]
    fn test_kick_scenario() {
        let mut engine = engine(kit());
        engine.source_mut().set(0, 3500);

        let report = engine.poll_once();

        assert_eq!(
            engine.transport().written(),
            vec![vec![0x90, 36, 115], vec![0x80, 36, 0]]
        );
        assert_eq!(report.events, NoteEvent::pair(0, 36, 115).to_vec());
    }

    #[test]
    fn test_quiet_hat_scenario() {
        let mut engine = engine(kit());
        engine.source_mut().set(2, 100);

        let report = engine.poll_once();
        assert!(report.events.is_empty());
        assert!(engine.transport().written().is_empty());
    }

    #[test]
    fn test_samples_lines_in_order() {
        let mut engine = engine(kit());
        engine.poll_once();
        engine.poll_once();
        assert_eq!(engine.source_mut().reads, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_drains_before_sampling() {
        let mut engine = engine(kit());
        engine.transport_mut().push_inbound([0x09, 0x90, 60, 1]);
        engine.transport_mut().push_inbound([0x08, 0x80, 60, 0]);

        let report = engine.poll_once();
        assert_eq!(report.drained, 2);
        assert!(!engine.transport_mut().packet_available());
    }

    #[test]
    fn test_minimum_velocity_clamp() {
        let mut engine = engine(kit());
        // 0.25 V crosses the snare threshold but maps to a velocity under 30.
        engine.source_mut().set(1, 311);

        engine.poll_once();
        assert_eq!(
            engine.transport().written(),
            vec![vec![0x90, 38, 30], vec![0x80, 38, 0]]
        );
    }

    #[test]
    fn test_settle_window_is_per_pad() {
        let mut engine = engine(kit());
        engine.source_mut().set(0, 3500);
        engine.poll_once();

        // Kick is settling; snare on another line is not held up.
        engine.clock_mut().set(ms(10));
        engine.source_mut().set(1, 2000);
        let report = engine.poll_once();
        assert_eq!(report.events.len(), 2);
        assert_eq!(report.events[0].note, 38);

        // After the kick's window it fires again.
        engine.clock_mut().set(ms(500));
        engine.source_mut().set(1, 0);
        let report = engine.poll_once();
        assert_eq!(report.events[0].note, 36);
    }

    #[test]
    fn test_priority_on_shared_line() {
        let pads = vec![
            Pad::new("kick", 0, 0.4, ms(500), NoteResolver::Fixed(36)),
            Pad::new("tom", 0, 0.2, ms(100), NoteResolver::Fixed(45)),
        ];
        let mut engine = engine(pads);
        engine.source_mut().set(0, 3000);

        let report = engine.poll_once();
        let notes: Vec<u8> = report.events.iter().map(|e| e.note).collect();
        assert_eq!(notes, vec![36, 36]);
    }

    #[test]
    fn test_hihat_note_tracks_pedal() {
        let mut engine = engine(kit());
        engine.source_mut().set(2, 2000);

        let report = engine.poll_once();
        assert_eq!(report.events[0].note, 42);

        engine.hihat.toggle();
        engine.clock_mut().set(ms(100));
        let report = engine.poll_once();
        assert_eq!(report.events[0].note, 46);
    }

    #[test]
    fn test_write_failure_still_settles() {
        let mut engine = engine(kit());
        engine.transport_mut().fail_writes(true);
        engine.source_mut().set(0, 3500);

        let report = engine.poll_once();
        assert_eq!(report.write_failures, 1);
        assert!(report.events.is_empty());
        assert_eq!(engine.stats().notes, 0);

        engine.transport_mut().fail_writes(false);
        engine.clock_mut().set(ms(10));
        let report = engine.poll_once();
        assert!(report.events.is_empty());
        assert_eq!(engine.stats().write_failures, 1);
    }

    #[test]
    fn test_failed_line_is_skipped() {
        let mut engine = engine(kit());
        engine.source_mut().failing = vec![0];
        engine.source_mut().set(1, 2000);

        let report = engine.step().unwrap();
        assert_eq!(report.failed_lines, 1);
        assert_eq!(report.events[0].note, 38);
    }

    /// Counts WARN events emitted while installed
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCounter {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_missing_input_warns_once() {
        use tracing_subscriber::layer::SubscriberExt;

        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber =
            tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));

        let mut engine = engine(kit());
        engine.source_mut().failing = vec![2];

        tracing::subscriber::with_default(subscriber, || {
            for _ in 0..50 {
                let report = engine.step().unwrap();
                assert_eq!(report.failed_lines, 1);
            }
            assert_eq!(engine.line_failing, vec![false, false, true]);

            // Recovery re-arms the warning.
            engine.source_mut().failing.clear();
            engine.step().unwrap();
            assert_eq!(engine.line_failing, vec![false, false, false]);

            engine.source_mut().failing = vec![2];
            engine.step().unwrap();
            engine.step().unwrap();
        });

        assert_eq!(warnings.load(Ordering::SeqCst), 2);
        assert_eq!(engine.stats().sample_failures, 52);
    }

    #[test]
    fn test_gives_up_after_consecutive_failures() {
        let mut engine = TriggerEngine::new(
            ScriptedSource {
                failing: vec![0, 1, 2],
                ..Default::default()
            },
            MemoryTransport::new(),
            ManualClock::new(),
            kit(),
            EngineSettings {
                max_consecutive_failures: 3,
                ..Default::default()
            },
            Arc::new(HiHatState::new()),
        );

        assert!(engine.step().is_ok());
        assert!(engine.step().is_ok());
        assert!(matches!(
            engine.step(),
            Err(EngineError::SourceUnavailable { passes: 3 })
        ));
    }

    #[test]
    fn test_run_stops_when_cleared() {
        let mut engine = engine(kit());
        let running = AtomicBool::new(false);
        engine.run(&running, None).unwrap();
        assert_eq!(engine.stats().passes, 0);
    }

    #[test]
    fn test_reading_helper() {
        let mut source = ScriptedSource::default();
        source.set(2, 99);
        assert_eq!(source.read(2).unwrap(), SampleReading { input: 2, raw: 99 });
    }
}
