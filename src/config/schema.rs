//! Configuration schema definitions

use crate::trigger::{NoteResolver, Pad};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Highest analog input index accepted
pub const MAX_INPUT: u8 = 7;

/// Main configuration for padtrig
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PadtrigConfig {
    /// Converter settings
    #[serde(default)]
    pub adc: AdcConfig,

    /// Velocity scaling and clamp
    #[serde(default)]
    pub velocity: VelocityConfig,

    /// MIDI output
    #[serde(default)]
    pub midi: MidiConfig,

    /// Polling loop settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Where converter codes come from
    #[serde(default)]
    pub source: SourceConfig,

    /// Hi-hat pedal input
    #[serde(default)]
    pub pedal: Option<PedalConfig>,

    /// Status LED
    #[serde(default)]
    pub status: Option<StatusConfig>,

    /// Pads, in priority order
    pub pads: Vec<PadConfig>,
}

impl PadtrigConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.adc.resolution_bits == 0 || self.adc.resolution_bits > 16 {
            bail!("ADC resolution must be between 1 and 16 bits");
        }
        if !(self.adc.reference_voltage > 0.0) {
            bail!("ADC reference voltage must be positive");
        }

        if self.velocity.min > self.velocity.max {
            bail!("Velocity min must not exceed velocity max");
        }
        if self.velocity.max > 127 {
            bail!("Velocity max must be at most 127");
        }
        if !(self.velocity.gain > 0.0) {
            bail!("Velocity gain must be positive");
        }

        if self.midi.channel > 15 {
            bail!("MIDI channel must be between 0 and 15");
        }
        if self.midi.cable > 15 {
            bail!("MIDI cable must be between 0 and 15");
        }

        if self.pads.is_empty() {
            bail!("At least one pad must be configured");
        }

        for (i, pad) in self.pads.iter().enumerate() {
            if self.pads[..i].iter().any(|p| p.name == pad.name) {
                bail!("Duplicate pad name '{}'", pad.name);
            }
            if pad.input > MAX_INPUT {
                bail!("Pad '{}' uses input {}, max is {}", pad.name, pad.input, MAX_INPUT);
            }
            if !(pad.threshold_volts >= 0.0) {
                bail!("Pad '{}' threshold must not be negative", pad.name);
            }
            if pad.threshold_volts > self.adc.reference_voltage {
                bail!(
                    "Pad '{}' threshold {} V is above the {} V reference and can never fire",
                    pad.name,
                    pad.threshold_volts,
                    self.adc.reference_voltage
                );
            }
            for note in pad.note.notes() {
                if note > 127 {
                    bail!("Pad '{}' note {} is out of range", pad.name, note);
                }
            }
        }

        Ok(())
    }

    /// Runtime pads in configuration order
    pub fn pads(&self) -> Vec<Pad> {
        self.pads.iter().map(PadConfig::to_pad).collect()
    }
}

/// Analog converter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdcConfig {
    /// Converter resolution (default: 12)
    #[serde(default = "default_resolution_bits")]
    pub resolution_bits: u8,

    /// Reference voltage in volts (default: 3.3)
    #[serde(default = "default_reference_voltage")]
    pub reference_voltage: f64,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            resolution_bits: default_resolution_bits(),
            reference_voltage: default_reference_voltage(),
        }
    }
}

fn default_resolution_bits() -> u8 { 12 }
fn default_reference_voltage() -> f64 { 3.3 }

/// Velocity mapping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityConfig {
    /// Gain on the 7-bit scale (default: 1.5)
    #[serde(default = "default_gain")]
    pub gain: f64,

    /// Quietest velocity sent (default: 30)
    #[serde(default = "default_velocity_min")]
    pub min: u8,

    /// Loudest velocity sent (default: 115)
    #[serde(default = "default_velocity_max")]
    pub max: u8,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            gain: default_gain(),
            min: default_velocity_min(),
            max: default_velocity_max(),
        }
    }
}

fn default_gain() -> f64 { 1.5 }
fn default_velocity_min() -> u8 { 30 }
fn default_velocity_max() -> u8 { 115 }

/// MIDI output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MidiConfig {
    /// Output port name substring (None = first port)
    pub port: Option<String>,

    /// Publish a virtual port with this name instead (unix only)
    pub virtual_port: Option<String>,

    /// Cable (jack) number (default: 0)
    #[serde(default)]
    pub cable: u8,

    /// MIDI channel, 0 for channel 1 (default: 0)
    #[serde(default)]
    pub channel: u8,
}

/// Polling loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pause between passes in microseconds (default: 0, poll flat out)
    #[serde(default)]
    pub poll_interval_us: u64,

    /// Fully failed passes in a row before stopping (default: 1000, 0 = never)
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_us: 0,
            max_consecutive_failures: default_max_failures(),
        }
    }
}

fn default_max_failures() -> u32 { 1000 }

/// Signal source configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source type
    #[serde(default)]
    pub kind: SourceKind,

    /// Source-specific settings
    #[serde(default)]
    pub settings: HashMap<String, serde_yaml::Value>,
}

/// Types of signal sources
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Linux IIO converter
    #[default]
    Iio,
    /// Sound card input
    Audio,
    /// Recorded capture
    Replay,
}

/// Hi-hat pedal input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PedalConfig {
    /// GPIO `value` file the pedal is wired to
    pub gpio_value: String,

    /// Poll period in microseconds (default: 1000)
    #[serde(default = "default_pedal_poll_us")]
    pub poll_us: u64,
}

impl PedalConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_us)
    }
}

fn default_pedal_poll_us() -> u64 { 1000 }

/// Status LED
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// LED class directory or brightness file
    pub led: String,
}

/// One pad
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PadConfig {
    /// Unique name for this pad
    pub name: String,

    /// Analog input index
    pub input: u8,

    /// Firing threshold in volts
    pub threshold_volts: f64,

    /// Dead time after a firing in milliseconds (default: 500)
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Note number, or `{ closed, open }` for a hi-hat pad
    pub note: NoteResolver,
}

fn default_settle_ms() -> u64 { 500 }

impl PadConfig {
    pub fn to_pad(&self) -> Pad {
        Pad::new(
            self.name.clone(),
            self.input,
            self.threshold_volts,
            Duration::from_millis(self.settle_ms),
            self.note,
        )
    }
}
