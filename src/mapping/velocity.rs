//! Converter code to velocity and voltage
//!
//! A single raw code is quantified twice: once as a MIDI velocity and once
//! as a voltage. The voltage is only compared against pad thresholds; the
//! velocity is only sent.

use super::{GainMapper, LinearMapper, Mapper, MappingPipeline};

/// Largest MIDI data byte
pub const MIDI_MAX: f64 = 127.0;

/// Maps raw converter codes onto velocity and voltage
pub struct VelocityMapper {
    velocity: MappingPipeline,
    voltage: LinearMapper,
}

impl VelocityMapper {
    /// Create a mapper for a converter with the given full-scale code
    ///
    /// `gain` stretches the 7-bit scale so moderate hits reach usable
    /// loudness; the result is not clamped here.
    pub fn new(max_code: u16, reference_voltage: f64, gain: f64) -> Self {
        let full_scale = max_code as f64;
        let velocity = MappingPipeline::new()
            .with(LinearMapper::new(0.0, full_scale, 0.0, MIDI_MAX).with_clamp(false))
            .with(GainMapper::new(gain));
        let voltage = LinearMapper::new(0.0, full_scale, 0.0, reference_voltage).with_clamp(false);

        Self { velocity, voltage }
    }

    /// Unclamped velocity for a raw code
    pub fn to_velocity(&self, raw: u16) -> f64 {
        self.velocity.apply(raw as f64)
    }

    /// Voltage at the converter input for a raw code
    pub fn to_voltage(&self, raw: u16) -> f64 {
        self.voltage.map(raw as f64)
    }
}

/// Full-scale code of an unsigned converter
pub fn max_code_for_bits(bits: u8) -> u16 {
    let bits = bits.clamp(1, 16) as u32;
    ((1u32 << bits) - 1) as u16
}

/// Inclusive range a sent velocity is clamped into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VelocityRange {
    pub min: u8,
    pub max: u8,
}

impl VelocityRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// Clamp an unclamped velocity; fractional parts are truncated
    pub fn clamp(&self, velocity: f64) -> u8 {
        if velocity.is_nan() {
            return self.min;
        }
        velocity.clamp(self.min as f64, self.max as f64) as u8
    }
}

impl Default for VelocityRange {
    fn default() -> Self {
        Self { min: 30, max: 115 }
    }
}
