//! Linear mappers
//!
//! Converter codes map onto volts and onto the 7-bit MIDI scale by straight
//! lines through the origin, so both conversions are built from these.

use super::Mapper;

/// Linear interpolation mapper
pub struct LinearMapper {
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
    clamp: bool,
}

impl LinearMapper {
    /// Create a new linear mapper
    pub fn new(in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> Self {
        Self {
            in_min,
            in_max,
            out_min,
            out_max,
            clamp: true,
        }
    }

    /// Set whether to clamp output to range
    pub fn with_clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }
}

impl Mapper for LinearMapper {
    fn map(&self, input: f64) -> f64 {
        let in_range = self.in_max - self.in_min;
        let normalized = if in_range.abs() < f64::EPSILON {
            0.0
        } else {
            (input - self.in_min) / in_range
        };

        let out_range = self.out_max - self.out_min;
        let output = self.out_min + normalized * out_range;

        if self.clamp {
            output.clamp(self.out_min.min(self.out_max), self.out_min.max(self.out_max))
        } else {
            output
        }
    }
}

/// Fixed multiplicative gain
pub struct GainMapper {
    gain: f64,
}

impl GainMapper {
    pub fn new(gain: f64) -> Self {
        Self { gain }
    }
}

impl Mapper for GainMapper {
    fn map(&self, input: f64) -> f64 {
        input * self.gain
    }
}
