//! Capture replay source
//!
//! A capture is a YAML recording of converter codes and pedal state over
//! time. Replaying one drives the engine exactly as live hardware would,
//! which makes threshold tuning possible away from the kit.

use super::{SignalSource, SourceError};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// A recorded sequence of frames
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capture {
    #[serde(default)]
    pub frames: Vec<CaptureFrame>,
}

/// Converter state at one instant
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CaptureFrame {
    /// Milliseconds since the start of the capture
    pub at_ms: u64,

    /// Raw code per analog input, indexed by input number
    #[serde(default)]
    pub codes: Vec<u16>,

    /// Hi-hat pedal held down (None = unchanged)
    #[serde(default)]
    pub pedal_down: Option<bool>,
}

impl CaptureFrame {
    pub fn at(&self) -> Duration {
        Duration::from_millis(self.at_ms)
    }
}

impl Capture {
    /// Load a capture from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read capture {:?}", path))?;
        let capture: Capture = serde_yaml::from_str(&contents)?;
        capture.validate()?;
        Ok(capture)
    }

    /// Frames must be in time order
    pub fn validate(&self) -> Result<()> {
        for pair in self.frames.windows(2) {
            if pair[1].at_ms < pair[0].at_ms {
                bail!(
                    "Capture frame at {} ms comes after frame at {} ms",
                    pair[1].at_ms,
                    pair[0].at_ms
                );
            }
        }
        Ok(())
    }

    /// Time of the last frame
    pub fn duration(&self) -> Duration {
        self.frames.last().map(CaptureFrame::at).unwrap_or_default()
    }
}

/// Source that serves the codes of the currently loaded frame
pub struct ReplaySource {
    codes: Vec<u16>,
    max_code: u16,
}

impl ReplaySource {
    pub fn new(max_code: u16) -> Self {
        Self {
            codes: Vec::new(),
            max_code,
        }
    }

    /// Make `frame` the converter state for subsequent samples
    pub fn load_frame(&mut self, frame: &CaptureFrame) {
        self.codes.clear();
        self.codes
            .extend(frame.codes.iter().map(|&code| code.min(self.max_code)));
    }
}

impl SignalSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    fn max_code(&self) -> u16 {
        self.max_code
    }

    fn sample(&mut self, input: u8) -> Result<u16, SourceError> {
        // Inputs absent from a frame were silent.
        Ok(self.codes.get(input as usize).copied().unwrap_or(0))
    }
}
