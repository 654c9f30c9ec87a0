//! Pads and their note resolvers

use super::{HiHat, HiHatState};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a pad picks its note
///
/// In YAML either a bare note number, or a `closed`/`open` pair for a pad
/// that follows the hi-hat pedal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteResolver {
    Fixed(u8),
    HiHat { closed: u8, open: u8 },
}

impl NoteResolver {
    /// Note for the current hi-hat state
    pub fn resolve(&self, hihat: &HiHatState) -> u8 {
        match *self {
            NoteResolver::Fixed(note) => note,
            NoteResolver::HiHat { closed, open } => match hihat.current() {
                HiHat::Closed => closed,
                HiHat::Open => open,
            },
        }
    }

    /// All notes this resolver can produce
    pub fn notes(&self) -> Vec<u8> {
        match *self {
            NoteResolver::Fixed(note) => vec![note],
            NoteResolver::HiHat { closed, open } => vec![closed, open],
        }
    }
}

/// One logical instrument evaluated against an analog input
#[derive(Debug, Clone, PartialEq)]
pub struct Pad {
    pub name: String,
    /// Analog input index
    pub input: u8,
    /// Voltage at or above which the pad fires
    pub threshold_volts: f64,
    /// Dead time after a firing
    pub settle: Duration,
    pub note: NoteResolver,
}

impl Pad {
    pub fn new(
        name: impl Into<String>,
        input: u8,
        threshold_volts: f64,
        settle: Duration,
        note: NoteResolver,
    ) -> Self {
        Self {
            name: name.into(),
            input,
            threshold_volts,
            settle,
            note,
        }
    }
}
