//! padtrig - Piezo drum pads to MIDI
//!
//! Samples analog pad signals, gates them against per-pad thresholds, and
//! sends a Note On/Note Off pair for every hit. A pedal input switches the
//! hi-hat pad between its closed and open notes.

pub mod config;
pub mod engine;
pub mod mapping;
pub mod session;
pub mod sources;
pub mod trigger;

pub use config::PadtrigConfig;
pub use engine::TriggerEngine;
