//! Signal sources for padtrig
//!
//! A source is a shared analog converter multiplexed across several inputs.
//! Backends: Linux IIO sysfs, sound card capture, and capture replay.

mod audio;
mod iio;
mod replay;
mod source;

pub use audio::{AudioInputConfig, AudioSource, PeakMeter};
pub use iio::{IioConfig, IioSource};
pub use replay::{Capture, CaptureFrame, ReplaySource};
pub use source::{SampleReading, SignalSource, SourceError};
