//! Audio-interface source using cpal
//!
//! Piezo pads wired into a sound card's line inputs. Each input channel of
//! the capture stream acts as one analog input; a sample request returns the
//! peak level seen on that channel since the previous request, scaled to
//! converter codes.

use super::{SignalSource, SourceError};
use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Sample, SampleFormat, Stream, StreamConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Configuration for the audio source
#[derive(Debug, Clone, Default)]
pub struct AudioInputConfig {
    /// Substring of the input device name (None = default device)
    pub device: Option<String>,
}

impl AudioInputConfig {
    /// Create config from settings map
    pub fn from_settings(settings: &HashMap<String, serde_yaml::Value>) -> Result<Self> {
        let device = settings
            .get("device")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(Self { device })
    }
}

/// Per-channel peak hold shared with the audio callback
#[derive(Debug, Clone)]
pub struct PeakMeter {
    peaks: Arc<Vec<AtomicU32>>,
}

impl PeakMeter {
    pub fn new(channels: usize) -> Self {
        Self {
            peaks: Arc::new((0..channels).map(|_| AtomicU32::new(0)).collect()),
        }
    }

    /// Record one interleaved block of samples
    pub fn record(&self, frames: &[f32]) {
        let channels = self.peaks.len();
        if channels == 0 {
            return;
        }
        for frame in frames.chunks(channels) {
            for (peak, sample) in self.peaks.iter().zip(frame) {
                // Non-negative floats order the same way as their bit patterns.
                peak.fetch_max(sample.abs().to_bits(), Ordering::Relaxed);
            }
        }
    }

    /// Take and reset the held peak of a channel
    pub fn take(&self, channel: usize) -> Option<f32> {
        self.peaks
            .get(channel)
            .map(|peak| f32::from_bits(peak.swap(0, Ordering::Relaxed)))
    }
}

/// Sound card capture stream used as a converter
pub struct AudioSource {
    meter: PeakMeter,
    max_code: u16,
    _stream: Option<Stream>,
}

impl AudioSource {
    /// Open the configured input device and start capturing
    pub fn open(config: &AudioInputConfig, max_code: u16) -> Result<Self> {
        let host = cpal::default_host();
        let device = match &config.device {
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n.contains(name.as_str())).unwrap_or(false))
                .ok_or_else(|| anyhow!("Audio input '{}' not found", name))?,
            None => host
                .default_input_device()
                .ok_or_else(|| anyhow!("No input device available"))?,
        };

        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        let stream_config: StreamConfig = supported.into();
        let meter = PeakMeter::new(stream_config.channels as usize);

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, meter.clone())?,
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, meter.clone())?,
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, meter.clone())?,
            _ => return Err(anyhow!("Unsupported sample format")),
        };
        stream.play()?;

        info!(
            device = %device.name().unwrap_or_default(),
            channels = stream_config.channels,
            "Audio input capturing"
        );

        Ok(Self {
            meter,
            max_code,
            _stream: Some(stream),
        })
    }

    /// Source fed by an existing meter, with no stream of its own
    #[cfg(test)]
    fn from_meter(meter: PeakMeter, max_code: u16) -> Self {
        Self {
            meter,
            max_code,
            _stream: None,
        }
    }
}

fn build_stream<T>(device: &Device, config: &StreamConfig, meter: PeakMeter) -> Result<Stream>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let mut scratch: Vec<f32> = Vec::new();
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            scratch.clear();
            scratch.extend(data.iter().map(|&s| s.to_sample::<f32>()));
            meter.record(&scratch);
        },
        |err| {
            error!(err = %err, "Audio input stream error");
        },
        None,
    )?;

    Ok(stream)
}

impl SignalSource for AudioSource {
    fn name(&self) -> &str {
        "audio"
    }

    fn max_code(&self) -> u16 {
        self.max_code
    }

    fn sample(&mut self, input: u8) -> Result<u16, SourceError> {
        let peak = self
            .meter
            .take(input as usize)
            .ok_or(SourceError::UnknownInput(input))?;
        let code = (peak.clamp(0.0, 1.0) * self.max_code as f32).round();
        Ok(code as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let mut settings = HashMap::new();
        settings.insert(
            "device".to_string(),
            serde_yaml::Value::String("Scarlett".to_string()),
        );
        let config = AudioInputConfig::from_settings(&settings).unwrap();
        assert_eq!(config.device.as_deref(), Some("Scarlett"));

        let config = AudioInputConfig::from_settings(&HashMap::new()).unwrap();
        assert!(config.device.is_none());
    }

    #[test]
    fn test_meter_holds_peak_per_channel() {
        let meter = PeakMeter::new(2);
        meter.record(&[0.1, -0.5, -0.75, 0.2, 0.3, 0.0]);

        assert_eq!(meter.take(0), Some(0.75));
        assert_eq!(meter.take(1), Some(0.5));
        // Reading resets the hold.
        assert_eq!(meter.take(0), Some(0.0));
        assert_eq!(meter.take(2), None);
    }

    #[test]
    fn test_peaks_scale_to_codes() {
        let meter = PeakMeter::new(2);
        let mut source = AudioSource::from_meter(meter.clone(), 4095);

        meter.record(&[1.0, 0.5]);
        assert_eq!(source.sample(0).unwrap(), 4095);
        assert_eq!(source.sample(1).unwrap(), 2048);
        assert_eq!(source.sample(0).unwrap(), 0);
        assert!(matches!(source.sample(3), Err(SourceError::UnknownInput(3))));
    }

    #[test]
    fn test_overdriven_input_caps_at_full_scale() {
        let meter = PeakMeter::new(1);
        let mut source = AudioSource::from_meter(meter.clone(), 1023);
        meter.record(&[1.7]);
        assert_eq!(source.sample(0).unwrap(), 1023);
    }
}
