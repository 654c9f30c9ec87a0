//! Linux IIO converter source
//!
//! Reads raw codes through the industrial I/O sysfs interface, one
//! `in_voltage{N}_raw` attribute per multiplexed input.

use super::{SignalSource, SourceError};
use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;

const DEFAULT_DEVICE: &str = "/sys/bus/iio/devices/iio:device0";

/// Configuration for the IIO source
#[derive(Debug, Clone)]
pub struct IioConfig {
    /// Device directory under /sys/bus/iio/devices
    pub device: PathBuf,
}

impl IioConfig {
    /// Create config from settings map
    pub fn from_settings(settings: &HashMap<String, serde_yaml::Value>) -> Result<Self> {
        let device = settings
            .get("device")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_DEVICE);

        Ok(Self {
            device: PathBuf::from(device),
        })
    }
}

impl Default for IioConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
        }
    }
}

/// Converter exposed through IIO sysfs
pub struct IioSource {
    config: IioConfig,
    max_code: u16,
}

impl IioSource {
    pub fn new(config: IioConfig, max_code: u16) -> Self {
        Self { config, max_code }
    }

    fn attribute(&self, input: u8) -> PathBuf {
        self.config.device.join(format!("in_voltage{input}_raw"))
    }
}

impl SignalSource for IioSource {
    fn name(&self) -> &str {
        "iio"
    }

    fn max_code(&self) -> u16 {
        self.max_code
    }

    fn sample(&mut self, input: u8) -> Result<u16, SourceError> {
        let path = self.attribute(input);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::UnknownInput(input))
            }
            Err(source) => return Err(SourceError::Io { path, source }),
        };

        let value = contents.trim();
        let raw: u32 = value.parse().map_err(|_| SourceError::Parse {
            path: path.clone(),
            value: value.to_string(),
        })?;

        // Some drivers report codes above full scale on overload.
        Ok(raw.min(self.max_code as u32) as u16)
    }
}
