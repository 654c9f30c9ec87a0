//! Status LED
//!
//! Blinks at a rate that reflects the transport link: fast while nothing is
//! connected, slow once connected, very slow while suspended.

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Transport link state as seen by the status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    NotMounted,
    Mounted,
    Suspended,
}

impl LinkState {
    pub fn blink_interval(&self) -> Duration {
        match self {
            LinkState::NotMounted => Duration::from_millis(250),
            LinkState::Mounted => Duration::from_millis(1000),
            LinkState::Suspended => Duration::from_millis(2500),
        }
    }
}

/// A binary indicator
pub trait StatusLed {
    fn set(&mut self, on: bool) -> std::io::Result<()>;
}

/// LED class device under /sys/class/leds
pub struct SysfsLed {
    brightness: PathBuf,
}

impl SysfsLed {
    /// `path` is either the LED directory or its `brightness` file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let brightness = if path.is_dir() {
            path.join("brightness")
        } else {
            path
        };
        Self { brightness }
    }
}

impl StatusLed for SysfsLed {
    fn set(&mut self, on: bool) -> std::io::Result<()> {
        std::fs::write(&self.brightness, if on { "1" } else { "0" })
    }
}

/// Something ticked once per polling pass
pub trait StatusTask {
    fn tick(&mut self, now: Duration, link: LinkState);
}

/// Toggles an LED once per elapsed blink interval
pub struct StatusBlinker<L> {
    led: L,
    start: Duration,
    on: bool,
    failed: bool,
}

impl<L: StatusLed> StatusBlinker<L> {
    pub fn new(led: L) -> Self {
        Self {
            led,
            start: Duration::ZERO,
            on: false,
            failed: false,
        }
    }
}

impl<L: StatusLed> StatusTask for StatusBlinker<L> {
    fn tick(&mut self, now: Duration, link: LinkState) {
        let interval = link.blink_interval();
        if now.saturating_sub(self.start) < interval {
            return;
        }
        self.start += interval;

        self.on = !self.on;
        if let Err(e) = self.led.set(self.on) {
            if !self.failed {
                warn!(err = %e, "Failed to drive status LED");
            }
            self.failed = true;
        } else {
            self.failed = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingLed {
        states: Vec<bool>,
    }

    impl StatusLed for RecordingLed {
        fn set(&mut self, on: bool) -> std::io::Result<()> {
            self.states.push(on);
            Ok(())
        }
    }

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_blink_intervals() {
        assert_eq!(LinkState::NotMounted.blink_interval(), ms(250));
        assert_eq!(LinkState::Mounted.blink_interval(), ms(1000));
        assert_eq!(LinkState::Suspended.blink_interval(), ms(2500));
    }

    #[test]
    fn test_blinks_once_per_interval() {
        let mut blinker = StatusBlinker::new(RecordingLed::default());

        blinker.tick(ms(100), LinkState::NotMounted);
        assert!(blinker.led.states.is_empty());

        blinker.tick(ms(250), LinkState::NotMounted);
        blinker.tick(ms(260), LinkState::NotMounted);
        blinker.tick(ms(500), LinkState::NotMounted);
        assert_eq!(blinker.led.states, vec![true, false]);
        assert!(!blinker.on);
    }

    #[test]
    fn test_mounted_blinks_slower() {
        let mut blinker = StatusBlinker::new(RecordingLed::default());

        blinker.tick(ms(500), LinkState::Mounted);
        assert!(blinker.led.states.is_empty());
        blinker.tick(ms(1000), LinkState::Mounted);
        assert_eq!(blinker.led.states, vec![true]);
    }

    #[test]
    fn test_sysfs_led() {
        let dir = TempDir::new().unwrap();
        let brightness = dir.path().join("brightness");
        std::fs::write(&brightness, "0").unwrap();

        let mut led = SysfsLed::new(dir.path());
        led.set(true).unwrap();
        assert_eq!(std::fs::read_to_string(&brightness).unwrap(), "1");
        led.set(false).unwrap();
        assert_eq!(std::fs::read_to_string(&brightness).unwrap(), "0");
    }
}
