//! Hi-hat open/closed state
//!
//! The pedal toggles a single process-wide flag. The flag is written from the
//! edge context (the pedal watcher thread, or replay) and read by the polling
//! loop whenever a hi-hat pad fires, so it lives in one atomic word.

use crate::mapping::EdgeDetector;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Hi-hat position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiHat {
    Closed,
    Open,
}

/// Shared hi-hat flag, starts closed and is never reset
#[derive(Debug, Default)]
pub struct HiHatState {
    open: AtomicBool,
}

impl HiHatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the state; returns the new value
    pub fn toggle(&self) -> HiHat {
        let was_open = self.open.fetch_xor(true, Ordering::AcqRel);
        if was_open {
            HiHat::Closed
        } else {
            HiHat::Open
        }
    }

    /// Most recent state
    pub fn current(&self) -> HiHat {
        if self.open.load(Ordering::Acquire) {
            HiHat::Open
        } else {
            HiHat::Closed
        }
    }
}

/// Turns pedal levels into hi-hat toggles
///
/// The pedal input idles high through a pull-up; every falling edge toggles
/// the state. No debounce is applied. A new controller assumes the idle
/// level until primed with the pin's actual level.
pub struct HiHatController {
    state: Arc<HiHatState>,
    detector: EdgeDetector,
}

impl HiHatController {
    pub fn new(state: Arc<HiHatState>) -> Self {
        Self {
            state,
            detector: EdgeDetector::primed(true),
        }
    }

    /// Take `level` as the current pin level without toggling
    pub fn prime(&mut self, level: bool) {
        self.detector = EdgeDetector::primed(level);
    }

    /// Feed a pin level (true = high); toggles on a falling edge
    pub fn on_level(&mut self, level: bool) -> Option<HiHat> {
        if self.detector.process(level) {
            let hat = self.state.toggle();
            debug!(state = ?hat, "Hi-hat pedal edge");
            Some(hat)
        } else {
            None
        }
    }

    /// Feed the pedal position; a pressed pedal pulls the pin low
    pub fn on_pedal(&mut self, down: bool) -> Option<HiHat> {
        self.on_level(!down)
    }
}

/// Watches a sysfs GPIO `value` file on its own thread
///
/// Runs independently of the polling loop, standing in for an edge
/// interrupt on hosts without one.
pub struct PedalWatcher {
    path: PathBuf,
    interval: Duration,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PedalWatcher {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Start polling; edges toggle the controller's state
    pub fn start(&mut self, mut controller: HiHatController) -> anyhow::Result<()> {
        if self.is_running() {
            return Ok(());
        }

        // Fail early if the pin cannot be read at all. A pedal already held
        // down at startup is not a press.
        let level = read_level(&self.path)?;
        controller.prime(level);

        self.running.store(true, Ordering::SeqCst);
        let path = self.path.clone();
        let interval = self.interval;
        let running = Arc::clone(&self.running);

        let thread = thread::Builder::new()
            .name("pedal-watcher".to_string())
            .spawn(move || {
                let mut failing = false;
                while running.load(Ordering::SeqCst) {
                    match read_level(&path) {
                        Ok(level) => {
                            failing = false;
                            controller.on_level(level);
                        }
                        Err(e) if !failing => {
                            failing = true;
                            warn!(path = ?path, err = %e, "Failed to read hi-hat pedal");
                        }
                        Err(_) => {}
                    }
                    thread::sleep(interval);
                }
            })?;

        self.thread = Some(thread);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for PedalWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_level(path: &Path) -> anyhow::Result<bool> {
    let contents = std::fs::read_to_string(path)?;
    match contents.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => anyhow::bail!("unexpected GPIO value {:?}", other),
    }
}
