//! Falling-edge detection on a digital level
//!
//! Turns a stream of polled pin levels into discrete presses. The hi-hat
//! pedal idles high through a pull-up and reads low while pressed, so a press
//! shows up as a falling edge.

/// Stateful falling-edge detector
///
/// Primed with the level the pin reads when detection starts, so a pin that
/// is already low never produces an edge on its first sample.
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    previous: bool,
}

impl EdgeDetector {
    /// Detector primed with the current pin level
    pub fn primed(level: bool) -> Self {
        Self { previous: level }
    }

    /// Feed the next level; returns true on a high-to-low transition
    pub fn process(&mut self, level: bool) -> bool {
        let previous = std::mem::replace(&mut self.previous, level);
        previous && !level
    }
}
