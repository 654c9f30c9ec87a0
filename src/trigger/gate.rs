//! Threshold gates and sense-line priority chains
//!
//! Each pad has a gate that is either idle or settling after a firing. Pads
//! that share one analog input form a sense line and are evaluated in
//! configuration order, first match wins: when one hit crosses several
//! thresholds on the same line, the earliest pad takes it.

use super::{HiHatState, Pad};
use std::time::Duration;

/// Gate state of one pad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    /// Fired; not eligible again until `until`
    Firing { until: Duration },
}

/// Result of evaluating one gate against a voltage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Voltage under threshold
    Below,
    /// Crossed threshold while idle; a note must be sent
    Fired,
    /// Crossed threshold inside the settle window
    Settling,
}

/// Threshold gate for one pad
#[derive(Debug, Clone)]
pub struct Gate {
    pad: Pad,
    state: GateState,
}

impl Gate {
    pub fn new(pad: Pad) -> Self {
        Self {
            pad,
            state: GateState::Idle,
        }
    }

    pub fn pad(&self) -> &Pad {
        &self.pad
    }

    /// State as of `now`
    fn state(&self, now: Duration) -> GateState {
        match self.state {
            GateState::Firing { until } if now >= until => GateState::Idle,
            state => state,
        }
    }

    /// Compare `volts` to the threshold at time `now`
    pub fn evaluate(&mut self, volts: f64, now: Duration) -> Evaluation {
        self.state = self.state(now);

        if volts < self.pad.threshold_volts {
            return Evaluation::Below;
        }

        match self.state {
            GateState::Idle => {
                self.state = GateState::Firing {
                    until: now + self.pad.settle,
                };
                Evaluation::Fired
            }
            GateState::Firing { .. } => Evaluation::Settling,
        }
    }
}

/// Outcome of one pass over a sense line
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// No pad crossed its threshold
    Quiet,
    /// Pad at `index` fired with the resolved `note`
    Fired { index: usize, note: u8 },
    /// Pad at `index` crossed its threshold but is still settling
    Settling { index: usize },
}

/// Pads sharing one analog input, in priority order
#[derive(Debug, Clone)]
pub struct SenseLine {
    input: u8,
    gates: Vec<Gate>,
}

impl SenseLine {
    pub fn new(input: u8) -> Self {
        Self {
            input,
            gates: Vec::new(),
        }
    }

    pub fn input(&self) -> u8 {
        self.input
    }

    pub fn push(&mut self, pad: Pad) {
        self.gates.push(Gate::new(pad));
    }

    pub fn pad(&self, index: usize) -> Option<&Pad> {
        self.gates.get(index).map(Gate::pad)
    }

    /// Run the priority chain for one reading
    ///
    /// The first pad whose threshold is crossed claims the pass, even when
    /// it is settling, so later pads on the line never see that hit. A
    /// hi-hat note is resolved at the instant of firing.
    pub fn evaluate(&mut self, volts: f64, now: Duration, hihat: &HiHatState) -> LineOutcome {
        for (index, gate) in self.gates.iter_mut().enumerate() {
            match gate.evaluate(volts, now) {
                Evaluation::Below => continue,
                Evaluation::Fired => {
                    let note = gate.pad().note.resolve(hihat);
                    return LineOutcome::Fired { index, note };
                }
                Evaluation::Settling => return LineOutcome::Settling { index },
            }
        }
        LineOutcome::Quiet
    }
}

/// Group pads into sense lines
///
/// Lines are ordered by the first appearance of their input, and pads keep
/// their configuration order within a line.
pub fn sense_lines(pads: impl IntoIterator<Item = Pad>) -> Vec<SenseLine> {
    let mut lines: Vec<SenseLine> = Vec::new();
    for pad in pads {
        match lines.iter_mut().find(|line| line.input == pad.input) {
            Some(line) => line.push(pad),
            None => {
                let mut line = SenseLine::new(pad.input);
                line.push(pad);
                lines.push(line);
            }
        }
    }
    lines
}
