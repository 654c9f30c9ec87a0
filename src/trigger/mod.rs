//! Trigger decision logic
//!
//! Threshold gates with per-pad settle windows, sense-line priority chains,
//! and the hi-hat open/closed state that remaps a shared pad's note.

mod gate;
mod hihat;
mod pad;

pub use gate::{sense_lines, LineOutcome, SenseLine};
pub use hihat::{HiHat, HiHatController, HiHatState, PedalWatcher};
pub use pad::{NoteResolver, Pad};
