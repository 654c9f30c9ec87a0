//! Mapping from converter codes to musical values
//!
//! Raw analog codes become velocities and voltages; pin levels become edges.

mod edge;
mod linear;
mod mapper;
mod velocity;

pub use edge::EdgeDetector;
pub use linear::{GainMapper, LinearMapper};
pub use mapper::{Mapper, MappingPipeline};
pub use velocity::{max_code_for_bits, VelocityMapper, VelocityRange, MIDI_MAX};
