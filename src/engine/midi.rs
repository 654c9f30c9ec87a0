//! MIDI note messages and the event emitter
//!
//! A firing becomes a zero-length note: Note On immediately followed by
//! Note Off. The decay is left to the receiving synthesizer.

use super::transport::{Transport, TransportError};

/// MIDI message types sent by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note on: channel (0-15), note (0-127), velocity (0-127)
    NoteOn(u8, u8, u8),
    /// Note off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff(u8, u8, u8),
}

impl MidiMessage {
    /// Convert to raw MIDI bytes.
    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            MidiMessage::NoteOn(ch, note, vel) => [0x90 | (ch & 0x0F), note & 0x7F, vel & 0x7F],
            MidiMessage::NoteOff(ch, note, vel) => [0x80 | (ch & 0x0F), note & 0x7F, vel & 0x7F],
        }
    }
}

/// A logical note event produced by a gate firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub note: u8,
    pub velocity: u8,
    /// Analog input of the pad that fired
    pub input: u8,
    pub on: bool,
}

impl NoteEvent {
    /// The Note On / Note Off pair for one firing
    pub fn pair(input: u8, note: u8, velocity: u8) -> [NoteEvent; 2] {
        [
            NoteEvent {
                note,
                velocity,
                input,
                on: true,
            },
            NoteEvent {
                note,
                velocity: 0,
                input,
                on: false,
            },
        ]
    }

    /// Wire message on the given MIDI channel
    pub fn message(&self, channel: u8) -> MidiMessage {
        if self.on {
            MidiMessage::NoteOn(channel, self.note, self.velocity)
        } else {
            MidiMessage::NoteOff(channel, self.note, 0)
        }
    }
}

/// Write a Note On then a Note Off for `note`.
///
/// No buffering or retry: a failed Note On still attempts the Note Off, and
/// the first error is returned.
pub fn emit<T: Transport + ?Sized>(
    transport: &mut T,
    cable: u8,
    channel: u8,
    note: u8,
    velocity: u8,
) -> Result<(), TransportError> {
    let on = transport.write_stream(cable, &MidiMessage::NoteOn(channel, note, velocity).to_bytes());
    let off = transport.write_stream(cable, &MidiMessage::NoteOff(channel, note, 0).to_bytes());
    on.and(off).map(|_| ())
}

/// Emitter bound to one transport, cable and channel.
pub struct EventEmitter<T> {
    transport: T,
    cable: u8,
    channel: u8,
}

impl<T: Transport> EventEmitter<T> {
    pub fn new(transport: T, cable: u8, channel: u8) -> Self {
        Self {
            transport,
            cable: cable & 0x0F,
            channel: channel & 0x0F,
        }
    }

    /// Send the note pair for one firing.
    pub fn emit(&mut self, note: u8, velocity: u8) -> Result<(), TransportError> {
        emit(&mut self.transport, self.cable, self.channel, note, velocity)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::transport::MemoryTransport;

    #[test]
    fn test_midi_message_note_on() {
        let msg = MidiMessage::NoteOn(0, 36, 115);
        assert_eq!(msg.to_bytes(), [0x90, 36, 115]);
    }

    #[test]
    fn test_midi_message_note_on_channel() {
        let msg = MidiMessage::NoteOn(9, 38, 80);
        assert_eq!(msg.to_bytes(), [0x99, 38, 80]);
    }

    #[test]
    fn test_midi_message_note_off() {
        let msg = MidiMessage::NoteOff(0, 36, 0);
        assert_eq!(msg.to_bytes(), [0x80, 36, 0]);
    }

    #[test]
    fn test_data_bytes_masked() {
        let msg = MidiMessage::NoteOn(0x1F, 200, 255);
        assert_eq!(msg.to_bytes(), [0x9F, 200 & 0x7F, 0x7F]);
    }

    #[test]
    fn test_event_pair() {
        let [on, off] = NoteEvent::pair(0, 36, 115);
        assert!(on.on);
        assert!(!off.on);
        assert_eq!(on.message(0), MidiMessage::NoteOn(0, 36, 115));
        assert_eq!(off.message(0), MidiMessage::NoteOff(0, 36, 0));
    }

    #[test]
    fn test_emit_writes_on_then_off() {
        let mut transport = MemoryTransport::new();
        emit(&mut transport, 0, 0, 36, 115).unwrap();

        assert_eq!(
            transport.written(),
            vec![vec![0x90, 36, 115], vec![0x80, 36, 0]]
        );
    }

    #[test]
    fn test_emitter_uses_configured_channel() {
        let mut emitter = EventEmitter::new(MemoryTransport::new(), 1, 9);
        emitter.emit(38, 64).unwrap();

        assert_eq!(
            emitter.transport().written(),
            vec![vec![0x99, 38, 64], vec![0x89, 38, 0]]
        );
    }

    #[test]
    fn test_emit_error_is_not_retried() {
        let mut transport = MemoryTransport::new();
        transport.fail_writes(true);
        assert!(emit(&mut transport, 0, 0, 36, 100).is_err());
        assert!(transport.written().is_empty());
    }
}
