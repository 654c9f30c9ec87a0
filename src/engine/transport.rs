//! Transport collaborator and inbound drain
//!
//! A MIDI port always has an input side, and a host that sends to it blocks
//! if nobody reads. Inbound packets are therefore drained before every pass
//! and thrown away.

use super::status::LinkState;
use std::collections::VecDeque;
use tracing::{trace, warn};

/// USB-MIDI style event packet: `[cable << 4 | CIN, status, data1, data2]`
pub type Packet = [u8; 4];

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no inbound packet available")]
    Empty,

    #[error("failed to send MIDI message: {0}")]
    Send(String),
}

/// Outbound/inbound MIDI endpoint
pub trait Transport {
    /// Whether an inbound packet is waiting
    fn packet_available(&mut self) -> bool;

    /// Take the next inbound packet
    fn read_packet(&mut self) -> Result<Packet, TransportError>;

    /// Write raw MIDI bytes on `cable`; returns the number of bytes written
    fn write_stream(&mut self, cable: u8, bytes: &[u8]) -> Result<usize, TransportError>;

    /// Connection state, for the status indicator
    fn link(&self) -> LinkState {
        LinkState::Mounted
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn packet_available(&mut self) -> bool {
        (**self).packet_available()
    }

    fn read_packet(&mut self) -> Result<Packet, TransportError> {
        (**self).read_packet()
    }

    fn write_stream(&mut self, cable: u8, bytes: &[u8]) -> Result<usize, TransportError> {
        (**self).write_stream(cable, bytes)
    }

    fn link(&self) -> LinkState {
        (**self).link()
    }
}

/// Read and discard inbound packets until none remain
///
/// Returns the number of packets discarded. A read error ends the drain for
/// this pass.
pub fn drain<T: Transport + ?Sized>(transport: &mut T) -> usize {
    let mut drained = 0;
    while transport.packet_available() {
        match transport.read_packet() {
            Ok(packet) => {
                trace!(?packet, "Discarded inbound packet");
                drained += 1;
            }
            Err(e) => {
                warn!(err = %e, "Inbound MIDI read failed");
                break;
            }
        }
    }
    drained
}

/// Code index number for a non-sysex message
fn code_index(status: u8) -> u8 {
    match status {
        0x80..=0xEF => status >> 4,
        0xF2 => 0x3,
        0xF1 | 0xF3 => 0x2,
        0xF6 => 0x5,
        _ => 0xF,
    }
}

/// Split a raw MIDI message into event packets
///
/// System exclusive data is carried three bytes at a time, with the final
/// packet's code index giving its length.
pub fn packetize(cable: u8, message: &[u8]) -> Vec<Packet> {
    let header = (cable & 0x0F) << 4;
    let Some(&status) = message.first() else {
        return Vec::new();
    };

    if status == 0xF0 {
        let chunks: Vec<&[u8]> = message.chunks(3).collect();
        let last = chunks.len() - 1;
        return chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let cin = if i < last {
                    0x4
                } else {
                    0x4 + chunk.len() as u8
                };
                let mut packet = [header | cin, 0, 0, 0];
                packet[1..=chunk.len()].copy_from_slice(chunk);
                packet
            })
            .collect();
    }

    let len = message.len().min(3);
    let mut packet = [header | code_index(status), 0, 0, 0];
    packet[1..=len].copy_from_slice(&message[..len]);
    vec![packet]
}

/// In-memory transport
///
/// Records every write and serves queued inbound packets. Used for dry runs
/// and tests.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<Packet>,
    writes: Vec<(u8, Vec<u8>)>,
    fail_writes: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound packet
    pub fn push_inbound(&mut self, packet: Packet) {
        self.inbound.push_back(packet);
    }

    /// Written messages without their cables
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.writes.iter().map(|(_, bytes)| bytes.clone()).collect()
    }

    /// Make subsequent writes fail
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl Transport for MemoryTransport {
    fn packet_available(&mut self) -> bool {
        !self.inbound.is_empty()
    }

    fn read_packet(&mut self) -> Result<Packet, TransportError> {
        self.inbound.pop_front().ok_or(TransportError::Empty)
    }

    fn write_stream(&mut self, cable: u8, bytes: &[u8]) -> Result<usize, TransportError> {
        if self.fail_writes {
            return Err(TransportError::Send("writes disabled".to_string()));
        }
        self.writes.push((cable, bytes.to_vec()));
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_discards_everything() {
        let mut transport = MemoryTransport::new();
        for i in 0..5 {
            transport.push_inbound([0x09, 0x90, i, 100]);
        }

        assert_eq!(drain(&mut transport), 5);
        assert!(!transport.packet_available());
        assert!(transport.written().is_empty());
    }

    #[test]
    fn test_drain_empty() {
        let mut transport = MemoryTransport::new();
        assert_eq!(drain(&mut transport), 0);
    }

    #[test]
    fn test_read_empty_is_error() {
        let mut transport = MemoryTransport::new();
        assert!(matches!(transport.read_packet(), Err(TransportError::Empty)));
    }

    #[test]
    fn test_packetize_channel_voice() {
        assert_eq!(packetize(0, &[0x90, 60, 100]), vec![[0x09, 0x90, 60, 100]]);
        assert_eq!(packetize(1, &[0xB3, 7, 127]), vec![[0x1B, 0xB3, 7, 127]]);
        assert_eq!(packetize(0, &[0xC0, 5]), vec![[0x0C, 0xC0, 5, 0]]);
    }

    #[test]
    fn test_packetize_realtime() {
        assert_eq!(packetize(0, &[0xF8]), vec![[0x0F, 0xF8, 0, 0]]);
        assert_eq!(packetize(0, &[0xF2, 0x10, 0x20]), vec![[0x03, 0xF2, 0x10, 0x20]]);
    }

    #[test]
    fn test_packetize_sysex() {
        let packets = packetize(0, &[0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7]);
        assert_eq!(
            packets,
            vec![[0x04, 0xF0, 0x7E, 0x7F], [0x07, 0x06, 0x01, 0xF7]]
        );

        let packets = packetize(0, &[0xF0, 0x01, 0x02, 0xF7]);
        assert_eq!(packets, vec![[0x04, 0xF0, 0x01, 0x02], [0x05, 0xF7, 0, 0]]);
    }

    #[test]
    fn test_packetize_empty() {
        assert!(packetize(0, &[]).is_empty());
    }

    #[test]
    fn test_memory_records_cable() {
        let mut transport = MemoryTransport::new();
        transport.write_stream(3, &[0x90, 36, 100]).unwrap();
        assert_eq!(transport.writes, vec![(3, vec![0x90, 36, 100])]);
        assert_eq!(transport.link(), LinkState::Mounted);
    }
}
