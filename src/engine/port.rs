//! Host MIDI port transport using midir.

use std::sync::mpsc::{self, Receiver, Sender};

use anyhow::{anyhow, Result};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::{debug, info};

use super::transport::{packetize, Packet, Transport, TransportError};

const CLIENT_NAME: &str = "padtrig";

/// Transport over a host MIDI port.
///
/// Notes go out through the output connection. Anything arriving on the
/// matching input port is queued as event packets so it can be drained.
pub struct MidirTransport {
    port_name: String,
    output: MidiOutputConnection,
    _input: Option<MidiInputConnection<()>>,
    inbound: Receiver<Packet>,
    pending: Option<Packet>,
}

impl MidirTransport {
    /// Connect to the output port whose name contains `port_name`, or the
    /// first port when none is given.
    pub fn connect(port_name: Option<&str>) -> Result<Self> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let ports = midi_out.ports();

        if ports.is_empty() {
            return Err(anyhow!("No MIDI output ports available"));
        }

        let port = if let Some(name) = port_name {
            ports
                .iter()
                .find(|p| {
                    midi_out
                        .port_name(p)
                        .map(|n| n.contains(name))
                        .unwrap_or(false)
                })
                .ok_or_else(|| anyhow!("MIDI port '{}' not found", name))?
                .clone()
        } else {
            ports[0].clone()
        };

        let port_name_actual = midi_out.port_name(&port)?;
        let output = midi_out
            .connect(&port, "padtrig-output")
            .map_err(|e| anyhow!("failed to connect to MIDI port '{}': {}", port_name_actual, e))?;

        let (sender, inbound) = mpsc::channel();
        let input = connect_input(&port_name_actual, sender)?;
        if input.is_none() {
            debug!(port = %port_name_actual, "No matching MIDI input port; nothing to drain");
        }

        info!(port = %port_name_actual, "MIDI output connected");

        Ok(Self {
            port_name: port_name_actual,
            output,
            _input: input,
            inbound,
            pending: None,
        })
    }

    /// Publish a virtual port pair that other applications can connect to.
    #[cfg(unix)]
    pub fn create_virtual(name: &str) -> Result<Self> {
        use midir::os::unix::{VirtualInput, VirtualOutput};

        let output = MidiOutput::new(CLIENT_NAME)?
            .create_virtual(name)
            .map_err(|e| anyhow!("failed to create virtual MIDI output '{}': {}", name, e))?;

        let (sender, inbound) = mpsc::channel();
        let mut midi_in = MidiInput::new(CLIENT_NAME)?;
        midi_in.ignore(Ignore::None);
        let input = midi_in
            .create_virtual(name, forward_packets(sender), ())
            .map_err(|e| anyhow!("failed to create virtual MIDI input '{}': {}", name, e))?;

        info!(port = %name, "Virtual MIDI port created");

        Ok(Self {
            port_name: name.to_string(),
            output,
            _input: Some(input),
            inbound,
            pending: None,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

fn forward_packets(sender: Sender<Packet>) -> impl FnMut(u64, &[u8], &mut ()) + Send + 'static {
    move |_, message, _| {
        for packet in packetize(0, message) {
            // The receiver only goes away with the transport.
            let _ = sender.send(packet);
        }
    }
}

fn connect_input(port_name: &str, sender: Sender<Packet>) -> Result<Option<MidiInputConnection<()>>> {
    let mut midi_in = MidiInput::new(CLIENT_NAME)?;
    midi_in.ignore(Ignore::None);

    let port = midi_in.ports().into_iter().find(|p| {
        midi_in
            .port_name(p)
            .map(|n| n == port_name)
            .unwrap_or(false)
    });

    let Some(port) = port else {
        return Ok(None);
    };

    let connection = midi_in
        .connect(&port, "padtrig-input", forward_packets(sender), ())
        .map_err(|e| anyhow!("failed to connect to MIDI input '{}': {}", port_name, e))?;
    Ok(Some(connection))
}

impl Transport for MidirTransport {
    fn packet_available(&mut self) -> bool {
        if self.pending.is_none() {
            self.pending = self.inbound.try_recv().ok();
        }
        self.pending.is_some()
    }

    fn read_packet(&mut self) -> Result<Packet, TransportError> {
        match self.pending.take() {
            Some(packet) => Ok(packet),
            None => self.inbound.try_recv().map_err(|_| TransportError::Empty),
        }
    }

    fn write_stream(&mut self, _cable: u8, bytes: &[u8]) -> Result<usize, TransportError> {
        // Host ports carry a single cable.
        self.output
            .send(bytes)
            .map_err(|e| TransportError::Send(e.to_string()))?;
        Ok(bytes.len())
    }
}

/// List available MIDI output ports.
pub fn list_midi_ports() -> Result<Vec<String>> {
    let midi_out = MidiOutput::new("padtrig port listing")?;
    let ports = midi_out.ports();

    let names: Vec<String> = ports
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect();

    Ok(names)
}
