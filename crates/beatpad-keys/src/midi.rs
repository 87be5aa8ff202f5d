//! MIDI output backends and note helpers
//!
//! JACK MIDI output is available with the `jack` feature. Without it (or
//! when no JACK server is running) notes go to a logging dummy output.

use crate::config::MidiSettings;
use crate::error::Result;

/// MIDI message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note on: channel, note, velocity
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note off: channel, note
    NoteOff { channel: u8, note: u8 },
    /// Control change: channel, controller, value
    ControlChange { channel: u8, controller: u8, value: u8 },
}

impl MidiMessage {
    /// Convert to raw MIDI bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), *note & 0x7F, *velocity & 0x7F]
            }
            MidiMessage::NoteOff { channel, note } => {
                vec![0x80 | (channel & 0x0F), *note & 0x7F, 0]
            }
            MidiMessage::ControlChange { channel, controller, value } => {
                vec![0xB0 | (channel & 0x0F), *controller & 0x7F, *value & 0x7F]
            }
        }
    }
}

/// MIDI output trait
pub trait MidiOutput: Send {
    /// Send a single message
    fn send(&self, message: MidiMessage);

    /// Send a note on message
    fn note_on(&self, channel: u8, note: u8, velocity: u8) {
        self.send(MidiMessage::NoteOn { channel, note, velocity });
    }

    /// Send a note off message
    fn note_off(&self, channel: u8, note: u8) {
        self.send(MidiMessage::NoteOff { channel, note });
    }

    /// Send a control change message
    fn control_change(&self, channel: u8, controller: u8, value: u8) {
        self.send(MidiMessage::ControlChange { channel, controller, value });
    }

    /// Get the port name
    fn port_name(&self) -> &str;

    /// Check if connected
    fn is_connected(&self) -> bool;
}

#[cfg(feature = "jack")]
pub use self::jack_output::JackMidiOutput;

#[cfg(feature = "jack")]
mod jack_output {
    use super::{MidiMessage, MidiOutput};
    use crate::config::MidiSettings;
    use crate::error::{Error, Result};
    use std::sync::mpsc::{channel, Receiver, Sender};

    /// JACK MIDI output
    pub struct JackMidiOutput {
        /// Sender for MIDI messages to the JACK process callback
        tx: Sender<MidiMessage>,
        port_name: String,
        /// Keep the client alive
        client: jack::AsyncClient<(), JackMidiHandler>,
    }

    impl JackMidiOutput {
        /// Register `client_name:port_name` and activate the client
        pub fn new(client_name: &str, port_name: &str) -> Result<Self> {
            let (client, _status) =
                jack::Client::new(client_name, jack::ClientOptions::NO_START_SERVER)?;
            let midi_out = client.register_port(port_name, jack::MidiOut::default())?;
            let (tx, rx) = channel();
            let active_client = client.activate_async((), JackMidiHandler { midi_out, rx })?;

            Ok(Self {
                tx,
                port_name: format!("{}:{}", client_name, port_name),
                client: active_client,
            })
        }

        /// Create from settings and connect the configured destinations
        pub fn from_settings(settings: &MidiSettings) -> Result<Self> {
            let output = Self::new(&settings.client_name, &settings.port_name)?;
            for dest in settings.auto_connect.iter().flatten() {
                if let Err(e) = output.connect_to(dest) {
                    log::warn!("Failed to auto-connect to {}: {}", dest, e);
                }
            }
            Ok(output)
        }

        /// Connect to a JACK MIDI input port
        pub fn connect_to(&self, destination: &str) -> Result<()> {
            self.client
                .as_client()
                .connect_ports_by_name(&self.port_name, destination)
                .map_err(|e| {
                    Error::Midi(format!("cannot connect {} -> {}: {}", self.port_name, destination, e))
                })?;
            log::info!("Connected {} -> {}", self.port_name, destination);
            Ok(())
        }
    }

    impl MidiOutput for JackMidiOutput {
        fn send(&self, message: MidiMessage) {
            let _ = self.tx.send(message);
        }

        fn port_name(&self) -> &str {
            &self.port_name
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    /// JACK process handler for MIDI output
    struct JackMidiHandler {
        midi_out: jack::Port<jack::MidiOut>,
        rx: Receiver<MidiMessage>,
    }

    impl jack::ProcessHandler for JackMidiHandler {
        fn process(&mut self, _client: &jack::Client, ps: &jack::ProcessScope) -> jack::Control {
            let mut writer = self.midi_out.writer(ps);
            while let Ok(msg) = self.rx.try_recv() {
                let bytes = msg.to_bytes();
                let raw = jack::RawMidi { time: 0, bytes: &bytes };
                let _ = writer.write(&raw);
            }
            jack::Control::Continue
        }
    }

    pub fn is_jack_running() -> bool {
        jack::Client::new("beatpad-probe", jack::ClientOptions::NO_START_SERVER).is_ok()
    }

    pub fn list_jack_midi_ports() -> Vec<String> {
        match jack::Client::new("beatpad-list", jack::ClientOptions::NO_START_SERVER) {
            Ok((client, _)) => client.ports(None, Some("midi"), jack::PortFlags::IS_INPUT),
            Err(_) => Vec::new(),
        }
    }
}

/// Dummy MIDI output (for testing or when no backend is available)
pub struct DummyMidiOutput;

impl MidiOutput for DummyMidiOutput {
    fn send(&self, message: MidiMessage) {
        log::debug!("MIDI {:?}", message);
    }

    fn port_name(&self) -> &str {
        "dummy"
    }

    fn is_connected(&self) -> bool {
        false
    }
}

/// Check if JACK is running
pub fn is_jack_running() -> bool {
    #[cfg(feature = "jack")]
    {
        jack_output::is_jack_running()
    }
    #[cfg(not(feature = "jack"))]
    {
        false
    }
}

/// List available JACK MIDI input ports
pub fn list_jack_midi_ports() -> Vec<String> {
    #[cfg(feature = "jack")]
    {
        jack_output::list_jack_midi_ports()
    }
    #[cfg(not(feature = "jack"))]
    {
        Vec::new()
    }
}

/// Open the best available output: JACK if it is compiled in and running,
/// the dummy output otherwise.
pub fn open_output(settings: &MidiSettings) -> Result<Box<dyn MidiOutput>> {
    #[cfg(feature = "jack")]
    if is_jack_running() {
        let output = JackMidiOutput::from_settings(settings)?;
        log::info!("JACK MIDI output created: {}", output.port_name());
        return Ok(Box::new(output));
    }

    log::warn!(
        "No MIDI backend available for '{}', notes are only logged",
        settings.client_name
    );
    Ok(Box::new(DummyMidiOutput))
}

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Convert a MIDI note number to a note name (48 = "C3")
pub fn note_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1;
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}

/// Parse a note name such as "C3", "F#4", "Bb2" or "C-1" into a MIDI note number
pub fn parse_note_name(name: &str) -> Option<u8> {
    let mut chars = name.trim().chars();
    let pitch: i16 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (accidental, octave) = if let Some(octave) = rest.strip_prefix('#') {
        (1, octave)
    } else if let Some(octave) = rest.strip_prefix('b') {
        (-1, octave)
    } else {
        (0, rest)
    };
    let octave: i16 = octave.parse().ok()?;
    let note = (octave + 1) * 12 + pitch + accidental;
    u8::try_from(note).ok().filter(|n| *n <= 127)
}

/// Length of a note value in milliseconds.
///
/// Accepts note values relative to a whole note ("1n", "2n", "4n", "8n",
/// "16n", dotted with a trailing "."), "<n>t" triplets, and absolute
/// "<n>ms" durations.
pub fn note_length_ms(length: &str, bpm: f64) -> Option<u64> {
    let length = length.trim();
    if let Some(ms) = length.strip_suffix("ms") {
        return ms.trim().parse().ok();
    }
    if bpm <= 0.0 {
        return None;
    }

    let (value, dotted) = match length.strip_suffix('.') {
        Some(value) => (value, true),
        None => (length, false),
    };
    let (division, triplet) = if let Some(d) = value.strip_suffix('n') {
        (d, false)
    } else if let Some(d) = value.strip_suffix('t') {
        (d, true)
    } else {
        return None;
    };
    let division: f64 = division.parse().ok().filter(|d: &f64| *d > 0.0)?;

    let whole_ms = 4.0 * 60_000.0 / bpm;
    let mut ms = whole_ms / division;
    if triplet {
        ms *= 2.0 / 3.0;
    }
    if dotted {
        ms *= 1.5;
    }
    Some(ms.round() as u64)
}
