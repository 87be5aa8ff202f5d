//! One-octave piano
//!
//! Thirteen chromatic keys from C4 to C5 on the home row (white keys) and
//! the row above it (black keys). The piano is monophonic: pressing a key
//! stops whatever note was sounding.

use crate::bindings::KeyBindings;
use crate::config::MidiSettings;
use crate::midi::MidiOutput;
use std::rc::Rc;
use std::time::Duration;

/// Keyboard layout, lowest note first
pub const PIANO_KEYS: [(char, u8); 13] = [
    ('a', 60),
    ('w', 61),
    ('s', 62),
    ('e', 63),
    ('d', 64),
    ('f', 65),
    ('t', 66),
    ('g', 67),
    ('y', 68),
    ('h', 69),
    ('u', 70),
    ('j', 71),
    ('k', 72),
];

/// Whether `note` is a black key
pub fn is_black(note: u8) -> bool {
    matches!(note % 12, 1 | 3 | 6 | 8 | 10)
}

/// Key bindings for [`PIANO_KEYS`]
pub fn piano_bindings(release_after: Duration) -> KeyBindings<u8> {
    KeyBindings::from_pairs(PIANO_KEYS, release_after)
}

/// Monophonic note player on a shared MIDI output
pub struct Piano {
    output: Rc<dyn MidiOutput>,
    channel: u8,
    velocity: u8,
    active: Option<u8>,
}

impl Piano {
    pub fn new(output: Rc<dyn MidiOutput>, settings: &MidiSettings) -> Self {
        Self {
            output,
            channel: settings.channel.min(15),
            velocity: settings.velocity.clamp(1, 127),
            active: None,
        }
    }

    /// Start `note`, stopping the previous note first
    pub fn note_on(&mut self, note: u8) {
        if let Some(previous) = self.active.take() {
            self.output.note_off(self.channel, previous);
        }
        log::debug!("Piano note on {}", note);
        self.output.note_on(self.channel, note.min(127), self.velocity);
        self.active = Some(note.min(127));
    }

    /// Stop `note` if it is the one sounding
    /// Returns false when another note (or none) is active
    pub fn note_off(&mut self, note: u8) -> bool {
        if self.active != Some(note) {
            return false;
        }
        self.release().is_some()
    }

    /// Stop the sounding note, if any
    pub fn release(&mut self) -> Option<u8> {
        let note = self.active.take()?;
        self.output.note_off(self.channel, note);
        Some(note)
    }

    /// The note currently sounding
    pub fn active(&self) -> Option<u8> {
        self.active
    }
}

impl Drop for Piano {
    fn drop(&mut self) {
        self.release();
    }
}
