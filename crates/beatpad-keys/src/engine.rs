//! MIDI sound engine
//!
//! Turns pad triggers into note on/off pairs. Note offs (and the later
//! notes of a staggered articulation) are queued with a wall-clock due time
//! and flushed by [`SoundEngine::service`], which the pad surface calls on
//! every advance.

use crate::config::MidiSettings;
use crate::midi::{note_length_ms, parse_note_name, MidiOutput};
use beatpad_core::{Articulation, Error, Result, SoundEngine};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Length used when an articulation has none or it cannot be parsed
const FALLBACK_LENGTH: &str = "8n";

/// Longest gap allowed between the notes of a staggered articulation
pub const MAX_STAGGER_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    /// A staggered note that has not started yet
    Start { note: u8, length: Duration },
    /// Release of a sounding note
    Stop { note: u8 },
}

#[derive(Debug, Clone, Copy)]
struct Queued {
    at: Instant,
    pending: Pending,
}

/// [`SoundEngine`] that plays through a [`MidiOutput`]
pub struct MidiSoundEngine {
    output: Rc<dyn MidiOutput>,
    channel: u8,
    velocity: u8,
    bpm: f64,
    drum_notes: HashMap<String, u8>,
    queue: Vec<Queued>,
    warm: bool,
    disposed: bool,
}

impl MidiSoundEngine {
    /// Create an engine on `output` using the channel, velocity, tempo and
    /// drum map from `settings`. The output may be shared with a
    /// [`crate::piano::Piano`].
    pub fn new(output: Rc<dyn MidiOutput>, settings: &MidiSettings) -> Self {
        Self {
            output,
            channel: settings.channel.min(15),
            velocity: settings.velocity.clamp(1, 127),
            bpm: settings.bpm,
            drum_notes: settings
                .drum_notes
                .iter()
                .map(|(sound, note)| (sound.clone(), (*note).min(127)))
                .collect(),
            queue: Vec::new(),
            warm: false,
            disposed: false,
        }
    }

    /// Resolve the MIDI notes for a trigger
    fn notes_for(&self, sound: &str, articulation: &Articulation) -> Result<Vec<u8>> {
        if articulation.notes.is_empty() {
            return self
                .drum_notes
                .get(sound)
                .map(|note| vec![*note])
                .ok_or_else(|| Error::UnknownSound(sound.to_string()));
        }
        articulation
            .notes
            .iter()
            .map(|name| {
                parse_note_name(name)
                    .ok_or_else(|| Error::Sound(format!("invalid note '{}' for '{}'", name, sound)))
            })
            .collect()
    }

    fn length_for(&self, articulation: &Articulation) -> Duration {
        let length = articulation.length.as_deref().unwrap_or(FALLBACK_LENGTH);
        let ms = note_length_ms(length, self.bpm)
            .or_else(|| {
                log::warn!("Unknown note length '{}', using {}", length, FALLBACK_LENGTH);
                note_length_ms(FALLBACK_LENGTH, self.bpm)
            })
            .unwrap_or(250);
        Duration::from_millis(ms)
    }

    /// Send a note on, cutting off a still-sounding copy of the same note,
    /// and queue its release
    fn start_note(&mut self, note: u8, at: Instant, length: Duration) {
        let before = self.queue.len();
        self.queue.retain(|q| q.pending != Pending::Stop { note });
        if self.queue.len() != before {
            self.output.note_off(self.channel, note);
        }
        self.output.note_on(self.channel, note, self.velocity);
        self.queue.push(Queued {
            at: at + length,
            pending: Pending::Stop { note },
        });
    }

    /// Trigger at an explicit instant
    pub fn trigger_at(&mut self, sound: &str, articulation: &Articulation, now: Instant) -> Result<()> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        if !self.warm {
            return Err(Error::NotReady(sound.to_string()));
        }

        let notes = self.notes_for(sound, articulation)?;
        let length = self.length_for(articulation);
        let stagger_ms = articulation.stagger_ms.unwrap_or(0);
        if stagger_ms > MAX_STAGGER_MS {
            return Err(Error::Sound(format!(
                "stagger {}ms for '{}' exceeds {}ms",
                stagger_ms, sound, MAX_STAGGER_MS
            )));
        }
        log::trace!("MIDI trigger {} notes={:?} length={:?}", sound, notes, length);

        for (i, note) in notes.into_iter().enumerate() {
            let start = stagger_ms
                .checked_mul(i as u64)
                .and_then(|offset| now.checked_add(Duration::from_millis(offset)))
                .ok_or_else(|| Error::Sound(format!("stagger for '{}' overflows", sound)))?;
            if start <= now {
                self.start_note(note, now, length);
            } else {
                self.queue.push(Queued {
                    at: start,
                    pending: Pending::Start { note, length },
                });
            }
        }
        Ok(())
    }

    /// Flush every queued message due at or before `now`
    pub fn service_at(&mut self, now: Instant) {
        // Starting a late note can queue a release that is already due.
        loop {
            let mut due: Vec<Queued> = Vec::new();
            self.queue.retain(|q| {
                if q.at <= now {
                    due.push(*q);
                    false
                } else {
                    true
                }
            });
            if due.is_empty() {
                return;
            }
            due.sort_by_key(|q| q.at);
            for queued in due {
                match queued.pending {
                    Pending::Start { note, length } => self.start_note(note, queued.at, length),
                    Pending::Stop { note } => self.output.note_off(self.channel, note),
                }
            }
        }
    }

    /// Number of messages waiting to be sent
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl SoundEngine for MidiSoundEngine {
    fn name(&self) -> &str {
        self.output.port_name()
    }

    fn warm_up(&mut self) -> Result<()> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        if !self.output.is_connected() {
            log::warn!("MIDI output '{}' is not connected", self.output.port_name());
        }
        self.warm = true;
        log::info!("MIDI sound engine ready on '{}'", self.output.port_name());
        Ok(())
    }

    fn is_ready(&self, _sound: &str) -> bool {
        self.warm && !self.disposed
    }

    fn trigger(&mut self, sound: &str, articulation: &Articulation) -> Result<()> {
        self.trigger_at(sound, articulation, Instant::now())
    }

    fn service(&mut self) {
        self.service_at(Instant::now());
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        // Pending note ons are dropped, every started note is released.
        for queued in std::mem::take(&mut self.queue) {
            if let Pending::Stop { note } = queued.pending {
                self.output.note_off(self.channel, note);
            }
        }
        // All notes off
        self.output.control_change(self.channel, 123, 0);
        self.disposed = true;
        self.warm = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::testing::{off, on, Capture};
    use crate::midi::MidiMessage;

    fn engine() -> (MidiSoundEngine, Capture) {
        let capture = Capture::default();
        let mut engine = MidiSoundEngine::new(Rc::new(capture.clone()), &MidiSettings::default());
        engine.warm_up().unwrap();
        (engine, capture)
    }

    #[test]
    fn test_requires_warm_up() {
        let capture = Capture::default();
        let mut engine = MidiSoundEngine::new(Rc::new(capture.clone()), &MidiSettings::default());
        assert!(!engine.is_ready("Kick"));
        assert!(matches!(
            engine.trigger("Kick", &Articulation::note("C1", "8n")),
            Err(Error::NotReady(_))
        ));
        assert!(capture.take().is_empty());
    }

    #[test]
    fn test_note_on_then_off_after_length() {
        let (mut engine, capture) = engine();
        let t0 = Instant::now();
        engine.trigger_at("Kick", &Articulation::note("C1", "8n"), t0).unwrap();
        assert_eq!(capture.take(), vec![on(24)]);

        engine.service_at(t0 + Duration::from_millis(249));
        assert!(capture.take().is_empty());
        engine.service_at(t0 + Duration::from_millis(250));
        assert_eq!(capture.take(), vec![off(24)]);
        assert_eq!(engine.queued(), 0);
    }

    #[test]
    fn test_unpitched_sound_uses_drum_map() {
        let (mut engine, capture) = engine();
        engine.trigger("HiHat", &Articulation::hit("8n")).unwrap();
        assert_eq!(capture.take(), vec![on(42)]);

        assert!(matches!(
            engine.trigger("Cowbell", &Articulation::hit("8n")),
            Err(Error::UnknownSound(_))
        ));
        assert!(matches!(
            engine.trigger("Vocal", &Articulation::note("X9", "8n")),
            Err(Error::Sound(_))
        ));
    }

    #[test]
    fn test_staggered_chord() {
        let (mut engine, capture) = engine();
        let t0 = Instant::now();
        let arp = Articulation::chord(&["C4", "E4", "G4"], "16n").staggered(100);
        engine.trigger_at("Arp", &arp, t0).unwrap();
        assert_eq!(capture.take(), vec![on(60)]);

        engine.service_at(t0 + Duration::from_millis(100));
        assert_eq!(capture.take(), vec![on(64)]);
        engine.service_at(t0 + Duration::from_millis(125));
        assert_eq!(capture.take(), vec![off(60)]);
        engine.service_at(t0 + Duration::from_millis(1000));
        assert_eq!(capture.take(), vec![on(67), off(64), off(67)]);
    }

    #[test]
    fn test_retrigger_cuts_previous_note() {
        let (mut engine, capture) = engine();
        let t0 = Instant::now();
        engine.trigger_at("HiHat", &Articulation::hit("8n"), t0).unwrap();
        engine
            .trigger_at("HiHat", &Articulation::hit("8n"), t0 + Duration::from_millis(100))
            .unwrap();
        assert_eq!(capture.take(), vec![on(42), off(42), on(42)]);

        // Only the second note off is still queued.
        assert_eq!(engine.queued(), 1);
        engine.service_at(t0 + Duration::from_millis(350));
        assert_eq!(capture.take(), vec![off(42)]);
    }

    #[test]
    fn test_dispose_releases_sounding_notes() {
        let (mut engine, capture) = engine();
        let arp = Articulation::chord(&["C4", "E4"], "4n").staggered(100);
        engine.trigger("Arp", &arp).unwrap();
        capture.take();

        engine.dispose();
        // E4 had not started yet, so only C4 needs a note off.
        assert_eq!(
            capture.take(),
            vec![
                off(60),
                MidiMessage::ControlChange { channel: 0, controller: 123, value: 0 }
            ]
        );
        assert!(matches!(
            engine.trigger("Arp", &arp),
            Err(Error::Disposed)
        ));
    }

    #[test]
    fn test_oversized_stagger_is_rejected() {
        let (mut engine, capture) = engine();
        let t0 = Instant::now();
        let arp = Articulation::chord(&["C4", "E4"], "16n").staggered(u64::MAX);
        assert!(matches!(engine.trigger_at("Arp", &arp, t0), Err(Error::Sound(_))));

        let arp = Articulation::chord(&["C4", "E4"], "16n").staggered(MAX_STAGGER_MS + 1);
        assert!(matches!(engine.trigger_at("Arp", &arp, t0), Err(Error::Sound(_))));
        assert!(capture.take().is_empty());
        assert_eq!(engine.queued(), 0);

        let arp = Articulation::chord(&["C4", "E4"], "16n").staggered(MAX_STAGGER_MS);
        engine.trigger_at("Arp", &arp, t0).unwrap();
        assert_eq!(capture.take(), vec![on(60)]);
    }
}
