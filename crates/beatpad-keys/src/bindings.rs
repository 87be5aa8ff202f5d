//! Keyboard bindings for pads and piano keys
//!
//! Maps computer keys to pads (or notes) and tracks which keys are held. Terminals
//! report auto-repeat as a stream of presses and often never report the
//! release, so a held key is released once it has gone `release_after`
//! without being touched.

use beatpad_core::{PadConfig, PadId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default auto-release timeout in milliseconds
/// Must be longer than the OS key repeat delay (typically 300-500ms)
pub const DEFAULT_RELEASE_AFTER_MS: u64 = 400;

/// Key bindings plus the set of currently held keys.
///
/// `T` is what a key plays: a [`PadId`] for the pad grid, a MIDI note for
/// the piano.
#[derive(Debug, Clone)]
pub struct KeyBindings<T = PadId> {
    keys: HashMap<char, T>,
    /// Held key -> last time it was touched
    held: HashMap<char, Instant>,
    release_after: Duration,
}

impl KeyBindings<PadId> {
    /// Bind every pad that has a key
    pub fn from_pads(pads: &[PadConfig], release_after: Duration) -> Self {
        Self::from_pairs(
            pads.iter().filter_map(|pad| Some((pad.key?, pad.id.clone()))),
            release_after,
        )
    }

    /// Pad bound to `c`
    pub fn pad_for(&self, c: char) -> Option<&PadId> {
        self.binding(c)
    }

    /// Key bound to `pad`
    pub fn key_for(&self, pad: &PadId) -> Option<char> {
        self.keys.iter().find(|(_, p)| *p == pad).map(|(c, _)| *c)
    }
}

impl<T: Clone> KeyBindings<T> {
    /// Bind each `(key, target)` pair. Keys are case-insensitive.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (char, T)>, release_after: Duration) -> Self {
        Self {
            keys: pairs
                .into_iter()
                .map(|(c, target)| (c.to_ascii_lowercase(), target))
                .collect(),
            held: HashMap::new(),
            release_after,
        }
    }

    /// Target bound to `c`
    pub fn binding(&self, c: char) -> Option<&T> {
        self.keys.get(&c.to_ascii_lowercase())
    }

    /// Handle a key press
    /// Returns the target to start, or None for unbound keys and for
    /// repeats of a key that is already held
    pub fn key_down(&mut self, c: char, now: Instant) -> Option<T> {
        let c = c.to_ascii_lowercase();
        let target = self.keys.get(&c)?;
        if self.held.insert(c, now).is_some() {
            // Key repeat - the hold is extended, not restarted
            return None;
        }
        Some(target.clone())
    }

    /// Extend a held key (call on key repeat events)
    pub fn touch(&mut self, c: char, now: Instant) {
        if let Some(last) = self.held.get_mut(&c.to_ascii_lowercase()) {
            *last = now;
        }
    }

    /// Handle a key release
    /// Returns the target to stop
    pub fn key_up(&mut self, c: char) -> Option<T> {
        let c = c.to_ascii_lowercase();
        self.held.remove(&c)?;
        self.keys.get(&c).cloned()
    }

    /// Release keys that have not been touched for `release_after`
    pub fn expired(&mut self, now: Instant) -> Vec<T> {
        let release_after = self.release_after;
        let expired: Vec<char> = self
            .held
            .iter()
            .filter(|(_, &last)| now.saturating_duration_since(last) > release_after)
            .map(|(&c, _)| c)
            .collect();

        expired
            .into_iter()
            .filter_map(|c| {
                self.held.remove(&c);
                self.keys.get(&c).cloned()
            })
            .collect()
    }

    /// Release every held key
    pub fn release_all(&mut self) -> Vec<T> {
        let keys = &self.keys;
        self.held
            .drain()
            .filter_map(|(c, _)| keys.get(&c).cloned())
            .collect()
    }

    /// Whether `c` is currently held
    pub fn is_held(&self, c: char) -> bool {
        self.held.contains_key(&c.to_ascii_lowercase())
    }

    /// Number of held keys
    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatpad_core::default_pads;

    fn bindings() -> KeyBindings {
        KeyBindings::from_pads(
            &default_pads(),
            Duration::from_millis(DEFAULT_RELEASE_AFTER_MS),
        )
    }

    #[test]
    fn test_default_bindings() {
        let bindings = bindings();
        assert_eq!(bindings.pad_for('1'), Some(&PadId::from("Kick")));
        assert_eq!(bindings.pad_for('4'), Some(&PadId::from("HiHat")));
        assert_eq!(bindings.pad_for('Q'), Some(&PadId::from("Vocal")));
        assert_eq!(bindings.pad_for('f'), Some(&PadId::from("Vox")));
        assert_eq!(bindings.pad_for('z'), None);
        assert_eq!(bindings.key_for(&PadId::from("Arp")), Some('s'));
    }

    #[test]
    fn test_key_down_up() {
        let mut bindings = bindings();
        let t0 = Instant::now();

        assert_eq!(bindings.key_down('1', t0), Some(PadId::from("Kick")));
        assert!(bindings.is_held('1'));

        // Pressing again should not restart the hold
        assert_eq!(bindings.key_down('1', t0 + Duration::from_millis(30)), None);

        assert_eq!(bindings.key_up('1'), Some(PadId::from("Kick")));
        assert!(!bindings.is_held('1'));
        assert_eq!(bindings.key_up('1'), None);
    }

    #[test]
    fn test_unbound_key_is_ignored() {
        let mut bindings = bindings();
        assert_eq!(bindings.key_down('x', Instant::now()), None);
        assert_eq!(bindings.held_count(), 0);
        assert_eq!(bindings.key_up('x'), None);
    }

    #[test]
    fn test_auto_release() {
        let mut bindings = bindings();
        let t0 = Instant::now();
        bindings.key_down('2', t0);
        bindings.key_down('3', t0);

        // Repeats keep '3' alive
        bindings.touch('3', t0 + Duration::from_millis(300));
        bindings.key_down('3', t0 + Duration::from_millis(350));

        assert!(bindings.expired(t0 + Duration::from_millis(400)).is_empty());
        assert_eq!(
            bindings.expired(t0 + Duration::from_millis(401)),
            vec![PadId::from("Snare")]
        );
        assert!(bindings.is_held('3'));
        assert_eq!(
            bindings.expired(t0 + Duration::from_millis(800)),
            vec![PadId::from("Clap")]
        );
        assert_eq!(bindings.held_count(), 0);
    }

    #[test]
    fn test_release_all() {
        let mut bindings = bindings();
        let now = Instant::now();
        bindings.key_down('q', now);
        bindings.key_down('w', now);
        let mut released = bindings.release_all();
        released.sort();
        assert_eq!(released, vec![PadId::from("Pluck"), PadId::from("Vocal")]);
        assert_eq!(bindings.held_count(), 0);
    }

    #[test]
    fn test_note_bindings() {
        let mut notes = KeyBindings::from_pairs(
            [('a', 60u8), ('W', 61)],
            Duration::from_millis(DEFAULT_RELEASE_AFTER_MS),
        );
        let t0 = Instant::now();
        assert_eq!(notes.binding('w'), Some(&61));
        assert_eq!(notes.key_down('A', t0), Some(60));
        assert_eq!(notes.key_down('a', t0), None);
        assert_eq!(notes.expired(t0 + Duration::from_millis(401)), vec![60]);
        assert_eq!(notes.key_up('a'), None);
    }
}
