//! Pad identities and the pad table.
//!
//! A pad is a logical trigger source (a drum voice, a chord stab) that is
//! independent of how its sound is produced. The pad table binds each
//! [`PadId`] to a sound id, an [`Articulation`] for the sound engine, a
//! repeat rate, and optional presentation hints (bound key, color).

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Repeat interval used for pads without an explicit `repeat_ms`.
pub const DEFAULT_REPEAT_MS: u64 = 200;

/// Opaque identifier of a logical pad.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PadId(String);

impl PadId {
    /// Create a pad id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PadId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PadId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for PadId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// How a sound should be played, passed through to the sound engine untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Articulation {
    /// Note names (e.g. "C1", "F#4"). Several notes form a chord or, with
    /// `stagger_ms`, an arpeggio. Empty for unpitched sounds.
    pub notes: Vec<String>,
    /// Note length, either a note value ("8n", "4n", "16n") or "<n>ms".
    pub length: Option<String>,
    /// Delay between consecutive notes.
    pub stagger_ms: Option<u64>,
}

impl Articulation {
    /// Articulation with a single note.
    pub fn note(note: &str, length: &str) -> Self {
        Self {
            notes: vec![note.to_string()],
            length: Some(length.to_string()),
            stagger_ms: None,
        }
    }

    /// Unpitched articulation.
    pub fn hit(length: &str) -> Self {
        Self {
            notes: Vec::new(),
            length: Some(length.to_string()),
            stagger_ms: None,
        }
    }

    /// Articulation with several simultaneous notes.
    pub fn chord(notes: &[&str], length: &str) -> Self {
        Self {
            notes: notes.iter().map(|n| n.to_string()).collect(),
            length: Some(length.to_string()),
            stagger_ms: None,
        }
    }

    /// Spread the notes `stagger_ms` apart.
    pub fn staggered(mut self, stagger_ms: u64) -> Self {
        self.stagger_ms = Some(stagger_ms);
        self
    }
}

/// One row of the pad table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PadConfig {
    /// Pad identity.
    pub id: PadId,
    /// Keyboard character bound to this pad.
    #[serde(default)]
    pub key: Option<char>,
    /// Sound id for the engine; defaults to the pad id.
    #[serde(default)]
    pub sound: Option<String>,
    /// Repeat interval while held.
    #[serde(default)]
    pub repeat_ms: Option<u64>,
    /// Display color ("#rrggbb" or a color name).
    #[serde(default)]
    pub color: Option<String>,
    /// Articulation handed to the engine on every trigger.
    #[serde(default)]
    pub articulation: Articulation,
}

impl PadConfig {
    /// Create a pad with no key, color, or explicit repeat rate.
    pub fn new(id: impl Into<PadId>) -> Self {
        Self {
            id: id.into(),
            key: None,
            sound: None,
            repeat_ms: None,
            color: None,
            articulation: Articulation::default(),
        }
    }

    /// Bind a keyboard character.
    pub fn with_key(mut self, key: char) -> Self {
        self.key = Some(key.to_ascii_lowercase());
        self
    }

    /// Set the sound id.
    pub fn with_sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }

    /// Set the repeat interval.
    pub fn with_repeat_ms(mut self, repeat_ms: u64) -> Self {
        self.repeat_ms = Some(repeat_ms);
        self
    }

    /// Set the display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set the articulation.
    pub fn with_articulation(mut self, articulation: Articulation) -> Self {
        self.articulation = articulation;
        self
    }

    /// Sound id the engine is asked to play.
    pub fn sound_id(&self) -> &str {
        self.sound.as_deref().unwrap_or(self.id.as_str())
    }
}

/// The built-in twelve-pad electronic kit.
///
/// Top row `1`-`4` and `q`-`r`, bottom row `a`-`f`.
pub fn default_pads() -> Vec<PadConfig> {
    vec![
        PadConfig::new("Kick").with_key('1').with_repeat_ms(200).with_color("#FF5252")
            .with_articulation(Articulation::note("C1", "8n")),
        PadConfig::new("Snare").with_key('2').with_repeat_ms(150).with_color("#FF9800")
            .with_articulation(Articulation::hit("8n")),
        PadConfig::new("Clap").with_key('3').with_repeat_ms(180).with_color("#FFEB3B")
            .with_articulation(Articulation::hit("8n")),
        PadConfig::new("HiHat").with_key('4').with_repeat_ms(100).with_color("#8BC34A")
            .with_articulation(Articulation::hit("8n")),
        PadConfig::new("Vocal").with_key('q').with_repeat_ms(250).with_color("#E91E63")
            .with_articulation(Articulation::note("C3", "8n")),
        PadConfig::new("Pluck").with_key('w').with_repeat_ms(150).with_color("#3F51B5")
            .with_articulation(Articulation::note("C4", "8n")),
        PadConfig::new("Wobble").with_key('e').with_repeat_ms(300).with_color("#9C27B0")
            .with_articulation(Articulation::note("G1", "4n")),
        PadConfig::new("Glitch").with_key('r').with_repeat_ms(120).with_color("#F44336")
            .with_articulation(Articulation::note("C3", "16n")),
        PadConfig::new("Chord").with_key('a').with_repeat_ms(350).with_color("#4CAF50")
            .with_articulation(Articulation::chord(&["C3", "E3", "G3", "B3"], "4n")),
        PadConfig::new("Arp").with_key('s').with_repeat_ms(200).with_color("#03A9F4")
            .with_articulation(Articulation::chord(&["C4", "E4", "G4", "B4"], "16n").staggered(100)),
        PadConfig::new("Pad").with_key('d').with_repeat_ms(500).with_color("#795548")
            .with_articulation(Articulation::note("C3", "2n")),
        PadConfig::new("Vox").with_key('f').with_repeat_ms(250).with_color("#607D8B")
            .with_articulation(Articulation::note("A3", "8n")),
    ]
}
