//! Configuration file support for beatpad
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/beatpad/config.toml`
//! - macOS: `~/Library/Application Support/beatpad/config.toml`
//! - Windows: `%APPDATA%\beatpad\config.toml`

use crate::bindings::DEFAULT_RELEASE_AFTER_MS;
use crate::engine::MAX_STAGGER_MS;
use crate::error::{Error, Result};
use beatpad_core::SurfaceConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default velocity for pad triggers
pub const DEFAULT_VELOCITY: u8 = 100;

/// Default tempo used to turn note values ("8n") into milliseconds
pub const DEFAULT_BPM: f64 = 120.0;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input handling
    pub input: InputSettings,
    /// MIDI configuration
    pub midi: MidiSettings,
    /// UI/Theme configuration
    pub theme: Theme,
    /// Pad table and timing
    pub surface: SurfaceConfig,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load and validate a configuration file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        match Self::config_path() {
            Ok(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                log::warn!("Ignoring config file {:?}: {}", path, e);
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    /// Save configuration to the default config file location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "beatpad") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::default().write_commented(&path)?;
        Ok(path)
    }

    /// Write this configuration to `path` below an explanatory header
    pub fn write_commented(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let header = r##"# beatpad configuration file
#
# [input]
# release_after_ms: held pads are released after this long without a key
#   event when the terminal cannot report key releases (keep it above the
#   OS key repeat delay, typically 300-500ms)
# os_keyboard: use OS-level key events when built with `os-keyboard`
#
# [midi]
# channel (0-15), velocity (1-127), bpm for note values such as "8n"
# drum_notes: MIDI note for sounds without pitched notes
# auto_connect = ["a2j:Hydrogen"] connects the JACK port on startup
#
# [surface]
# repeat and pulse timings in milliseconds, followed by the pad table.
# Each pad has an id, a key, a repeat_ms, a color ("#rrggbb" or a name)
# and an articulation with notes ("C3", "F#4"), a length ("8n", "4n",
# "250ms") and an optional stagger_ms for arpeggios.

"##;
        let body = toml::to_string_pretty(self)?;
        fs::write(path, format!("{}{}", header, body))?;
        Ok(())
    }

    /// Check ranges and the pad table
    pub fn validate(&self) -> Result<()> {
        self.surface.validate()?;
        if self.midi.channel > 15 {
            return Err(Error::Config(format!(
                "MIDI channel {} out of range (0-15)",
                self.midi.channel
            )));
        }
        if !(1..=127).contains(&self.midi.velocity) {
            return Err(Error::Config(format!(
                "velocity {} out of range (1-127)",
                self.midi.velocity
            )));
        }
        if self.midi.bpm.is_nan() || self.midi.bpm <= 0.0 {
            return Err(Error::Config("bpm must be positive".to_string()));
        }
        if let Some((sound, note)) = self.midi.drum_notes.iter().find(|(_, note)| **note > 127) {
            return Err(Error::Config(format!(
                "drum note {} for '{}' out of range (0-127)",
                note, sound
            )));
        }
        if let Some(pad) = self
            .surface
            .pads
            .iter()
            .find(|pad| pad.articulation.stagger_ms.unwrap_or(0) > MAX_STAGGER_MS)
        {
            return Err(Error::Config(format!(
                "stagger_ms for pad '{}' exceeds {}ms",
                pad.id, MAX_STAGGER_MS
            )));
        }
        Ok(())
    }
}

/// Input settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Auto-release timeout in milliseconds
    pub release_after_ms: u64,
    /// Prefer OS-level keyboard events when available
    pub os_keyboard: bool,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            release_after_ms: DEFAULT_RELEASE_AFTER_MS,
            os_keyboard: true,
        }
    }
}

/// MIDI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiSettings {
    /// JACK client name
    pub client_name: String,
    /// MIDI output port name
    pub port_name: String,
    /// Auto-connect to these JACK MIDI inputs
    pub auto_connect: Option<Vec<String>>,
    /// MIDI channel (0-15)
    pub channel: u8,
    /// Velocity (1-127)
    pub velocity: u8,
    /// Tempo for note value lengths
    pub bpm: f64,
    /// Note number for sounds whose articulation has no notes
    pub drum_notes: BTreeMap<String, u8>,
}

impl Default for MidiSettings {
    fn default() -> Self {
        // General MIDI percussion numbers
        let drum_notes = [("Kick", 36), ("Snare", 38), ("Clap", 39), ("HiHat", 42)]
            .into_iter()
            .map(|(sound, note)| (sound.to_string(), note))
            .collect();

        Self {
            client_name: "beatpad".to_string(),
            port_name: "midi_out".to_string(),
            auto_connect: None,
            channel: 0,
            velocity: DEFAULT_VELOCITY,
            bpm: DEFAULT_BPM,
            drum_notes,
        }
    }
}

/// Theme/UI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    /// Border color
    pub border_color: String,
    /// Color of pads without their own color
    pub pad_color: String,
    /// Label color on a lit pad
    pub active_text_color: String,
    /// Progress gauge color
    pub progress_color: String,
    /// Color of the sounding piano key
    pub piano_active_color: String,
    /// Show help text
    pub show_help: bool,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            border_color: "cyan".to_string(),
            pad_color: "gray".to_string(),
            active_text_color: "black".to_string(),
            progress_color: "magenta".to_string(),
            piano_active_color: "yellow".to_string(),
            show_help: true,
        }
    }
}

impl Theme {
    /// Parse a color string to ratatui Color
    pub fn parse_color(s: &str) -> ratatui::style::Color {
        use ratatui::style::Color;
        match s.to_lowercase().as_str() {
            "black" => Color::Black,
            "red" => Color::Red,
            "green" => Color::Green,
            "yellow" => Color::Yellow,
            "blue" => Color::Blue,
            "magenta" => Color::Magenta,
            "cyan" => Color::Cyan,
            "gray" | "grey" => Color::Gray,
            "dark_gray" | "dark_grey" | "darkgray" | "darkgrey" => Color::DarkGray,
            "light_red" | "lightred" => Color::LightRed,
            "light_green" | "lightgreen" => Color::LightGreen,
            "light_yellow" | "lightyellow" => Color::LightYellow,
            "light_blue" | "lightblue" => Color::LightBlue,
            "light_magenta" | "lightmagenta" => Color::LightMagenta,
            "light_cyan" | "lightcyan" => Color::LightCyan,
            "white" => Color::White,
            s if s.starts_with('#') && s.len() == 7 => {
                match (
                    u8::from_str_radix(&s[1..3], 16),
                    u8::from_str_radix(&s[3..5], 16),
                    u8::from_str_radix(&s[5..7], 16),
                ) {
                    (Ok(r), Ok(g), Ok(b)) => Color::Rgb(r, g, b),
                    _ => Color::White,
                }
            }
            _ => Color::White,
        }
    }

    /// Get border color
    pub fn border(&self) -> ratatui::style::Color {
        Self::parse_color(&self.border_color)
    }

    /// Fill color for a pad, falling back to `pad_color`
    pub fn pad(&self, color: Option<&str>) -> ratatui::style::Color {
        Self::parse_color(color.unwrap_or(&self.pad_color))
    }

    /// Get active label color
    pub fn active_text(&self) -> ratatui::style::Color {
        Self::parse_color(&self.active_text_color)
    }

    /// Get the sounding piano key color
    pub fn piano_active(&self) -> ratatui::style::Color {
        Self::parse_color(&self.piano_active_color)
    }

    /// Get progress gauge color
    pub fn progress(&self) -> ratatui::style::Color {
        Self::parse_color(&self.progress_color)
    }
}
