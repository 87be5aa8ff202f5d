//! beatpad-keys - Terminal drum pad for beatpad
//!
//! Play the pads of a [`beatpad_core::PadSurface`] from your computer
//! keyboard or mouse. Features include:
//!
//! - Four-column pad grid in the terminal with a demo progress gauge
//! - One-octave piano (C4 to C5) on the same MIDI output, toggled with Tab
//! - Repeat-on-hold with per-pad rates and auto-release for terminals
//!   without key-up events
//! - MIDI output through JACK (feature `jack`)
//! - OS-level key detection for reliable key release handling (feature `os-keyboard`)
//! - Configurable via TOML file
//!
//! # Usage as a Library
//!
//! ```no_run
//! use beatpad_keys::{open_output, App, Config, MidiOutput, MidiSoundEngine, Piano};
//! use std::rc::Rc;
//!
//! let config = Config::load_or_default();
//! let output: Rc<dyn MidiOutput> = Rc::from(open_output(&config.midi).unwrap());
//! let engine = MidiSoundEngine::new(Rc::clone(&output), &config.midi);
//! let piano = Piano::new(output, &config.midi);
//! let mut app = App::new(&config, Box::new(engine), piano).unwrap();
//!
//! app.tick(std::time::Instant::now());
//! println!("{}% of the demo played", app.surface().current_progress());
//! ```

pub mod app;
pub mod bindings;
pub mod config;
pub mod engine;
pub mod error;
pub mod midi;
pub mod os_keyboard;
pub mod piano;
pub mod ui;

// Re-export main types
pub use app::{App, Mode};
pub use bindings::{KeyBindings, DEFAULT_RELEASE_AFTER_MS};
pub use config::{Config, InputSettings, MidiSettings, Theme};
pub use engine::{MidiSoundEngine, MAX_STAGGER_MS};
pub use error::{Error, Result};
pub use midi::{note_length_ms, note_name, open_output, parse_note_name, MidiMessage, MidiOutput};
pub use os_keyboard::{is_available as os_keyboard_available, OsKeyEvent, OsKeyboardListener};
pub use piano::{Piano, PIANO_KEYS};
pub use ui::{pad_at, pad_cells, piano_cells, piano_key_at, render, screen_layout, ScreenLayout, View};
