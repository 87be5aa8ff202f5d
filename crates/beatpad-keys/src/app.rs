//! Host application state
//!
//! [`App`] glues terminal (or OS-level) input to a [`PadSurface`] and a
//! [`Piano`]. Tab switches between the two. Every entry point first
//! advances the surface to the current wall-clock time, so timers that
//! came due while waiting for input fire before the input is applied.

use crate::bindings::KeyBindings;
use crate::config::{Config, Theme};
use crate::error::Result;
use crate::os_keyboard::{OsKeyEvent, ESCAPE};
use crate::piano::{piano_bindings, Piano, PIANO_KEYS};
use crate::ui::{self, View};
use beatpad_core::{PadId, PadSurface, Sequence, SoundEngine, SystemClock};
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::layout::Rect;
use std::time::{Duration, Instant};

/// Upper bound on the event poll timeout (one frame at ~60 fps)
pub const FRAME: Duration = Duration::from_millis(16);

/// Instrument the keys and mouse play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Pads,
    Piano,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Pads => "Pads",
            Mode::Piano => "Piano",
        }
    }

    fn other(self) -> Self {
        match self {
            Mode::Pads => Mode::Piano,
            Mode::Piano => Mode::Pads,
        }
    }
}

/// What the mouse button is holding down
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pointer {
    Pad(PadId),
    Note(u8),
}

pub struct App {
    surface: PadSurface,
    bindings: KeyBindings,
    piano: Piano,
    piano_keys: KeyBindings<u8>,
    mode: Mode,
    demo: Sequence,
    clock: SystemClock,
    theme: Theme,
    /// Pad keys come from the OS listener instead of the terminal
    os_keyboard: bool,
    has_focus: bool,
    pointer: Option<Pointer>,
    /// Last drawn terminal area, for mouse hit-testing
    area: Rect,
    should_quit: bool,
}

impl App {
    /// Build the surface from `config` and warm up `engine`
    pub fn new(config: &Config, engine: Box<dyn SoundEngine>, piano: Piano) -> Result<Self> {
        let mut surface = PadSurface::new(config.surface.clone(), engine)?;
        surface.warm_up()?;
        let release_after = Duration::from_millis(config.input.release_after_ms);
        let bindings = KeyBindings::from_pads(surface.pads(), release_after);

        Ok(Self {
            surface,
            bindings,
            piano,
            piano_keys: piano_bindings(release_after),
            mode: Mode::default(),
            demo: Sequence::demo(),
            clock: SystemClock::new(),
            theme: config.theme.clone(),
            os_keyboard: false,
            has_focus: true,
            pointer: None,
            area: Rect::default(),
            should_quit: false,
        })
    }

    /// Use `clock` to map instants onto the surface timeline
    pub fn with_clock(mut self, clock: SystemClock) -> Self {
        self.clock = clock;
        self
    }

    /// Route pad keys through the OS listener
    pub fn set_os_keyboard(&mut self, active: bool) {
        self.os_keyboard = active;
    }

    /// Remember the terminal area the last frame was drawn into
    pub fn set_area(&mut self, area: Rect) {
        self.area = area;
    }

    /// Handle one terminal event
    pub fn handle_event(&mut self, event: &Event, now: Instant) {
        self.advance(now);
        match event {
            Event::Key(key) => self.handle_key(key, now),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::FocusGained => self.has_focus = true,
            Event::FocusLost => {
                self.has_focus = false;
                self.release_all();
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: &KeyEvent, now: Instant) {
        match key.kind {
            KeyEventKind::Press => match key.code {
                KeyCode::Esc => self.should_quit = true,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.should_quit = true
                }
                KeyCode::Tab => self.switch_mode(),
                // The OS listener reports Space itself
                KeyCode::Char(' ') if !self.os_keyboard => self.toggle_demo(),
                KeyCode::Char(c) if !self.os_keyboard => self.key_down(c, now),
                _ => {}
            },
            KeyEventKind::Repeat if !self.os_keyboard => {
                // Touch the key on repeat to extend auto-release
                if let KeyCode::Char(c) = key.code {
                    match self.mode {
                        Mode::Pads => self.bindings.touch(c, now),
                        Mode::Piano => self.piano_keys.touch(c, now),
                    }
                }
            }
            KeyEventKind::Release if !self.os_keyboard => {
                if let KeyCode::Char(c) = key.code {
                    self.key_up(c);
                }
            }
            _ => {}
        }
    }

    fn handle_mouse(&mut self, mouse: &MouseEvent) {
        let under = self.pointer_target(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.end_pointer_hold();
                match under {
                    Some(Pointer::Pad(pad)) => {
                        if self.surface.on_hold_start(&pad) {
                            self.pointer = Some(Pointer::Pad(pad));
                        }
                    }
                    Some(Pointer::Note(note)) => {
                        self.piano.note_on(note);
                        self.pointer = Some(Pointer::Note(note));
                    }
                    None => {}
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if self.pointer.is_some() && self.pointer != under {
                    self.end_pointer_hold();
                }
            }
            MouseEventKind::Up(MouseButton::Left) => self.end_pointer_hold(),
            _ => {}
        }
    }

    /// Handle one event from the OS keyboard listener
    pub fn handle_os_event(&mut self, event: OsKeyEvent, now: Instant) {
        if !self.has_focus {
            return;
        }
        self.advance(now);
        match event {
            OsKeyEvent::Press(ESCAPE) => self.should_quit = true,
            OsKeyEvent::Press(' ') => self.toggle_demo(),
            OsKeyEvent::Press(c) => self.key_down(c, now),
            OsKeyEvent::Release(c) => self.key_up(c),
        }
    }

    /// Fire due timers and release keys whose auto-release ran out
    pub fn tick(&mut self, now: Instant) {
        self.advance(now);
        if self.os_keyboard {
            return;
        }
        for pad in self.bindings.expired(now) {
            log::debug!("Auto-releasing {}", pad);
            self.surface.on_hold_end(&pad);
        }
        for note in self.piano_keys.expired(now) {
            self.piano.note_off(note);
        }
    }

    /// How long the host may block waiting for input
    pub fn poll_timeout(&mut self, now: Instant) -> Duration {
        let now_ms = self.clock.millis_at(now);
        match self.surface.next_deadline() {
            Some(deadline) => FRAME.min(Duration::from_millis(deadline.saturating_sub(now_ms))),
            None => FRAME,
        }
    }

    fn advance(&mut self, now: Instant) {
        self.surface.advance_to(self.clock.millis_at(now));
    }

    fn key_down(&mut self, c: char, now: Instant) {
        match self.mode {
            Mode::Pads => {
                if let Some(pad) = self.bindings.key_down(c, now) {
                    self.surface.on_hold_start(&pad);
                }
            }
            Mode::Piano => {
                if let Some(note) = self.piano_keys.key_down(c, now) {
                    self.piano.note_on(note);
                }
            }
        }
    }

    fn key_up(&mut self, c: char) {
        match self.mode {
            Mode::Pads => {
                if let Some(pad) = self.bindings.key_up(c) {
                    self.surface.on_hold_end(&pad);
                }
            }
            Mode::Piano => {
                if let Some(note) = self.piano_keys.key_up(c) {
                    self.piano.note_off(note);
                }
            }
        }
    }

    fn toggle_demo(&mut self) {
        if self.mode != Mode::Pads {
            return;
        }
        let playing = self.surface.toggle_sequence(&self.demo);
        log::info!("Demo {}", if playing { "started" } else { "stopped" });
    }

    /// Switch between pads and piano, silencing the one being left
    fn switch_mode(&mut self) {
        self.release_all();
        self.surface.stop_sequence();
        self.mode = self.mode.other();
        log::info!("Switched to {}", self.mode.label());
    }

    fn end_pointer_hold(&mut self) {
        match self.pointer.take() {
            Some(Pointer::Pad(pad)) => {
                self.surface.on_hold_end(&pad);
            }
            Some(Pointer::Note(note)) => {
                self.piano.note_off(note);
            }
            None => {}
        }
    }

    fn release_all(&mut self) {
        self.bindings.release_all();
        self.piano_keys.release_all();
        self.pointer = None;
        self.surface.release_all();
        self.piano.release();
    }

    fn pointer_target(&self, column: u16, row: u16) -> Option<Pointer> {
        let grid = ui::screen_layout(self.area).grid;
        match self.mode {
            Mode::Pads => {
                let pads = self.surface.pads();
                ui::pad_at(grid, pads.len(), column, row).map(|i| Pointer::Pad(pads[i].id.clone()))
            }
            Mode::Piano => {
                ui::piano_key_at(grid, column, row).map(|i| Pointer::Note(PIANO_KEYS[i].1))
            }
        }
    }

    pub fn surface(&self) -> &PadSurface {
        &self.surface
    }

    pub fn piano(&self) -> &Piano {
        &self.piano
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// State for one frame
    pub fn view(&self) -> View<'_> {
        View {
            surface: &self.surface,
            theme: &self.theme,
            input_mode: self.input_mode(),
            mode: self.mode,
            piano_note: self.piano.active(),
        }
    }

    /// Label for the status line
    pub fn input_mode(&self) -> &'static str {
        if self.os_keyboard {
            "OS"
        } else {
            "terminal"
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Release everything and dispose the sound engine
    pub fn shutdown(&mut self) {
        self.release_all();
        self.surface.shutdown();
    }
}
