//! OS-level keyboard input
//!
//! Terminals report auto-repeat as presses and usually never report the
//! release, which makes holds end on a timeout. With the `os-keyboard`
//! feature an rdev listener thread captures real press and release
//! events instead. Without the feature [`OsKeyboardListener::new`] always
//! returns `None` and the host falls back to terminal input.

/// Keyboard events from the OS-level listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsKeyEvent {
    /// A key went down
    Press(char),
    /// A key came up
    Release(char),
}

/// Character reported for the Escape key
pub const ESCAPE: char = '\x1b';

#[cfg(feature = "os-keyboard")]
pub use self::listener::{key_to_char, OsKeyboardListener};

#[cfg(feature = "os-keyboard")]
mod listener {
    use super::{OsKeyEvent, ESCAPE};
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use rdev::{listen, Event, EventType, Key};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};

    /// Listener thread forwarding press and release events over a channel
    pub struct OsKeyboardListener {
        event_rx: Receiver<OsKeyEvent>,
        shutdown: Arc<AtomicBool>,
        _thread: JoinHandle<()>,
    }

    impl OsKeyboardListener {
        /// Start the listener
        ///
        /// Returns None when no display server is available
        pub fn new() -> Option<Self> {
            if !super::is_available() {
                return None;
            }

            let (tx, rx) = unbounded();
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            let thread = thread::Builder::new()
                .name("beatpad-os-keyboard".to_string())
                .spawn(move || run_listener(tx, flag))
                .map_err(|e| log::warn!("Failed to start OS keyboard listener: {}", e))
                .ok()?;

            log::info!("OS keyboard listener started");
            Some(Self {
                event_rx: rx,
                shutdown,
                _thread: thread,
            })
        }

        /// Next pending event, if any (non-blocking)
        pub fn try_recv(&self) -> Option<OsKeyEvent> {
            self.event_rx.try_recv().ok()
        }

        /// Discard every pending event
        pub fn drain(&self) {
            while self.event_rx.try_recv().is_ok() {}
        }
    }

    impl Drop for OsKeyboardListener {
        fn drop(&mut self) {
            // rdev::listen cannot be interrupted; the thread stops forwarding.
            self.shutdown.store(true, Ordering::Relaxed);
        }
    }

    /// Map a physical key (US layout) to the character pads are bound to
    pub fn key_to_char(key: Key) -> Option<char> {
        let c = match key {
            Key::Num1 => '1',
            Key::Num2 => '2',
            Key::Num3 => '3',
            Key::Num4 => '4',
            Key::Num5 => '5',
            Key::Num6 => '6',
            Key::Num7 => '7',
            Key::Num8 => '8',
            Key::Num9 => '9',
            Key::Num0 => '0',
            Key::KeyQ => 'q',
            Key::KeyW => 'w',
            Key::KeyE => 'e',
            Key::KeyR => 'r',
            Key::KeyT => 't',
            Key::KeyY => 'y',
            Key::KeyU => 'u',
            Key::KeyI => 'i',
            Key::KeyO => 'o',
            Key::KeyP => 'p',
            Key::KeyA => 'a',
            Key::KeyS => 's',
            Key::KeyD => 'd',
            Key::KeyF => 'f',
            Key::KeyG => 'g',
            Key::KeyH => 'h',
            Key::KeyJ => 'j',
            Key::KeyK => 'k',
            Key::KeyL => 'l',
            Key::KeyZ => 'z',
            Key::KeyX => 'x',
            Key::KeyC => 'c',
            Key::KeyV => 'v',
            Key::KeyB => 'b',
            Key::KeyN => 'n',
            Key::KeyM => 'm',
            Key::Space => ' ',
            Key::Escape => ESCAPE,
            _ => return None,
        };
        Some(c)
    }

    /// Blocks inside rdev until it fails
    fn run_listener(tx: Sender<OsKeyEvent>, shutdown: Arc<AtomicBool>) {
        let callback = move |event: Event| {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            let event = match event.event_type {
                EventType::KeyPress(key) => key_to_char(key).map(OsKeyEvent::Press),
                EventType::KeyRelease(key) => key_to_char(key).map(OsKeyEvent::Release),
                _ => None,
            };
            if let Some(event) = event {
                let _ = tx.send(event);
            }
        };

        if let Err(e) = listen(callback) {
            log::error!("OS keyboard listener error: {:?}", e);
        }
    }

}

/// Stand-in used when built without the `os-keyboard` feature
#[cfg(not(feature = "os-keyboard"))]
pub struct OsKeyboardListener {
    _private: (),
}

#[cfg(not(feature = "os-keyboard"))]
impl OsKeyboardListener {
    /// Always None: OS keyboard support is not compiled in
    pub fn new() -> Option<Self> {
        log::debug!("Built without os-keyboard, using terminal key events");
        None
    }

    pub fn try_recv(&self) -> Option<OsKeyEvent> {
        None
    }

    pub fn drain(&self) {}
}

/// Whether an OS-level listener can work in this session
pub fn is_available() -> bool {
    if !cfg!(feature = "os-keyboard") {
        return false;
    }
    // On Linux, rdev requires X11 or Wayland
    if cfg!(target_os = "linux") {
        std::env::var("DISPLAY").is_ok() || std::env::var("WAYLAND_DISPLAY").is_ok()
    } else {
        true
    }
}
