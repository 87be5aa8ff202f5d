//! beatpad-core - Trigger scheduling for a drum-pad instrument.
//!
//! This crate turns pad input into timed sound triggers:
//!
//! - **Scheduler** - Cancellable delayed actions on a logical millisecond timeline
//! - **Dispatcher** - The single path from a pad to the sound engine, with active pulses
//! - **Repeat** - Held pads re-trigger at a per-pad rate until released
//! - **Sequence** - Timed event lists with progress and a grace period after completion
//! - **Surface** - Facade owning all of the above, driven by a host event loop
//!
//! # Architecture
//!
//! Everything runs on one thread. The host forwards input to a
//! [`PadSurface`] and calls [`PadSurface::advance_to`] with the current
//! time from a [`SystemClock`]. Timers carry a [`TimerAction`] instead of a
//! callback; the surface routes each fired action to the component that
//! registered it. No component ever fires a timer synchronously.
//!
//! ```
//! use beatpad_core::{LogSoundEngine, PadId, PadSurface, SurfaceConfig};
//!
//! let mut surface = PadSurface::new(SurfaceConfig::default(), Box::new(LogSoundEngine::new())).unwrap();
//! surface.warm_up().unwrap();
//!
//! let hihat = PadId::from("HiHat");
//! surface.on_hold_start(&hihat);
//! surface.advance_to(250);
//! surface.on_hold_end(&hihat);
//! assert!(!surface.is_holding(&hihat));
//! ```

pub mod action;
pub mod dispatcher;
pub mod error;
pub mod pad;
pub mod repeat;
pub mod scheduler;
pub mod sequence;
pub mod sound;
pub mod surface;
pub mod timing;

// Re-export main types for convenience
pub use action::TimerAction;
pub use dispatcher::{ActivePulse, DispatchOptions, DispatchOutcome, TriggerDispatcher};
pub use error::{Error, Result};
pub use pad::{default_pads, Articulation, PadConfig, PadId, DEFAULT_REPEAT_MS};
pub use repeat::{RepeatEngine, RepeatRates};
pub use scheduler::{Fired, Scheduler, TimerHandle};
pub use sequence::{progress_at, Sequence, SequenceEvent, SequencePlayer};
pub use sound::{LogSoundEngine, SoundEngine};
pub use surface::{PadSurface, SurfaceConfig};
pub use timing::{Millis, SystemClock};
