//! Trigger dispatcher: the single path from a pad to the sound engine.
//!
//! Both the repeat engine and the sequence player end up here. A dispatch
//! resolves the pad to its sound and articulation, asks the engine to play
//! it, and lights the pad for a short pulse. Failures are dropped and
//! logged, never returned to the caller.

use crate::action::TimerAction;
use crate::pad::{Articulation, PadConfig, PadId};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::sound::SoundEngine;
use crate::timing::Millis;
use std::collections::HashMap;

/// Pulse length for direct (tap or held) triggers.
pub const DIRECT_PULSE_MS: Millis = 100;

/// Pulse length for sequence triggers, long enough to stay visible at fast
/// sequence timing.
pub const SEQUENCE_PULSE_MS: Millis = 150;

/// Where a dispatch came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Triggered by sequence playback rather than by the player.
    pub sequence_playback: bool,
}

impl DispatchOptions {
    /// Tap or held-pad trigger.
    pub fn direct() -> Self {
        Self {
            sequence_playback: false,
        }
    }

    /// Sequence playback trigger.
    pub fn sequence() -> Self {
        Self {
            sequence_playback: true,
        }
    }
}

/// Result of one dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The engine accepted the trigger and the pad is pulsing.
    Triggered,
    /// No pad with this id.
    UnknownPad,
    /// The sound is still loading; the trigger was dropped.
    NotReady,
    /// The engine reported an error; the trigger was dropped.
    Failed,
}

/// Transient highlight of a pad after a trigger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivePulse {
    /// The lit pad.
    pub pad: PadId,
    /// When the highlight ends.
    pub expires_at: Millis,
    clear: TimerHandle,
}

struct PadSound {
    sound: String,
    articulation: Articulation,
}

/// Routes pad triggers to the sound engine and tracks active pulses.
pub struct TriggerDispatcher {
    engine: Box<dyn SoundEngine>,
    sounds: HashMap<PadId, PadSound>,
    pulses: HashMap<PadId, ActivePulse>,
    direct_pulse_ms: Millis,
    sequence_pulse_ms: Millis,
    dispatched: u64,
    dropped: u64,
}

impl TriggerDispatcher {
    /// Create a dispatcher for the given pad table.
    pub fn new(pads: &[PadConfig], engine: Box<dyn SoundEngine>) -> Self {
        let sounds = pads
            .iter()
            .map(|pad| {
                (
                    pad.id.clone(),
                    PadSound {
                        sound: pad.sound_id().to_string(),
                        articulation: pad.articulation.clone(),
                    },
                )
            })
            .collect();

        Self {
            engine,
            sounds,
            pulses: HashMap::new(),
            direct_pulse_ms: DIRECT_PULSE_MS,
            sequence_pulse_ms: SEQUENCE_PULSE_MS,
            dispatched: 0,
            dropped: 0,
        }
    }

    /// Override the pulse lengths.
    pub fn with_pulse_durations(mut self, direct_ms: Millis, sequence_ms: Millis) -> Self {
        self.direct_pulse_ms = direct_ms;
        self.sequence_pulse_ms = sequence_ms;
        self
    }

    /// Trigger `pad` now.
    pub fn dispatch(
        &mut self,
        pad: &PadId,
        options: DispatchOptions,
        scheduler: &mut Scheduler<TimerAction>,
    ) -> DispatchOutcome {
        let Some(entry) = self.sounds.get(pad) else {
            log::warn!("Dropping trigger for unknown pad '{}'", pad);
            self.dropped += 1;
            return DispatchOutcome::UnknownPad;
        };

        if !self.engine.is_ready(&entry.sound) {
            log::warn!("Sound '{}' not ready yet, dropping trigger for pad '{}'", entry.sound, pad);
            self.dropped += 1;
            return DispatchOutcome::NotReady;
        }

        if let Err(e) = self.engine.trigger(&entry.sound, &entry.articulation) {
            log::warn!("Error playing sound '{}' for pad '{}': {}", entry.sound, pad, e);
            self.dropped += 1;
            return DispatchOutcome::Failed;
        }

        self.dispatched += 1;
        let duration = if options.sequence_playback {
            self.sequence_pulse_ms
        } else {
            self.direct_pulse_ms
        };
        self.pulse(pad, duration, scheduler);
        DispatchOutcome::Triggered
    }

    /// Light `pad` for `duration` ms. A newer pulse replaces the clear timer
    /// of an older one, so the pad stays lit without a gap.
    fn pulse(&mut self, pad: &PadId, duration: Millis, scheduler: &mut Scheduler<TimerAction>) {
        let clear = scheduler.after(duration, TimerAction::PulseClear(pad.clone()));
        let pulse = ActivePulse {
            pad: pad.clone(),
            expires_at: scheduler.now() + duration,
            clear,
        };
        if let Some(previous) = self.pulses.insert(pad.clone(), pulse) {
            scheduler.cancel(previous.clear);
        }
    }

    /// Handle a fired [`TimerAction::PulseClear`].
    pub fn clear_pulse(&mut self, pad: &PadId, handle: TimerHandle) {
        if self.pulses.get(pad).is_some_and(|p| p.clear == handle) {
            self.pulses.remove(pad);
        }
    }

    /// Drop every pulse and its clear timer.
    pub fn clear_all(&mut self, scheduler: &mut Scheduler<TimerAction>) {
        for (_, pulse) in self.pulses.drain() {
            scheduler.cancel(pulse.clear);
        }
    }

    /// Whether `pad` is currently lit by a pulse.
    pub fn is_pulsing(&self, pad: &PadId) -> bool {
        self.pulses.contains_key(pad)
    }

    /// All live pulses.
    pub fn active_pulses(&self) -> impl Iterator<Item = &ActivePulse> {
        self.pulses.values()
    }

    /// Whether the pad table contains `pad`.
    pub fn knows(&self, pad: &PadId) -> bool {
        self.sounds.contains_key(pad)
    }

    /// Successful dispatches so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Dropped dispatches so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// The sound engine.
    pub fn engine(&self) -> &dyn SoundEngine {
        self.engine.as_ref()
    }

    /// The sound engine, mutably.
    pub fn engine_mut(&mut self) -> &mut dyn SoundEngine {
        self.engine.as_mut()
    }
}
