//! The pad surface: one object that owns the scheduler and every component
//! driven by it.
//!
//! Hosts feed input events (`on_hold_start`, `on_tap`, ...) and wall-clock
//! time (`advance_to`) into a [`PadSurface`], then read back display state
//! (`is_active`, `current_progress`). Fired timers are routed to the
//! component that registered them, one at a time, in due order.

use crate::action::TimerAction;
use crate::dispatcher::{DispatchOptions, DispatchOutcome, TriggerDispatcher};
use crate::dispatcher::{DIRECT_PULSE_MS, SEQUENCE_PULSE_MS};
use crate::error::{Error, Result};
use crate::pad::{default_pads, PadConfig, PadId, DEFAULT_REPEAT_MS};
use crate::repeat::{RepeatEngine, RepeatRates};
use crate::scheduler::Scheduler;
use crate::sequence::{Sequence, SequencePlayer};
use crate::sound::SoundEngine;
use crate::timing::Millis;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Pad table and timing settings for a [`PadSurface`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Repeat interval for pads without their own `repeat_ms`.
    pub default_repeat_ms: Millis,
    /// Pulse length after a tap or held-pad trigger.
    pub direct_pulse_ms: Millis,
    /// Pulse length after a sequence trigger.
    pub sequence_pulse_ms: Millis,
    pub pads: Vec<PadConfig>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            default_repeat_ms: DEFAULT_REPEAT_MS,
            direct_pulse_ms: DIRECT_PULSE_MS,
            sequence_pulse_ms: SEQUENCE_PULSE_MS,
            pads: default_pads(),
        }
    }
}

impl SurfaceConfig {
    /// Check repeat rates and uniqueness of pad ids and keys.
    pub fn validate(&self) -> Result<()> {
        if self.default_repeat_ms == 0 {
            return Err(Error::Config("default_repeat_ms must be positive".to_string()));
        }

        let mut ids = HashSet::new();
        let mut keys = HashSet::new();
        for pad in &self.pads {
            if pad.id.as_str().is_empty() {
                return Err(Error::Config("pad id must not be empty".to_string()));
            }
            if !ids.insert(&pad.id) {
                return Err(Error::Config(format!("duplicate pad id '{}'", pad.id)));
            }
            if pad.repeat_ms == Some(0) {
                return Err(Error::Config(format!(
                    "pad '{}' has a zero repeat_ms",
                    pad.id
                )));
            }
            if let Some(key) = pad.key {
                if !keys.insert(key.to_ascii_lowercase()) {
                    return Err(Error::Config(format!(
                        "key '{}' is bound to more than one pad",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up a pad by id.
    pub fn pad(&self, id: &str) -> Option<&PadConfig> {
        self.pads.iter().find(|p| p.id.as_str() == id)
    }

    /// Look up the pad bound to a keyboard character.
    pub fn pad_for_key(&self, key: char) -> Option<&PadConfig> {
        let key = key.to_ascii_lowercase();
        self.pads.iter().find(|p| p.key == Some(key))
    }
}

/// Facade over the scheduler, dispatcher, repeat engine and sequence player.
pub struct PadSurface {
    pads: Vec<PadConfig>,
    scheduler: Scheduler<TimerAction>,
    dispatcher: TriggerDispatcher,
    repeat: RepeatEngine,
    player: SequencePlayer,
    shut_down: bool,
}

impl PadSurface {
    /// Build a surface for `config` that plays through `engine`.
    pub fn new(config: SurfaceConfig, engine: Box<dyn SoundEngine>) -> Result<Self> {
        config.validate()?;
        let dispatcher = TriggerDispatcher::new(&config.pads, engine)
            .with_pulse_durations(config.direct_pulse_ms, config.sequence_pulse_ms);
        let repeat = RepeatEngine::new(RepeatRates::from_pads(&config.pads, config.default_repeat_ms));
        log::debug!(
            "Pad surface with {} pads on '{}' engine",
            config.pads.len(),
            dispatcher.engine().name()
        );
        Ok(Self {
            pads: config.pads,
            scheduler: Scheduler::new(),
            dispatcher,
            repeat,
            player: SequencePlayer::new(),
            shut_down: false,
        })
    }

    /// Prepare the sound engine.
    pub fn warm_up(&mut self) -> Result<()> {
        if self.shut_down {
            return Err(Error::Disposed);
        }
        self.dispatcher.engine_mut().warm_up()
    }

    /// Start holding `pad`. Returns `true` if a new hold began.
    pub fn on_hold_start(&mut self, pad: &PadId) -> bool {
        if !self.accepts(pad) {
            return false;
        }
        self.repeat
            .start_hold(pad, &mut self.dispatcher, &mut self.scheduler)
    }

    /// Release `pad`. Returns `true` if it was held.
    pub fn on_hold_end(&mut self, pad: &PadId) -> bool {
        if self.shut_down {
            return false;
        }
        self.repeat.stop_hold(pad, &mut self.scheduler)
    }

    /// Trigger `pad` once without holding it.
    pub fn on_tap(&mut self, pad: &PadId) -> bool {
        if !self.accepts(pad) {
            return false;
        }
        self.dispatcher
            .dispatch(pad, DispatchOptions::direct(), &mut self.scheduler)
            == DispatchOutcome::Triggered
    }

    /// Start `sequence` unless one is already playing.
    pub fn play_sequence(&mut self, sequence: &Sequence) -> bool {
        if self.shut_down {
            return false;
        }
        self.player.play(sequence, &mut self.scheduler)
    }

    /// Stop the playing sequence and reset progress.
    pub fn stop_sequence(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        self.player.stop(&mut self.scheduler)
    }

    /// Play `sequence` if idle, stop it if playing. Returns whether a
    /// sequence is playing afterwards.
    pub fn toggle_sequence(&mut self, sequence: &Sequence) -> bool {
        if self.player.is_playing() {
            self.stop_sequence();
        } else {
            self.play_sequence(sequence);
        }
        self.player.is_playing()
    }

    /// Release every held pad.
    pub fn release_all(&mut self) -> Vec<PadId> {
        if self.shut_down {
            return Vec::new();
        }
        let released = self.repeat.stop_all(&mut self.scheduler);
        if !released.is_empty() {
            log::debug!("Released {} held pads", released.len());
        }
        released
    }

    /// Fire every timer due at or before `now_ms`, then let the engine do
    /// its housekeeping.
    pub fn advance_to(&mut self, now_ms: Millis) {
        if self.shut_down {
            return;
        }
        let Self {
            scheduler,
            dispatcher,
            repeat,
            player,
            ..
        } = self;

        while let Some(fired) = scheduler.pop_due(now_ms) {
            match fired.action {
                TimerAction::RepeatTick(pad) => {
                    repeat.on_tick(&pad, fired.handle, dispatcher, scheduler)
                }
                TimerAction::PulseClear(pad) => dispatcher.clear_pulse(&pad, fired.handle),
                TimerAction::SequenceStep { pad, progress } => {
                    player.on_step(&pad, progress, dispatcher, scheduler)
                }
                TimerAction::SequenceEnd => player.on_end(scheduler),
                TimerAction::ProgressReset => player.on_progress_reset(fired.handle),
            }
        }
        scheduler.advance_to(now_ms);
        dispatcher.engine_mut().service();
    }

    /// Whether `pad` should be drawn lit. Only trigger pulses light a pad,
    /// so a held pad flashes once per repeat; see [`Self::is_holding`].
    pub fn is_active(&self, pad: &PadId) -> bool {
        self.dispatcher.is_pulsing(pad)
    }

    pub fn is_holding(&self, pad: &PadId) -> bool {
        self.repeat.is_repeating(pad)
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    /// Sequence progress in percent.
    pub fn current_progress(&self) -> u8 {
        self.player.progress()
    }

    /// Earliest pending timer, for sizing the host's poll timeout.
    pub fn next_deadline(&mut self) -> Option<Millis> {
        self.scheduler.next_deadline()
    }

    /// Current logical time.
    pub fn now(&self) -> Millis {
        self.scheduler.now()
    }

    /// The pad table.
    pub fn pads(&self) -> &[PadConfig] {
        &self.pads
    }

    /// The sound engine.
    pub fn engine(&self) -> &dyn SoundEngine {
        self.dispatcher.engine()
    }

    /// Successful and dropped dispatches so far.
    pub fn dispatch_counts(&self) -> (u64, u64) {
        (self.dispatcher.dispatched(), self.dispatcher.dropped())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Cancel every timer and dispose the sound engine. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.repeat.stop_all(&mut self.scheduler);
        self.player.stop(&mut self.scheduler);
        self.dispatcher.clear_all(&mut self.scheduler);

        let leaked = self.scheduler.clear();
        if leaked > 0 {
            log::warn!("{} timers still pending at shutdown", leaked);
        }
        self.dispatcher.engine_mut().dispose();
        self.shut_down = true;
        log::info!("Pad surface shut down");
    }

    fn accepts(&self, pad: &PadId) -> bool {
        if self.shut_down {
            return false;
        }
        if !self.dispatcher.knows(pad) {
            log::warn!("Ignoring input for unknown pad '{}'", pad);
            return false;
        }
        true
    }
}

impl Drop for PadSurface {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::testing::{Recording, RecordingEngine};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn surface() -> (PadSurface, Rc<RefCell<Recording>>) {
        init_logging();
        let (engine, state) = RecordingEngine::new();
        let surface = PadSurface::new(SurfaceConfig::default(), Box::new(engine)).unwrap();
        (surface, state)
    }

    fn count(state: &Rc<RefCell<Recording>>, sound: &str) -> usize {
        state.borrow().triggers.iter().filter(|s| *s == sound).count()
    }

    #[test]
    fn test_default_config_is_valid() {
        SurfaceConfig::default().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut config = SurfaceConfig::default();
        config.pads.push(PadConfig::new("Kick"));
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = SurfaceConfig::default();
        config.pads.push(PadConfig::new("Cowbell").with_key('1'));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_rates() {
        let mut config = SurfaceConfig::default();
        config.default_repeat_ms = 0;
        assert!(config.validate().is_err());

        let mut config = SurfaceConfig::default();
        config.pads.push(PadConfig::new("Cowbell").with_repeat_ms(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pad_for_key_ignores_case() {
        let config = SurfaceConfig::default();
        assert_eq!(config.pad_for_key('Q').map(|p| p.id.as_str()), Some("Vocal"));
        assert_eq!(config.pad_for_key('z'), None);
        assert!(config.pad("Arp").is_some());
    }

    #[test]
    fn test_config_from_partial_toml() {
        let config: SurfaceConfig = toml::from_str(
            r#"
            default_repeat_ms = 250

            [[pads]]
            id = "Kick"
            key = "k"
            "#,
        )
        .unwrap();
        assert_eq!(config.default_repeat_ms, 250);
        assert_eq!(config.direct_pulse_ms, DIRECT_PULSE_MS);
        assert_eq!(config.pads.len(), 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_fast_repeat_stays_lit_until_release() {
        let (mut surface, state) = surface();
        let hihat = PadId::from("HiHat");

        assert!(surface.on_hold_start(&hihat));
        assert!(surface.is_active(&hihat));
        for t in 0..=250 {
            surface.advance_to(t);
            assert!(surface.is_active(&hihat), "dark at {}ms", t);
        }
        assert!(surface.on_hold_end(&hihat));
        assert_eq!(count(&state, "HiHat"), 3);

        // The last pulse (from 200ms) still runs to 300ms.
        surface.advance_to(299);
        assert!(surface.is_active(&hihat));
        surface.advance_to(300);
        assert!(!surface.is_active(&hihat));
        surface.advance_to(2000);
        assert_eq!(count(&state, "HiHat"), 3);
    }

    #[test]
    fn test_slow_held_pad_goes_dark_between_ticks() {
        let (mut surface, state) = surface();
        let pad = PadId::from("Pad");

        assert!(surface.on_hold_start(&pad));
        assert!(surface.is_active(&pad));
        surface.advance_to(99);
        assert!(surface.is_active(&pad));
        surface.advance_to(100);
        assert!(!surface.is_active(&pad));
        assert!(surface.is_holding(&pad));
        surface.advance_to(499);
        assert!(!surface.is_active(&pad));

        surface.advance_to(500);
        assert!(surface.is_active(&pad));
        surface.advance_to(600);
        assert!(!surface.is_active(&pad));
        assert!(surface.is_holding(&pad));

        assert!(surface.on_hold_end(&pad));
        surface.advance_to(2000);
        assert_eq!(count(&state, "Pad"), 2);
        assert!(!surface.is_active(&pad));
        assert!(!surface.is_holding(&pad));
    }

    #[test]
    fn test_tap_pulses_once() {
        let (mut surface, state) = surface();
        let kick = PadId::from("Kick");
        assert!(surface.on_tap(&kick));
        assert!(surface.is_active(&kick));
        assert!(!surface.is_holding(&kick));
        surface.advance_to(100);
        assert!(!surface.is_active(&kick));
        assert_eq!(count(&state, "Kick"), 1);
    }

    #[test]
    fn test_unknown_pad_is_ignored() {
        let (mut surface, state) = surface();
        let cowbell = PadId::from("Cowbell");
        assert!(!surface.on_hold_start(&cowbell));
        assert!(!surface.on_tap(&cowbell));
        assert!(!surface.is_active(&cowbell));
        assert_eq!(surface.next_deadline(), None);
        assert!(state.borrow().triggers.is_empty());
    }

    #[test]
    fn test_demo_runs_to_completion() {
        let (mut surface, state) = surface();
        let demo = Sequence::demo();
        assert!(surface.toggle_sequence(&demo));

        let mut last = 0;
        let mut t = 0;
        while t <= 15_000 {
            surface.advance_to(t);
            assert!(surface.current_progress() >= last);
            last = surface.current_progress();
            t += 50;
        }
        assert!(!surface.is_playing());
        assert_eq!(surface.current_progress(), 100);
        assert_eq!(state.borrow().triggers.len(), demo.events.len());

        surface.advance_to(16_000);
        assert_eq!(surface.current_progress(), 0);
    }

    #[test]
    fn test_toggle_stops_playback() {
        let (mut surface, state) = surface();
        let demo = Sequence::demo();
        surface.toggle_sequence(&demo);
        surface.advance_to(1000);
        let played = state.borrow().triggers.len();

        assert!(!surface.toggle_sequence(&demo));
        assert_eq!(surface.current_progress(), 0);
        surface.advance_to(20_000);
        assert_eq!(state.borrow().triggers.len(), played);
    }

    #[test]
    fn test_hold_during_playback() {
        let (mut surface, state) = surface();
        let sequence = Sequence::new("Kicks", 1000)
            .with_event(0, "Kick")
            .with_event(500, "Kick");
        let snare = PadId::from("Snare");

        surface.play_sequence(&sequence);
        surface.on_hold_start(&snare);
        surface.advance_to(700);
        surface.release_all();
        surface.advance_to(2000);

        // Snare repeats every 150ms: 0, 150, 300, 450, 600.
        assert_eq!(count(&state, "Snare"), 5);
        assert_eq!(count(&state, "Kick"), 2);
        assert!(!surface.is_holding(&snare));
    }

    #[test]
    fn test_shutdown_cancels_everything() {
        let (mut surface, state) = surface();
        surface.on_hold_start(&PadId::from("HiHat"));
        surface.play_sequence(&Sequence::demo());
        surface.advance_to(500);
        assert!(surface.next_deadline().is_some());

        surface.shutdown();
        assert!(surface.is_shut_down());
        assert_eq!(surface.next_deadline(), None);
        assert!(state.borrow().disposed);

        let played = state.borrow().triggers.len();
        surface.advance_to(20_000);
        assert!(!surface.on_hold_start(&PadId::from("Kick")));
        assert!(!surface.play_sequence(&Sequence::demo()));
        assert!(matches!(surface.warm_up(), Err(Error::Disposed)));
        assert_eq!(state.borrow().triggers.len(), played);

        // Second shutdown is a no-op.
        surface.shutdown();
    }

    #[test]
    fn test_drop_disposes_engine() {
        let (mut surface, state) = surface();
        surface.on_hold_start(&PadId::from("Kick"));
        drop(surface);
        assert!(state.borrow().disposed);
    }
}
