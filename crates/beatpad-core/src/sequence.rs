//! Timed sequences and their playback.
//!
//! A [`SequencePlayer`] registers every event of a [`Sequence`] with the
//! scheduler up front, plus one terminal action at the sequence's total
//! duration. Stopping cancels the whole batch, so nothing fires once
//! [`SequencePlayer::stop`] returns.

use crate::action::TimerAction;
use crate::dispatcher::{DispatchOptions, TriggerDispatcher};
use crate::pad::PadId;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::timing::Millis;
use serde::{Deserialize, Serialize};

/// Length of the built-in demo.
pub const DEMO_DURATION_MS: Millis = 15_000;

/// Time the finished demo keeps showing 100% before resetting.
pub const DEFAULT_END_GRACE_MS: Millis = 1_000;

/// One timed pad trigger relative to the start of playback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceEvent {
    pub offset_ms: Millis,
    pub pad: PadId,
}

impl SequenceEvent {
    pub fn new(offset_ms: Millis, pad: impl Into<PadId>) -> Self {
        Self {
            offset_ms,
            pad: pad.into(),
        }
    }
}

/// A finite list of events with a fixed total length.
///
/// Events may be listed in any order. Events sharing an offset fire in
/// list order. Events past `total_duration_ms` never fire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    pub events: Vec<SequenceEvent>,
    pub total_duration_ms: Millis,
    #[serde(default = "default_end_grace")]
    pub end_grace_ms: Millis,
}

fn default_end_grace() -> Millis {
    DEFAULT_END_GRACE_MS
}

impl Sequence {
    /// Empty sequence of the given length.
    pub fn new(name: impl Into<String>, total_duration_ms: Millis) -> Self {
        Self {
            name: name.into(),
            events: Vec::new(),
            total_duration_ms,
            end_grace_ms: DEFAULT_END_GRACE_MS,
        }
    }

    /// Append an event.
    pub fn with_event(mut self, offset_ms: Millis, pad: impl Into<PadId>) -> Self {
        self.events.push(SequenceEvent::new(offset_ms, pad));
        self
    }

    /// Set how long 100% stays visible after completion.
    pub fn with_end_grace(mut self, end_grace_ms: Millis) -> Self {
        self.end_grace_ms = end_grace_ms;
        self
    }

    /// The built-in 15 second demo beat for the default pad table.
    pub fn demo() -> Self {
        Self {
            name: "Demo".to_string(),
            events: DEMO_EVENTS
                .iter()
                .map(|&(offset_ms, pad)| SequenceEvent::new(offset_ms, pad))
                .collect(),
            total_duration_ms: DEMO_DURATION_MS,
            end_grace_ms: DEFAULT_END_GRACE_MS,
        }
    }
}

#[rustfmt::skip]
const DEMO_EVENTS: &[(Millis, &str)] = &[
    // Intro (0-2 s)
    (0, "Kick"), (0, "Wobble"), (200, "HiHat"), (400, "HiHat"), (600, "Kick"), (800, "HiHat"),
    (1000, "Kick"), (1000, "Wobble"), (1200, "HiHat"), (1400, "Snare"), (1600, "HiHat"),
    (1800, "Kick"),
    // Build up (2-4 s)
    (2000, "Kick"), (2000, "Wobble"), (2100, "HiHat"), (2200, "HiHat"), (2300, "Clap"),
    (2400, "Kick"), (2500, "HiHat"), (2600, "HiHat"), (2700, "Clap"), (2800, "Kick"),
    (2800, "Wobble"), (2900, "HiHat"), (3000, "Glitch"), (3100, "HiHat"), (3200, "Kick"),
    (3300, "HiHat"), (3400, "Clap"), (3500, "HiHat"), (3600, "Kick"), (3600, "Wobble"),
    (3700, "HiHat"), (3800, "Glitch"), (3900, "HiHat"),
    // Drop with heavy bass (4-6 s)
    (4000, "Kick"), (4000, "Wobble"), (4100, "HiHat"), (4200, "HiHat"), (4300, "Clap"),
    (4400, "Kick"), (4500, "HiHat"), (4600, "HiHat"), (4700, "Clap"), (4800, "Kick"),
    (4800, "Wobble"), (4900, "HiHat"), (5000, "Glitch"), (5100, "HiHat"), (5200, "Kick"),
    (5300, "HiHat"), (5400, "Clap"), (5500, "HiHat"), (5600, "Kick"), (5600, "Wobble"),
    (5700, "HiHat"), (5800, "Glitch"), (5900, "HiHat"),
    // Vocal section with wobble (6-8 s)
    (6000, "Kick"), (6000, "Wobble"), (6000, "Vocal"), (6100, "HiHat"), (6200, "HiHat"),
    (6300, "Clap"), (6400, "Kick"), (6500, "HiHat"), (6600, "HiHat"), (6700, "Clap"),
    (6800, "Kick"), (6800, "Wobble"), (6900, "HiHat"), (7000, "Vox"), (7100, "HiHat"),
    (7200, "Kick"), (7300, "HiHat"), (7400, "Clap"), (7500, "HiHat"), (7600, "Kick"),
    (7600, "Wobble"), (7700, "HiHat"), (7800, "Vox"), (7900, "HiHat"),
    // Chord section with wobble (8-10 s)
    (8000, "Kick"), (8000, "Wobble"), (8000, "Chord"), (8100, "HiHat"), (8200, "HiHat"),
    (8300, "Clap"), (8400, "Kick"), (8500, "HiHat"), (8600, "HiHat"), (8700, "Clap"),
    (8800, "Kick"), (8800, "Wobble"), (8900, "HiHat"), (9000, "Glitch"), (9100, "HiHat"),
    (9200, "Kick"), (9300, "HiHat"), (9400, "Clap"), (9500, "HiHat"), (9600, "Kick"),
    (9600, "Wobble"), (9700, "HiHat"), (9800, "Chord"), (9900, "HiHat"),
    // Arp section with wobble (10-12 s)
    (10000, "Kick"), (10000, "Wobble"), (10000, "Arp"), (10100, "HiHat"), (10200, "HiHat"),
    (10300, "Clap"), (10400, "Kick"), (10500, "HiHat"), (10600, "HiHat"), (10700, "Clap"),
    (10800, "Kick"), (10800, "Wobble"), (10900, "HiHat"), (11000, "Arp"), (11100, "HiHat"),
    (11200, "Kick"), (11300, "HiHat"), (11400, "Clap"), (11500, "HiHat"), (11600, "Kick"),
    (11600, "Wobble"), (11700, "HiHat"), (11800, "Arp"), (11900, "HiHat"),
    // Climax (12-14 s)
    (12000, "Kick"), (12000, "Wobble"), (12000, "Chord"), (12000, "Vox"), (12100, "HiHat"),
    (12200, "HiHat"), (12300, "Clap"), (12400, "Kick"), (12400, "Wobble"), (12500, "HiHat"),
    (12600, "HiHat"), (12700, "Clap"), (12800, "Kick"), (12800, "Wobble"), (12900, "HiHat"),
    (13000, "Glitch"), (13100, "HiHat"), (13200, "Kick"), (13200, "Wobble"), (13300, "HiHat"),
    (13400, "Clap"), (13500, "HiHat"), (13600, "Kick"), (13600, "Wobble"), (13700, "HiHat"),
    (13800, "Vox"), (13900, "HiHat"),
    // Outro (14-15 s)
    (14000, "Kick"), (14000, "Wobble"), (14000, "Chord"), (14100, "HiHat"), (14200, "Clap"),
    (14300, "HiHat"), (14400, "Kick"), (14400, "Wobble"), (14500, "Pluck"), (14600, "HiHat"),
    (14700, "Clap"), (14800, "Kick"), (14800, "Wobble"), (14900, "Glitch"),
];

/// Percentage of `total_ms` reached at `offset_ms`, floored and capped at 100.
/// A zero-length sequence is always complete.
pub fn progress_at(offset_ms: Millis, total_ms: Millis) -> u8 {
    if total_ms == 0 {
        return 100;
    }
    let percent = offset_ms.saturating_mul(100) / total_ms;
    percent.min(100) as u8
}

/// Timers belonging to one run of a sequence.
#[derive(Debug)]
struct PlaybackSession {
    name: String,
    events: Vec<TimerHandle>,
    end: TimerHandle,
    end_grace_ms: Millis,
    started_at: Millis,
}

impl PlaybackSession {
    fn cancel(&self, scheduler: &mut Scheduler<TimerAction>) {
        for &handle in &self.events {
            scheduler.cancel(handle);
        }
        scheduler.cancel(self.end);
    }
}

/// Plays at most one sequence at a time and tracks its progress.
#[derive(Debug, Default)]
pub struct SequencePlayer {
    session: Option<PlaybackSession>,
    progress: u8,
    grace_reset: Option<TimerHandle>,
}

impl SequencePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start playing `sequence`.
    ///
    /// Returns `false` without touching any timer if a sequence is already
    /// playing.
    pub fn play(&mut self, sequence: &Sequence, scheduler: &mut Scheduler<TimerAction>) -> bool {
        if self.session.is_some() {
            log::debug!("[SEQUENCE] '{}' ignored, already playing", sequence.name);
            return false;
        }
        if let Some(reset) = self.grace_reset.take() {
            scheduler.cancel(reset);
        }
        self.progress = 0;

        let total = sequence.total_duration_ms;
        let events = sequence
            .events
            .iter()
            .map(|event| {
                scheduler.after(
                    event.offset_ms,
                    TimerAction::SequenceStep {
                        pad: event.pad.clone(),
                        progress: progress_at(event.offset_ms, total),
                    },
                )
            })
            .collect();
        let end = scheduler.after(total, TimerAction::SequenceEnd);

        log::info!(
            "[SEQUENCE] playing '{}' ({} events, {}ms)",
            sequence.name,
            sequence.events.len(),
            total
        );
        self.session = Some(PlaybackSession {
            name: sequence.name.clone(),
            events,
            end,
            end_grace_ms: sequence.end_grace_ms,
            started_at: scheduler.now(),
        });
        true
    }

    /// Stop playback and reset progress.
    ///
    /// Returns `false` if nothing was playing. Progress is reset and any
    /// pending grace reset is cancelled either way.
    pub fn stop(&mut self, scheduler: &mut Scheduler<TimerAction>) -> bool {
        if let Some(reset) = self.grace_reset.take() {
            scheduler.cancel(reset);
        }
        self.progress = 0;
        match self.session.take() {
            Some(session) => {
                session.cancel(scheduler);
                log::info!(
                    "[SEQUENCE] stopped '{}' after {}ms",
                    session.name,
                    scheduler.now().saturating_sub(session.started_at)
                );
                true
            }
            None => false,
        }
    }

    /// Handle a fired [`TimerAction::SequenceStep`].
    pub fn on_step(
        &mut self,
        pad: &PadId,
        progress: u8,
        dispatcher: &mut TriggerDispatcher,
        scheduler: &mut Scheduler<TimerAction>,
    ) {
        if self.session.is_none() {
            return;
        }
        dispatcher.dispatch(pad, DispatchOptions::sequence(), scheduler);
        self.progress = self.progress.max(progress);
    }

    /// Handle a fired [`TimerAction::SequenceEnd`].
    pub fn on_end(&mut self, scheduler: &mut Scheduler<TimerAction>) {
        let Some(session) = self.session.take() else {
            return;
        };
        // Events scheduled past the end are dropped with the session.
        session.cancel(scheduler);
        self.progress = 100;
        self.grace_reset = Some(scheduler.after(session.end_grace_ms, TimerAction::ProgressReset));
        log::info!("[SEQUENCE] '{}' finished", session.name);
    }

    /// Handle a fired [`TimerAction::ProgressReset`].
    pub fn on_progress_reset(&mut self, handle: TimerHandle) {
        if self.grace_reset == Some(handle) {
            self.grace_reset = None;
            self.progress = 0;
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    /// Current progress in percent.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Name of the sequence being played.
    pub fn playing(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pad::{default_pads, PadConfig};
    use crate::sound::testing::{Recording, RecordingEngine};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Rig {
        player: SequencePlayer,
        dispatcher: TriggerDispatcher,
        scheduler: Scheduler<TimerAction>,
        state: Rc<RefCell<Recording>>,
    }

    impl Rig {
        fn new() -> Self {
            let pads = vec![PadConfig::new("Kick"), PadConfig::new("Snare")];
            let (engine, state) = RecordingEngine::new();
            Self {
                player: SequencePlayer::new(),
                dispatcher: TriggerDispatcher::new(&pads, Box::new(engine)),
                scheduler: Scheduler::new(),
                state,
            }
        }

        fn play(&mut self, sequence: &Sequence) -> bool {
            self.player.play(sequence, &mut self.scheduler)
        }

        fn stop(&mut self) -> bool {
            self.player.stop(&mut self.scheduler)
        }

        fn run_until(&mut self, until: Millis) {
            while let Some(fired) = self.scheduler.pop_due(until) {
                match fired.action {
                    TimerAction::SequenceStep { pad, progress } => self.player.on_step(
                        &pad,
                        progress,
                        &mut self.dispatcher,
                        &mut self.scheduler,
                    ),
                    TimerAction::SequenceEnd => self.player.on_end(&mut self.scheduler),
                    TimerAction::ProgressReset => self.player.on_progress_reset(fired.handle),
                    TimerAction::PulseClear(pad) => self.dispatcher.clear_pulse(&pad, fired.handle),
                    TimerAction::RepeatTick(_) => {}
                }
            }
            self.scheduler.advance_to(until);
        }

        fn triggers(&self) -> Vec<String> {
            self.state.borrow().triggers.clone()
        }
    }

    fn kick_snare() -> Sequence {
        Sequence::new("Test", 2000)
            .with_event(0, "Kick")
            .with_event(1000, "Snare")
            .with_end_grace(1000)
    }

    #[test]
    fn test_progress_at() {
        assert_eq!(progress_at(0, 15_000), 0);
        assert_eq!(progress_at(7_499, 15_000), 49);
        assert_eq!(progress_at(7_500, 15_000), 50);
        assert_eq!(progress_at(15_000, 15_000), 100);
        assert_eq!(progress_at(20_000, 15_000), 100);
        assert_eq!(progress_at(0, 0), 100);
    }

    #[test]
    fn test_kick_snare_playback() {
        let mut rig = Rig::new();
        assert!(rig.play(&kick_snare()));
        assert!(rig.player.is_playing());
        assert_eq!(rig.player.progress(), 0);

        rig.run_until(0);
        assert_eq!(rig.triggers(), vec!["Kick"]);
        assert_eq!(rig.player.progress(), 0);

        rig.run_until(999);
        assert_eq!(rig.triggers().len(), 1);
        rig.run_until(1000);
        assert_eq!(rig.triggers(), vec!["Kick", "Snare"]);
        assert_eq!(rig.player.progress(), 50);

        rig.run_until(1999);
        assert!(rig.player.is_playing());
        rig.run_until(2000);
        assert!(!rig.player.is_playing());
        assert_eq!(rig.player.progress(), 100);

        rig.run_until(2999);
        assert_eq!(rig.player.progress(), 100);
        rig.run_until(3000);
        assert_eq!(rig.player.progress(), 0);
        assert_eq!(rig.scheduler.pending_count(), 0);
    }

    #[test]
    fn test_stop_cancels_remaining_events() {
        let mut rig = Rig::new();
        rig.play(&kick_snare());
        rig.run_until(500);
        assert!(rig.stop());
        assert!(!rig.player.is_playing());
        assert_eq!(rig.player.progress(), 0);

        rig.run_until(10_000);
        assert_eq!(rig.triggers(), vec!["Kick"]);
        assert_eq!(rig.player.progress(), 0);
        // Only the kick's pulse clear was left, and it has fired.
        assert_eq!(rig.scheduler.pending_count(), 0);
    }

    #[test]
    fn test_stop_at_any_instant() {
        let stops = (0..=2100).step_by(7).chain([1, 999, 1000, 1001, 1999, 2000, 2001, 3000]);
        for t in stops {
            let mut rig = Rig::new();
            rig.play(&kick_snare());
            rig.run_until(t);
            let fired = rig.triggers();
            assert_eq!(fired.len(), if t >= 1000 { 2 } else { 1 }, "at {}ms", t);

            assert_eq!(rig.stop(), t < 2000, "stop at {}ms", t);
            assert!(!rig.player.is_playing());
            assert_eq!(rig.player.progress(), 0, "progress after stop at {}ms", t);

            rig.run_until(10_000);
            assert_eq!(rig.triggers(), fired, "dispatch after stop at {}ms", t);
            assert_eq!(rig.player.progress(), 0);
            assert_eq!(rig.scheduler.pending_count(), 0);
        }
    }

    #[test]
    fn test_stop_when_idle() {
        let mut rig = Rig::new();
        assert!(!rig.stop());
        assert_eq!(rig.player.progress(), 0);
    }

    #[test]
    fn test_play_while_playing_is_ignored() {
        let mut rig = Rig::new();
        rig.play(&kick_snare());
        rig.run_until(300);
        let before = rig.scheduler.deadlines();
        assert!(!rig.play(&kick_snare()));
        assert_eq!(rig.scheduler.deadlines(), before);

        rig.run_until(5000);
        assert_eq!(rig.triggers(), vec!["Kick", "Snare"]);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut rig = Rig::new();
        let sequence = Sequence::new("Shuffled", 1000)
            .with_event(900, "Kick")
            .with_event(100, "Snare")
            .with_event(500, "Kick");
        rig.play(&sequence);

        let mut last = 0;
        for t in 0..=1000 {
            rig.run_until(t);
            let progress = rig.player.progress();
            assert!(progress >= last, "progress fell from {} to {} at {}ms", last, progress, t);
            last = progress;
        }
        assert_eq!(last, 100);
        assert_eq!(rig.triggers(), vec!["Snare", "Kick", "Kick"]);
    }

    #[test]
    fn test_same_offset_keeps_list_order() {
        let mut rig = Rig::new();
        let sequence = Sequence::new("Chord", 100)
            .with_event(0, "Snare")
            .with_event(0, "Kick");
        rig.play(&sequence);
        rig.run_until(0);
        assert_eq!(rig.triggers(), vec!["Snare", "Kick"]);
    }

    #[test]
    fn test_events_past_end_never_fire() {
        let mut rig = Rig::new();
        let sequence = Sequence::new("Short", 1000)
            .with_event(1000, "Kick")
            .with_event(1500, "Snare");
        rig.play(&sequence);
        rig.run_until(5000);
        // An event exactly at the end still fires before completion.
        assert_eq!(rig.triggers(), vec!["Kick"]);
    }

    #[test]
    fn test_replay_during_grace_cancels_reset() {
        let mut rig = Rig::new();
        rig.play(&kick_snare());
        rig.run_until(2500);
        assert_eq!(rig.player.progress(), 100);

        assert!(rig.play(&kick_snare()));
        assert_eq!(rig.player.progress(), 0);
        // The old grace reset would have fired at 3000.
        rig.run_until(3600);
        assert_eq!(rig.player.progress(), 50);
        assert!(rig.player.is_playing());
        rig.run_until(4500);
        assert_eq!(rig.player.progress(), 100);
        rig.run_until(5500);
        assert_eq!(rig.player.progress(), 0);
    }

    #[test]
    fn test_zero_length_sequence() {
        let mut rig = Rig::new();
        let sequence = Sequence::new("Blip", 0).with_event(0, "Kick").with_end_grace(0);
        rig.play(&sequence);
        rig.run_until(0);
        assert_eq!(rig.triggers(), vec!["Kick"]);
        assert!(!rig.player.is_playing());
        assert_eq!(rig.player.progress(), 0);
    }

    #[test]
    fn test_demo_uses_default_pads() {
        let demo = Sequence::demo();
        let pads = default_pads();
        assert_eq!(demo.total_duration_ms, 15_000);
        assert_eq!(demo.events.len(), 171);
        assert!(demo.events.iter().all(|e| e.offset_ms < demo.total_duration_ms));
        assert!(demo
            .events
            .iter()
            .all(|e| pads.iter().any(|p| p.id == e.pad)));
    }
}
