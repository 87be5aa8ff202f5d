//! Repeat engine for held pads.
//!
//! Each pad is either idle or repeating. Holding a pad dispatches it once
//! right away and then once per repeat interval until it is released. The
//! interval is driven by single-shot timers that re-arm on every tick, so
//! there is exactly one pending timer per held pad and releasing the pad
//! cancels it.

use crate::action::TimerAction;
use crate::dispatcher::{DispatchOptions, TriggerDispatcher};
use crate::pad::{PadConfig, PadId, DEFAULT_REPEAT_MS};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::timing::Millis;
use std::collections::HashMap;

/// Per-pad repeat intervals with a fallback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepeatRates {
    rates: HashMap<PadId, Millis>,
    default_ms: Millis,
}

impl Default for RepeatRates {
    fn default() -> Self {
        Self::new(DEFAULT_REPEAT_MS)
    }
}

impl RepeatRates {
    /// Empty table with the given fallback. A zero fallback becomes 1 ms.
    pub fn new(default_ms: Millis) -> Self {
        Self {
            rates: HashMap::new(),
            default_ms: default_ms.max(1),
        }
    }

    /// Collect the rates configured in a pad table.
    pub fn from_pads(pads: &[PadConfig], default_ms: Millis) -> Self {
        let mut rates = Self::new(default_ms);
        for pad in pads {
            if let Some(rate) = pad.repeat_ms {
                rates.set(pad.id.clone(), rate);
            }
        }
        rates
    }

    /// Set the interval for one pad. Zero becomes 1 ms.
    pub fn set(&mut self, pad: PadId, rate_ms: Millis) {
        self.rates.insert(pad, rate_ms.max(1));
    }

    /// Interval for `pad`.
    pub fn rate(&self, pad: &PadId) -> Millis {
        self.rates.get(pad).copied().unwrap_or(self.default_ms)
    }
}

/// Tracks which pads are held and keeps their repeat timers alive.
#[derive(Debug, Default)]
pub struct RepeatEngine {
    rates: RepeatRates,
    /// Pending tick per repeating pad. Presence means Repeating.
    holds: HashMap<PadId, TimerHandle>,
}

impl RepeatEngine {
    /// Create an engine with the given rates.
    pub fn new(rates: RepeatRates) -> Self {
        Self {
            rates,
            holds: HashMap::new(),
        }
    }

    /// Start repeating `pad`.
    ///
    /// Returns `false` (and does nothing) if the pad is already repeating.
    pub fn start_hold(
        &mut self,
        pad: &PadId,
        dispatcher: &mut TriggerDispatcher,
        scheduler: &mut Scheduler<TimerAction>,
    ) -> bool {
        if self.holds.contains_key(pad) {
            log::trace!("[REPEAT] '{}' already held", pad);
            return false;
        }
        log::debug!("[REPEAT] hold '{}' every {}ms", pad, self.rates.rate(pad));
        self.arm(pad, scheduler);
        dispatcher.dispatch(pad, DispatchOptions::direct(), scheduler);
        true
    }

    /// Stop repeating `pad`.
    ///
    /// Returns `false` if the pad was not repeating.
    pub fn stop_hold(&mut self, pad: &PadId, scheduler: &mut Scheduler<TimerAction>) -> bool {
        match self.holds.remove(pad) {
            Some(tick) => {
                scheduler.cancel(tick);
                log::debug!("[REPEAT] release '{}'", pad);
                true
            }
            None => false,
        }
    }

    /// Handle a fired [`TimerAction::RepeatTick`]: dispatch and re-arm.
    pub fn on_tick(
        &mut self,
        pad: &PadId,
        handle: TimerHandle,
        dispatcher: &mut TriggerDispatcher,
        scheduler: &mut Scheduler<TimerAction>,
    ) {
        if self.holds.get(pad) != Some(&handle) {
            return;
        }
        self.arm(pad, scheduler);
        dispatcher.dispatch(pad, DispatchOptions::direct(), scheduler);
    }

    /// Release every held pad. Returns the released pads.
    pub fn stop_all(&mut self, scheduler: &mut Scheduler<TimerAction>) -> Vec<PadId> {
        let mut released = Vec::with_capacity(self.holds.len());
        for (pad, tick) in self.holds.drain() {
            scheduler.cancel(tick);
            released.push(pad);
        }
        released.sort();
        released
    }

    /// Whether `pad` is repeating.
    pub fn is_repeating(&self, pad: &PadId) -> bool {
        self.holds.contains_key(pad)
    }

    /// Number of repeating pads.
    pub fn held_count(&self) -> usize {
        self.holds.len()
    }

    /// The repeat rate table.
    pub fn rates(&self) -> &RepeatRates {
        &self.rates
    }

    /// Schedule the next tick, replacing any previous one.
    fn arm(&mut self, pad: &PadId, scheduler: &mut Scheduler<TimerAction>) {
        let tick = scheduler.after(self.rates.rate(pad), TimerAction::RepeatTick(pad.clone()));
        if let Some(previous) = self.holds.insert(pad.clone(), tick) {
            scheduler.cancel(previous);
        }
    }
}
