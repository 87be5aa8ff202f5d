//! Timer payloads routed by the [`PadSurface`](crate::surface::PadSurface).

use crate::pad::PadId;

/// What to do when a surface timer fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimerAction {
    /// Next tick of a held pad.
    RepeatTick(PadId),
    /// End of a pad's active pulse.
    PulseClear(PadId),
    /// One sequence event: dispatch `pad` and raise progress to `progress`.
    SequenceStep { pad: PadId, progress: u8 },
    /// The sequence reached its total duration.
    SequenceEnd,
    /// Grace period after completion elapsed; progress drops back to 0.
    ProgressReset,
}
