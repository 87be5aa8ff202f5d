//! Sound engine boundary.
//!
//! The scheduler never looks inside a sound engine. It asks whether a sound
//! is ready, hands over the pad's [`Articulation`], and moves on.

use crate::error::{Error, Result};
use crate::pad::Articulation;
use std::collections::HashSet;

/// Capability that turns trigger requests into sound.
pub trait SoundEngine {
    /// Human-readable name for status displays and logs.
    fn name(&self) -> &str;

    /// Prepare the engine. Called once by the host before the first trigger.
    fn warm_up(&mut self) -> Result<()>;

    /// Whether `sound` can be triggered right now.
    fn is_ready(&self, sound: &str) -> bool;

    /// Play `sound` with the given articulation.
    fn trigger(&mut self, sound: &str, articulation: &Articulation) -> Result<()>;

    /// Periodic housekeeping (releasing notes, flushing queues).
    fn service(&mut self) {}

    /// Release every resource. Further triggers must fail or be ignored.
    fn dispose(&mut self);
}

/// Engine that only logs what it would play.
///
/// Every sound is ready once the engine is warmed up, unless it was marked
/// as still loading with [`LogSoundEngine::with_loading`].
#[derive(Debug, Default)]
pub struct LogSoundEngine {
    warm: bool,
    disposed: bool,
    loading: HashSet<String>,
    triggered: u64,
}

impl LogSoundEngine {
    /// Create a cold engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a sound as not loaded yet.
    pub fn with_loading(mut self, sound: impl Into<String>) -> Self {
        self.loading.insert(sound.into());
        self
    }

    /// Finish loading a sound.
    pub fn finish_loading(&mut self, sound: &str) {
        self.loading.remove(sound);
    }

    /// Number of triggers played so far.
    pub fn triggered(&self) -> u64 {
        self.triggered
    }
}

impl SoundEngine for LogSoundEngine {
    fn name(&self) -> &str {
        "log"
    }

    fn warm_up(&mut self) -> Result<()> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        self.warm = true;
        log::info!("Log sound engine ready");
        Ok(())
    }

    fn is_ready(&self, sound: &str) -> bool {
        self.warm && !self.disposed && !self.loading.contains(sound)
    }

    fn trigger(&mut self, sound: &str, articulation: &Articulation) -> Result<()> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        if !self.is_ready(sound) {
            return Err(Error::NotReady(sound.to_string()));
        }
        self.triggered += 1;
        log::info!(
            "Trigger {} notes={:?} length={}",
            sound,
            articulation.notes,
            articulation.length.as_deref().unwrap_or("-")
        );
        Ok(())
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.warm = false;
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_engine_requires_warm_up() {
        let mut engine = LogSoundEngine::new();
        assert!(!engine.is_ready("Kick"));
        assert!(matches!(
            engine.trigger("Kick", &Articulation::default()),
            Err(Error::NotReady(_))
        ));

        engine.warm_up().unwrap();
        assert!(engine.is_ready("Kick"));
        engine.trigger("Kick", &Articulation::note("C1", "8n")).unwrap();
        assert_eq!(engine.triggered(), 1);
    }

    #[test]
    fn test_log_engine_loading_sound() {
        let mut engine = LogSoundEngine::new().with_loading("Vocal");
        engine.warm_up().unwrap();
        assert!(!engine.is_ready("Vocal"));
        assert!(engine.is_ready("Kick"));
        engine.finish_loading("Vocal");
        assert!(engine.is_ready("Vocal"));
    }

    #[test]
    fn test_log_engine_dispose() {
        let mut engine = LogSoundEngine::new();
        engine.warm_up().unwrap();
        engine.dispose();
        assert!(!engine.is_ready("Kick"));
        assert!(matches!(
            engine.trigger("Kick", &Articulation::default()),
            Err(Error::Disposed)
        ));
        assert!(matches!(engine.warm_up(), Err(Error::Disposed)));
    }
}
