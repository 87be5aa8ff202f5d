//! Error types for beatpad-core

use thiserror::Error;

/// Result type alias for beatpad-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in beatpad-core
///
/// Scheduling operations never return these. They come from configuration
/// validation and from sound engine implementations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid surface or pad configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sound has not finished loading (or the engine was never warmed up)
    #[error("Sound '{0}' is not ready")]
    NotReady(String),

    /// The engine has no sound with this id
    #[error("Unknown sound '{0}'")]
    UnknownSound(String),

    /// Sound engine failure while triggering or warming up
    #[error("Sound engine error: {0}")]
    Sound(String),

    /// Engine or surface used after teardown
    #[error("Used after dispose")]
    Disposed,
}
