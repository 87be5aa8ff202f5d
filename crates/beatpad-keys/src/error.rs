//! Error types for beatpad-keys

use thiserror::Error;

/// Result type alias for beatpad-keys operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in beatpad-keys
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// MIDI port connection error
    #[error("MIDI error: {0}")]
    Midi(String),

    /// JACK connection error
    #[cfg(feature = "jack")]
    #[error("JACK error: {0}")]
    Jack(#[from] jack::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Pad surface error
    #[error(transparent)]
    Core(#[from] beatpad_core::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::Midi("cannot connect beatpad:midi_out -> a2j:Hydrogen".to_string());
        assert_eq!(
            err.to_string(),
            "MIDI error: cannot connect beatpad:midi_out -> a2j:Hydrogen"
        );

        let core = beatpad_core::Error::Disposed;
        let expected = core.to_string();
        let err: Error = core.into();
        assert!(matches!(err, Error::Core(_)));
        assert_eq!(err.to_string(), expected);
    }
}
