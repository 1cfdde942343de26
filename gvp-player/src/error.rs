//! Error types for gvp-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for gvp-player
#[derive(Error, Debug)]
pub enum Error {
    /// Errors from the shared crate (config, scene document, I/O)
    #[error(transparent)]
    Common(#[from] gvp_common::Error),

    /// Scene set cannot be scheduled (zero playable clips, bad scene index)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Clip or soundtrack not found
    #[error("Asset missing: {0}")]
    AssetMissing(String),

    /// Decoder could not prepare a clip
    #[error("Prepare failed for '{clip}' after {attempts} attempt(s)")]
    PrepareFailed { clip: String, attempts: u32 },

    /// Every clip of the running scene has been skipped
    #[error("Scene '{0}' has no playable clips left")]
    NoPlayableClips(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// True for errors that must stop the installation before (or instead of) playback
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Configuration(_) => true,
            Error::Common(inner) => matches!(
                inner,
                gvp_common::Error::Config(_)
                    | gvp_common::Error::Json(_)
                    | gvp_common::Error::Toml(_)
                    | gvp_common::Error::Io(_)
            ),
            Error::AssetMissing(_)
            | Error::PrepareFailed { .. }
            | Error::NoPlayableClips(_)
            | Error::InvalidState(_) => false,
        }
    }
}

/// Convenience Result type using gvp-player Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Configuration("x".into()).is_fatal());
        assert!(Error::Common(gvp_common::Error::Config("x".into())).is_fatal());
        assert!(!Error::Common(gvp_common::Error::NotFound("x".into())).is_fatal());
        assert!(!Error::AssetMissing("clip".into()).is_fatal());
        assert!(!Error::NoPlayableClips("scene".into()).is_fatal());
        assert!(!Error::PrepareFailed {
            clip: "a".into(),
            attempts: 2
        }
        .is_fatal());
    }

    #[test]
    fn test_messages() {
        let err = Error::PrepareFailed {
            clip: "clips/a".into(),
            attempts: 2,
        };
        assert_eq!(err.to_string(), "Prepare failed for 'clips/a' after 2 attempt(s)");

        let err: Error = gvp_common::Error::Config("bad".into()).into();
        assert_eq!(err.to_string(), "Configuration error: bad");
    }
}
