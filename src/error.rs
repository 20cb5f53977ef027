use std::path::PathBuf;

use thiserror::Error;

/// Conditions a session recovers from locally by showing an overlay.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The playlist was empty when a video had to be picked.
    #[error("no videos are configured")]
    EmptyPlaylist,

    /// Too many picks in a row failed to start.
    #[error("playback stalled after {0} consecutive failures")]
    PlaybackStalled(u32),
}

/// Preference store failures.
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("failed to read preferences at {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse preferences at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write preferences at {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Encode(#[from] serde_yaml::Error),
}
