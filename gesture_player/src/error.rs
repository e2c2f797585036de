//! Error types for the player binary.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use gesture_core::{ConfigError, PlaylistError};

/// Anything that stops the player before the frame loop starts.
/// `main` reports it and exits with status 1.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("hand tracker: {0}")]
    Tracker(String),

    #[error("audio output: {0}")]
    Audio(String),

    #[error("overlay window: {0}")]
    Window(String),

    #[error("gesture thresholds: {0}")]
    Config(#[from] ConfigError),

    #[error("playlist: {0}")]
    Playlist(#[from] PlaylistError),

    #[error("cannot open replay file {path:?}: {source}")]
    Replay {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("source `{0}` is not available in this build")]
    Unsupported(&'static str),
}

/// Failure while acquiring one frame.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The stream itself broke; the loop stops.
    #[error("landmark stream read failed: {0}")]
    Io(#[from] io::Error),

    /// The tracker process went away.
    #[error("hand tracker exited")]
    Disconnected,
}
