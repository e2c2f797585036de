//! Error types for the gesture core.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a hand frame was rejected by the geometry extractor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("expected {expected} landmarks, got {found}")]
    LandmarkCount { expected: usize, found: usize },

    #[error("detection confidence {confidence:.2} below minimum {minimum:.2}")]
    LowConfidence { confidence: f32, minimum: f32 },

    #[error("landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },
}

/// Per-frame faults.  Always contained: the frame is dropped and the
/// pipeline carries on with the next one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GestureError {
    #[error("malformed {hand} hand frame: {source}")]
    MalformedFrame {
        hand: &'static str,
        #[source]
        source: FrameError,
    },
}

/// The external collaborator a [`ServiceError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Playback,
    Volume,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Playback => f.write_str("playback"),
            ServiceKind::Volume   => f.write_str("volume"),
        }
    }
}

/// A playback or volume call failed.  Logged by the dispatcher; never fatal.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{service} service failed: {message}")]
pub struct ServiceError {
    pub service: ServiceKind,
    pub message: String,
}

impl ServiceError {
    pub fn playback(message: impl Into<String>) -> Self {
        ServiceError { service: ServiceKind::Playback, message: message.into() }
    }

    pub fn volume(message: impl Into<String>) -> Self {
        ServiceError { service: ServiceKind::Volume, message: message.into() }
    }
}

/// Inconsistent gesture thresholds.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("`{field}` must be {requirement} (got {value})")]
    OutOfRange { field: &'static str, requirement: &'static str, value: f64 },

    #[error("pinch band [{min}, {max}] is empty or inverted")]
    PinchBand { min: f32, max: f32 },

    #[error("ok_distance_threshold {ok} reaches into the pinch band starting at {band_min}")]
    OkOverlapsPinch { ok: f32, band_min: f32 },
}

/// Playlist directory could not be enumerated.
#[derive(Debug, Error)]
#[error("cannot read playlist directory {dir:?}: {source}")]
pub struct PlaylistError {
    pub dir: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_frame_message_names_hand_and_cause() {
        let e = GestureError::MalformedFrame {
            hand:   "left",
            source: FrameError::LandmarkCount { expected: 21, found: 5 },
        };
        let msg = e.to_string();
        assert!(msg.contains("left"));
        assert!(msg.contains("expected 21 landmarks, got 5"));
    }

    #[test]
    fn service_error_display() {
        assert_eq!(
            ServiceError::volume("device gone").to_string(),
            "volume service failed: device gone"
        );
    }
}
