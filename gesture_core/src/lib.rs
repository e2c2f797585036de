//! # gesture_core
//!
//! Hand-landmark gesture recognition for a hands-free music player: per-frame
//! geometry, rule-based classification, temporal debouncing and dispatch of
//! the resulting commands to a playback backend.
//!
//! ## Gesture → Action mapping
//!
//! | Gesture | Hand | Action |
//! |---|---|---|
//! | Wave (wrist sweeps left) | Right | Next track (wraps to the first) |
//! | Wave (wrist sweeps right) | Left | Previous track (wraps to the last) |
//! | OK sign (thumb and index touching) | Either | Toggle play / pause |
//! | Pinch (thumb-index span) | Right | Volume, continuously while held |
//!
//! ## Data flow
//!
//! ```text
//! FrameSet ─▶ GeometryExtractor ─▶ GestureClassifier ─▶ Debouncer ─▶ ControlDispatcher
//!             (per-hand wrist        (pure, one sample    (per-hand      (PlaybackSession,
//!              history)               per hand)            arena)         services)
//! ```
//!
//! [`pipeline::GesturePipeline`] runs the first three stages for one frame;
//! the caller feeds its events to [`dispatcher::ControlDispatcher`].
//! Everything here is synchronous and single-threaded: one frame is fully
//! processed before the next is accepted.

pub mod classifier;
pub mod config;
pub mod debounce;
pub mod dispatcher;
pub mod error;
pub mod geometry;
pub mod landmark;
pub mod pipeline;
pub mod playlist;
pub mod poses;

#[cfg(test)]
mod scenario_tests;

pub use classifier::{GestureClassifier, GestureLabel, GestureSample};
pub use config::GestureConfig;
pub use debounce::{Debouncer, EventKind, GestureEvent};
pub use dispatcher::{ControlDispatcher, DispatchOutcome, PlaybackService, PlaybackSession, VolumeService};
pub use error::{ConfigError, FrameError, GestureError, PlaylistError, ServiceError, ServiceKind};
pub use landmark::{FrameSet, HandFrame, Handedness, LandmarkPoint, LANDMARK_COUNT};
pub use pipeline::{FrameOutput, GesturePipeline};
pub use playlist::{Playlist, PlaylistOrder};
