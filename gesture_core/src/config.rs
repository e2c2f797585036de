//! Gesture thresholds.
//!
//! Every cutoff used by the extractor, classifier and debouncer lives here so
//! the state machine can be driven with synthetic inputs in tests and tuned
//! from the `[gestures]` section of the player's config file.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Thresholds for recognition and debouncing.
///
/// Distances are in normalized image units (0.0–1.0 of frame width/height),
/// velocities in normalized units per second, times in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Frames below this detection confidence are dropped as malformed.
    pub min_confidence: f32,

    // ── OK / pinch ───────────────────────────────────────────────────────
    /// Thumb-tip to index-tip span below which the hand may be an OK sign.
    pub ok_distance_threshold: f32,
    /// How far (in y) a fingertip must sit above its PIP joint to count as
    /// extended.  Curled is the mirror condition.
    pub finger_extension_margin: f32,
    /// Pinch span mapped to volume 0.0.
    pub pinch_band_min: f32,
    /// Pinch span mapped to volume 1.0.
    pub pinch_band_max: f32,
    /// Require middle/ring/pinky curled and index extended for PINCH.
    pub pinch_requires_curled_fingers: bool,

    // ── wave ─────────────────────────────────────────────────────────────
    /// Minimum horizontal wrist speed for a wave.
    pub wave_velocity_threshold: f32,
    /// Minimum horizontal wrist travel inside the window for a wave.
    pub wave_min_displacement: f32,
    /// Length of the rolling wrist history.
    pub wave_window_ms: u64,

    // ── debouncing ───────────────────────────────────────────────────────
    /// Consecutive identical samples needed to confirm a discrete gesture.
    pub confirm_frame_count: u32,
    /// Additional minimum hold time before confirmation (0 disables).
    pub min_dwell_ms: u64,
    /// Quiet period after a discrete event.
    pub cooldown_ms: u64,
    /// An armed gesture with no sample for this long falls back to idle.
    pub armed_timeout_ms: u64,
    /// Lookback of the per-hand sample window.
    pub sample_window_ms: u64,
    /// Minimum spacing of SET_VOLUME events (0 = every frame).
    pub volume_throttle_ms: u64,
    /// Apply the discrete cooldown across both hands and all discrete kinds.
    pub global_discrete_cooldown: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        GestureConfig {
            min_confidence:                0.5,
            ok_distance_threshold:         0.05,
            finger_extension_margin:       0.01,
            pinch_band_min:                0.05,
            pinch_band_max:                0.35,
            pinch_requires_curled_fingers: true,
            wave_velocity_threshold:       0.6,
            wave_min_displacement:         0.08,
            wave_window_ms:                400,
            confirm_frame_count:           3,
            min_dwell_ms:                  0,
            cooldown_ms:                   1000,
            armed_timeout_ms:              500,
            sample_window_ms:              1500,
            volume_throttle_ms:            0,
            global_discrete_cooldown:      true,
        }
    }
}

impl GestureConfig {
    /// Check that the thresholds describe a usable recogniser.
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("min_confidence", self.min_confidence)?;
        positive("ok_distance_threshold", self.ok_distance_threshold)?;
        non_negative("finger_extension_margin", self.finger_extension_margin)?;
        positive("wave_velocity_threshold", self.wave_velocity_threshold)?;
        non_negative("wave_min_displacement", self.wave_min_displacement)?;

        if !(self.pinch_band_min < self.pinch_band_max) || self.pinch_band_min < 0.0 {
            return Err(ConfigError::PinchBand {
                min: self.pinch_band_min,
                max: self.pinch_band_max,
            });
        }
        if self.ok_distance_threshold > self.pinch_band_min {
            return Err(ConfigError::OkOverlapsPinch {
                ok:       self.ok_distance_threshold,
                band_min: self.pinch_band_min,
            });
        }
        if self.confirm_frame_count == 0 {
            return Err(ConfigError::OutOfRange {
                field: "confirm_frame_count", requirement: "at least 1", value: 0.0,
            });
        }
        if self.wave_window_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "wave_window_ms", requirement: "greater than 0", value: 0.0,
            });
        }
        if self.sample_window_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "sample_window_ms", requirement: "greater than 0", value: 0.0,
            });
        }
        Ok(())
    }
}

fn unit_interval(field: &'static str, v: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, requirement: "within [0, 1]", value: v as f64 })
    }
}

fn positive(field: &'static str, v: f32) -> Result<(), ConfigError> {
    if v > 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, requirement: "positive", value: v as f64 })
    }
}

fn non_negative(field: &'static str, v: f32) -> Result<(), ConfigError> {
    if v >= 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, requirement: "non-negative", value: v as f64 })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
