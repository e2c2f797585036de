//! Per-frame gesture classification.
//!
//! [`GestureClassifier::classify`] is a pure function of one [`FeatureSet`]:
//! all temporal context it needs (the wrist motion over the wave window) is
//! already folded into the features by the geometry extractor.  Classifying
//! the same features twice therefore always yields the same sample.
//!
//! Rules, per hand:
//!
//! | Order | Condition | Label |
//! |---|---|---|
//! | 0 | wrist travelled ≥ `wave_min_displacement` inside the window | motion: OK/PINCH suppressed |
//! | 1 | motion fast enough, right hand moving left | `WaveLeft` |
//! | 1 | motion fast enough, left hand moving right | `WaveRight` |
//! | 2 | span < `ok_distance_threshold`, middle/ring/pinky extended | `Ok` |
//! | 3 | right hand, span inside the pinch band (pose-gated) | `Pinch` |
//! | 4 | otherwise | `None` |

use std::fmt;

use crate::config::GestureConfig;
use crate::geometry::{FeatureSet, FingerState};
use crate::landmark::Handedness;

// ════════════════════════════════════════════════════════════════════════════
// GestureLabel / GestureSample
// ════════════════════════════════════════════════════════════════════════════

/// Single label assigned to one hand in one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GestureLabel {
    None,
    /// Right hand sweeping leftward → next track.
    WaveLeft,
    /// Left hand sweeping rightward → previous track.
    WaveRight,
    /// Thumb and index touching, other fingers up → play/pause.
    Ok,
    /// Thumb/index span inside the volume band → volume.
    Pinch,
}

impl GestureLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            GestureLabel::None      => "none",
            GestureLabel::WaveLeft  => "wave-left",
            GestureLabel::WaveRight => "wave-right",
            GestureLabel::Ok        => "ok",
            GestureLabel::Pinch     => "pinch",
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classifier's output for one hand in one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureSample {
    pub handedness:   Handedness,
    pub label:        GestureLabel,
    pub timestamp_ms: u64,
    /// 0.0–1.0.  For `Pinch` this is the mapped volume level.
    pub strength:     f32,
}

impl GestureSample {
    pub fn none(handedness: Handedness, timestamp_ms: u64) -> Self {
        GestureSample { handedness, label: GestureLabel::None, timestamp_ms, strength: 0.0 }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Volume mapping
// ════════════════════════════════════════════════════════════════════════════

/// Map a pinch span onto a volume level: linear across the band, clamped to
/// [0, 1] outside it.  Non-decreasing in `span`.
pub fn volume_level(span: f32, band_min: f32, band_max: f32) -> f32 {
    if !span.is_finite() || band_max <= band_min {
        return 0.0;
    }
    ((span - band_min) / (band_max - band_min)).clamp(0.0, 1.0)
}

// ════════════════════════════════════════════════════════════════════════════
// GestureClassifier
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction { Leftward, Rightward }

/// Stateless rule-based classifier.
#[derive(Clone, Debug)]
pub struct GestureClassifier {
    config: GestureConfig,
}

impl GestureClassifier {
    pub fn new(config: &GestureConfig) -> Self {
        GestureClassifier { config: config.clone() }
    }

    pub fn classify(&self, fs: &FeatureSet) -> GestureSample {
        let cfg = &self.config;
        let sample = |label, strength: f32| GestureSample {
            handedness:   fs.handedness,
            label,
            timestamp_ms: fs.timestamp_ms,
            strength:     strength.clamp(0.0, 1.0),
        };

        // ── wave / motion ─────────────────────────────────────────────────
        let m = fs.motion;
        if m.displacement_x.abs() >= cfg.wave_min_displacement && m.samples >= 2 {
            if m.velocity_x.abs() >= cfg.wave_velocity_threshold {
                let dir = if m.displacement_x < 0.0 { Direction::Leftward } else { Direction::Rightward };
                let strength = m.velocity_x.abs() / (2.0 * cfg.wave_velocity_threshold);
                return match (fs.handedness, dir) {
                    (Handedness::Right, Direction::Leftward)  => sample(GestureLabel::WaveLeft,  strength),
                    (Handedness::Left,  Direction::Rightward) => sample(GestureLabel::WaveRight, strength),
                    _ => sample(GestureLabel::None, 0.0),
                };
            }
            // Hand still travelling through the window: no static poses yet.
            return sample(GestureLabel::None, 0.0);
        }

        // ── OK ────────────────────────────────────────────────────────────
        if fs.pinch_span < cfg.ok_distance_threshold && fs.fingers.others_extended() {
            return sample(GestureLabel::Ok, 1.0 - fs.pinch_span / cfg.ok_distance_threshold);
        }

        // ── pinch (right hand only) ───────────────────────────────────────
        if fs.handedness == Handedness::Right
            && fs.pinch_span >= cfg.pinch_band_min
            && fs.pinch_span <= cfg.pinch_band_max
        {
            let posed = !cfg.pinch_requires_curled_fingers
                || (fs.fingers.index == FingerState::Extended && fs.fingers.others_curled());
            if posed {
                let level = volume_level(fs.pinch_span, cfg.pinch_band_min, cfg.pinch_band_max);
                return sample(GestureLabel::Pinch, level);
            }
        }

        sample(GestureLabel::None, 0.0)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
