//! Geometry extraction: raw landmarks → gesture features.
//!
//! The extractor is a pure function of the current [`HandFrame`] plus one
//! rolling wrist history per hand.  The histories live in a fixed two-slot
//! arena indexed by [`Handedness`] and each one is a fixed-capacity ring, so
//! nothing is allocated per frame.

use crate::config::GestureConfig;
use crate::error::{FrameError, GestureError};
use crate::landmark::{idx, HandFrame, Handedness, LandmarkPoint, LANDMARK_COUNT};

/// Maximum wrist samples retained per hand (≈1 s at 30 fps).
pub const HISTORY_CAPACITY: usize = 32;

// ════════════════════════════════════════════════════════════════════════════
// Finger state
// ════════════════════════════════════════════════════════════════════════════

/// Extension of one finger, judged by fingertip height against its PIP joint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FingerState {
    Extended,
    Curled,
    /// Tip and PIP within the margin of each other.
    Neutral,
}

/// Extension flags for the four non-thumb fingers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FingerFlags {
    pub index:  FingerState,
    pub middle: FingerState,
    pub ring:   FingerState,
    pub pinky:  FingerState,
}

impl FingerFlags {
    /// Middle, ring and pinky all extended (the "three up" of an OK sign).
    pub fn others_extended(&self) -> bool {
        [self.middle, self.ring, self.pinky].iter().all(|f| *f == FingerState::Extended)
    }

    /// Middle, ring and pinky all curled.
    pub fn others_curled(&self) -> bool {
        [self.middle, self.ring, self.pinky].iter().all(|f| *f == FingerState::Curled)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Wrist motion
// ════════════════════════════════════════════════════════════════════════════

/// Horizontal wrist motion over the rolling window.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WristMotion {
    /// Newest minus oldest wrist x inside the window (negative = leftward).
    pub displacement_x: f32,
    /// `displacement_x` per second of window span.
    pub velocity_x: f32,
    /// Time between oldest and newest retained sample.
    pub span_ms: u64,
    /// Samples currently retained.
    pub samples: usize,
}

#[derive(Clone, Copy, Debug, Default)]
struct WristSample {
    t_ms: u64,
    x:    f32,
}

/// Fixed-capacity ring of recent wrist positions for one hand.
#[derive(Clone, Debug)]
pub struct WristHistory {
    buf:  [WristSample; HISTORY_CAPACITY],
    head: usize, // index of the oldest sample
    len:  usize,
}

impl Default for WristHistory {
    fn default() -> Self {
        WristHistory { buf: [WristSample::default(); HISTORY_CAPACITY], head: 0, len: 0 }
    }
}

impl WristHistory {
    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len  = 0;
    }

    fn at(&self, i: usize) -> &WristSample {
        &self.buf[(self.head + i) % HISTORY_CAPACITY]
    }

    fn oldest(&self) -> Option<&WristSample> {
        (self.len > 0).then(|| self.at(0))
    }

    fn newest(&self) -> Option<&WristSample> {
        (self.len > 0).then(|| self.at(self.len - 1))
    }

    fn pop_oldest(&mut self) {
        if self.len > 0 {
            self.head = (self.head + 1) % HISTORY_CAPACITY;
            self.len -= 1;
        }
    }

    /// Record a wrist position and evict samples older than `window_ms`.
    ///
    /// A timestamp earlier than the newest retained one means the source
    /// restarted; the history is cleared first.
    pub fn push(&mut self, t_ms: u64, x: f32, window_ms: u64) {
        if self.newest().map_or(false, |n| t_ms < n.t_ms) {
            self.clear();
        }
        if self.len == HISTORY_CAPACITY {
            self.pop_oldest();
        }
        let slot = (self.head + self.len) % HISTORY_CAPACITY;
        self.buf[slot] = WristSample { t_ms, x };
        self.len += 1;

        while let Some(old) = self.oldest() {
            if t_ms - old.t_ms > window_ms {
                self.pop_oldest();
            } else {
                break;
            }
        }
    }

    /// Motion between the oldest and newest retained samples.
    pub fn motion(&self) -> WristMotion {
        let (old, new) = match (self.oldest(), self.newest()) {
            (Some(o), Some(n)) if self.len >= 2 => (*o, *n),
            _ => return WristMotion { samples: self.len, ..WristMotion::default() },
        };
        let span_ms = new.t_ms - old.t_ms;
        let dx = new.x - old.x;
        let velocity_x = if span_ms == 0 { 0.0 } else { dx / (span_ms as f32 / 1000.0) };
        WristMotion { displacement_x: dx, velocity_x, span_ms, samples: self.len }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// FeatureSet
// ════════════════════════════════════════════════════════════════════════════

/// Gesture-relevant features of one hand frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureSet {
    pub handedness:   Handedness,
    pub timestamp_ms: u64,
    pub confidence:   f32,
    pub wrist:        LandmarkPoint,
    /// Thumb-tip to index-tip distance in the image plane.
    pub pinch_span:   f32,
    pub fingers:      FingerFlags,
    pub motion:       WristMotion,
}

// ════════════════════════════════════════════════════════════════════════════
// GeometryExtractor
// ════════════════════════════════════════════════════════════════════════════

/// Turns validated hand frames into [`FeatureSet`]s.
#[derive(Clone, Debug)]
pub struct GeometryExtractor {
    min_confidence:   f32,
    extension_margin: f32,
    window_ms:        u64,
    histories:        [WristHistory; 2],
}

impl GeometryExtractor {
    pub fn new(config: &GestureConfig) -> Self {
        GeometryExtractor {
            min_confidence:   config.min_confidence,
            extension_margin: config.finger_extension_margin,
            window_ms:        config.wave_window_ms,
            histories:        [WristHistory::default(), WristHistory::default()],
        }
    }

    pub fn history(&self, hand: Handedness) -> &WristHistory {
        &self.histories[hand.index()]
    }

    /// Forget one hand's motion, e.g. when its tracking is lost.
    pub fn reset(&mut self, hand: Handedness) {
        self.histories[hand.index()].clear();
    }

    /// Validate `frame`, update the hand's wrist history and derive features.
    ///
    /// A rejected frame leaves the history untouched.
    pub fn extract(&mut self, frame: &HandFrame) -> Result<FeatureSet, GestureError> {
        let hand = frame.handedness();
        validate(frame, self.min_confidence).map_err(|source| GestureError::MalformedFrame {
            hand: hand.name(),
            source,
        })?;

        let lm = frame.landmarks();
        let wrist = lm[idx::WRIST];

        let history = &mut self.histories[hand.index()];
        history.push(frame.timestamp_ms(), wrist.x, self.window_ms);
        let motion = history.motion();

        let m = self.extension_margin;
        let fingers = FingerFlags {
            index:  finger_state(&lm[idx::INDEX_TIP],  &lm[idx::INDEX_PIP],  m),
            middle: finger_state(&lm[idx::MIDDLE_TIP], &lm[idx::MIDDLE_PIP], m),
            ring:   finger_state(&lm[idx::RING_TIP],   &lm[idx::RING_PIP],   m),
            pinky:  finger_state(&lm[idx::PINKY_TIP],  &lm[idx::PINKY_PIP],  m),
        };

        Ok(FeatureSet {
            handedness:   hand,
            timestamp_ms: frame.timestamp_ms(),
            confidence:   frame.confidence(),
            wrist,
            pinch_span:   lm[idx::THUMB_TIP].planar_distance(&lm[idx::INDEX_TIP]),
            fingers,
            motion,
        })
    }
}

fn validate(frame: &HandFrame, min_confidence: f32) -> Result<(), FrameError> {
    let found = frame.landmarks().len();
    if found != LANDMARK_COUNT {
        return Err(FrameError::LandmarkCount { expected: LANDMARK_COUNT, found });
    }
    // NaN confidence fails this comparison too.
    if !(frame.confidence() >= min_confidence) {
        return Err(FrameError::LowConfidence {
            confidence: frame.confidence(),
            minimum:    min_confidence,
        });
    }
    if let Some(index) = frame.landmarks().iter().position(|p| !p.is_finite()) {
        return Err(FrameError::NonFinite { index });
    }
    Ok(())
}

/// y grows downward, so an extended finger has its tip above (smaller y
/// than) its PIP joint.
fn finger_state(tip: &LandmarkPoint, pip: &LandmarkPoint, margin: f32) -> FingerState {
    let lift = pip.y - tip.y;
    if lift > margin {
        FingerState::Extended
    } else if lift < -margin {
        FingerState::Curled
    } else {
        FingerState::Neutral
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poses;

    fn extractor() -> GeometryExtractor {
        GeometryExtractor::new(&GestureConfig::default())
    }

    #[test]
    fn wrong_landmark_count_is_malformed() {
        let mut ex = extractor();
        let frame = HandFrame::new(Handedness::Right, vec![LandmarkPoint::default(); 20], 0.9, 0);
        let err = ex.extract(&frame).unwrap_err();
        assert!(matches!(
            err,
            GestureError::MalformedFrame {
                source: FrameError::LandmarkCount { expected: 21, found: 20 },
                ..
            }
        ));
    }

    #[test]
    fn low_confidence_is_malformed_and_history_untouched() {
        let mut ex = extractor();
        let frame = poses::open_palm(Handedness::Left, 0.5, 0.5).at(0).confidence(0.2).build();
        assert!(matches!(
            ex.extract(&frame),
            Err(GestureError::MalformedFrame { source: FrameError::LowConfidence { .. }, .. })
        ));
        assert!(ex.history(Handedness::Left).is_empty());
    }

    #[test]
    fn nan_landmark_is_malformed() {
        let mut ex = extractor();
        let mut pts = poses::open_palm(Handedness::Left, 0.5, 0.5).points();
        pts[7].y = f32::NAN;
        let frame = HandFrame::new(Handedness::Left, pts, 0.9, 0);
        assert!(matches!(
            ex.extract(&frame),
            Err(GestureError::MalformedFrame { source: FrameError::NonFinite { index: 7 }, .. })
        ));
    }

    #[test]
    fn pinch_span_measures_thumb_to_index() {
        let mut ex = extractor();
        let frame = poses::pinch(Handedness::Right, 0.5, 0.5, 0.2).at(0).build();
        let fs = ex.extract(&frame).unwrap();
        assert!((fs.pinch_span - 0.2).abs() < 1e-4, "span {}", fs.pinch_span);
    }

    #[test]
    fn open_palm_fingers_extended() {
        let mut ex = extractor();
        let fs = ex.extract(&poses::open_palm(Handedness::Right, 0.5, 0.5).at(0).build()).unwrap();
        assert_eq!(fs.fingers.index, FingerState::Extended);
        assert!(fs.fingers.others_extended());
        assert!(!fs.fingers.others_curled());
    }

    #[test]
    fn pinch_pose_curls_other_fingers() {
        let mut ex = extractor();
        let fs = ex.extract(&poses::pinch(Handedness::Right, 0.5, 0.5, 0.15).at(0).build()).unwrap();
        assert!(fs.fingers.others_curled());
        assert_eq!(fs.fingers.index, FingerState::Extended);
    }

    #[test]
    fn wrist_velocity_from_history() {
        let mut ex = extractor();
        // 0.3 of frame width in 300 ms → 1.0 units/s leftward.
        for (i, x) in [0.7, 0.6, 0.5, 0.4].iter().enumerate() {
            let f = poses::open_palm(Handedness::Right, *x, 0.5).at(i as u64 * 100).build();
            let fs = ex.extract(&f).unwrap();
            if i == 3 {
                assert!((fs.motion.displacement_x + 0.3).abs() < 1e-5);
                assert!((fs.motion.velocity_x + 1.0).abs() < 1e-3);
                assert_eq!(fs.motion.span_ms, 300);
            }
        }
    }

    #[test]
    fn history_evicts_outside_window() {
        let mut h = WristHistory::default();
        h.push(0, 0.1, 400);
        h.push(200, 0.2, 400);
        h.push(700, 0.3, 400);
        assert_eq!(h.len(), 1);
        assert_eq!(h.motion().displacement_x, 0.0);
    }

    #[test]
    fn history_capacity_is_bounded() {
        let mut h = WristHistory::default();
        for t in 0..(HISTORY_CAPACITY as u64 * 2) {
            h.push(t, t as f32 * 0.001, 10_000);
        }
        assert_eq!(h.len(), HISTORY_CAPACITY);
        assert_eq!(h.motion().span_ms, HISTORY_CAPACITY as u64 - 1);
    }

    #[test]
    fn history_clears_when_time_goes_backwards() {
        let mut h = WristHistory::default();
        h.push(1000, 0.2, 400);
        h.push(1100, 0.4, 400);
        h.push(50, 0.9, 400);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn hands_have_independent_histories() {
        let mut ex = extractor();
        ex.extract(&poses::open_palm(Handedness::Left, 0.2, 0.5).at(0).build()).unwrap();
        ex.extract(&poses::open_palm(Handedness::Left, 0.3, 0.5).at(50).build()).unwrap();
        assert_eq!(ex.history(Handedness::Left).len(), 2);
        assert!(ex.history(Handedness::Right).is_empty());
        ex.reset(Handedness::Left);
        assert!(ex.history(Handedness::Left).is_empty());
    }
}
