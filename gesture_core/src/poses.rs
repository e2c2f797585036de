//! Synthetic hand poses.
//!
//! Builds 21-point hands in the MediaPipe layout for the keyboard simulator
//! and for tests.  Offsets are relative to the wrist for an upright hand
//! roughly a quarter of the frame tall; y grows downward.

use crate::landmark::{idx, HandFrame, Handedness, LandmarkPoint, LANDMARK_COUNT};

/// Open palm, all fingers extended.
const OPEN: [(f32, f32); LANDMARK_COUNT] = [
    ( 0.000,  0.000), // wrist
    (-0.040, -0.030), (-0.070, -0.060), (-0.090, -0.090), (-0.110, -0.110), // thumb
    (-0.030, -0.100), (-0.035, -0.150), (-0.038, -0.180), (-0.040, -0.210), // index
    ( 0.000, -0.110), ( 0.000, -0.165), ( 0.000, -0.195), ( 0.000, -0.225), // middle
    ( 0.030, -0.100), ( 0.035, -0.150), ( 0.038, -0.175), ( 0.040, -0.200), // ring
    ( 0.055, -0.085), ( 0.065, -0.120), ( 0.070, -0.140), ( 0.075, -0.160), // pinky
];

/// Folded finger: (pip, dip, tip) offsets relative to the wrist, tip below pip.
const MIDDLE_CURLED: [(f32, f32); 3] = [(0.000, -0.140), (0.005, -0.120), (0.005, -0.100)];
const RING_CURLED:   [(f32, f32); 3] = [(0.030, -0.130), (0.032, -0.112), (0.032, -0.095)];
const PINKY_CURLED:  [(f32, f32); 3] = [(0.058, -0.110), (0.060, -0.095), (0.060, -0.080)];

/// Incrementally configured synthetic hand.
#[derive(Clone, Debug)]
pub struct PoseBuilder {
    hand:         Handedness,
    points:       Vec<LandmarkPoint>,
    confidence:   f32,
    timestamp_ms: u64,
}

impl PoseBuilder {
    fn from_offsets(hand: Handedness, wx: f32, wy: f32, offsets: &[(f32, f32); LANDMARK_COUNT]) -> Self {
        let points = offsets.iter()
            .map(|&(dx, dy)| LandmarkPoint::new(wx + dx, wy + dy, 0.0))
            .collect();
        PoseBuilder { hand, points, confidence: 0.9, timestamp_ms: 0 }
    }

    pub fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Translate the whole hand.
    pub fn shifted(mut self, dx: f32, dy: f32) -> Self {
        for p in &mut self.points {
            p.x += dx;
            p.y += dy;
        }
        self
    }

    pub fn points(&self) -> Vec<LandmarkPoint> {
        self.points.clone()
    }

    pub fn build(self) -> HandFrame {
        HandFrame::new(self.hand, self.points, self.confidence, self.timestamp_ms)
    }

    fn set(&mut self, i: usize, wrist: LandmarkPoint, (dx, dy): (f32, f32)) {
        self.points[i] = LandmarkPoint::new(wrist.x + dx, wrist.y + dy, 0.0);
    }

    fn curl(&mut self, pip: usize, folded: &[(f32, f32); 3]) {
        let w = self.points[idx::WRIST];
        for (k, off) in folded.iter().enumerate() {
            self.set(pip + k, w, *off);
        }
    }
}

/// Open palm with the wrist at `(x, y)`.
pub fn open_palm(hand: Handedness, x: f32, y: f32) -> PoseBuilder {
    PoseBuilder::from_offsets(hand, x, y, &OPEN)
}

/// OK sign: thumb and index tips touching, other fingers extended.
pub fn ok_sign(hand: Handedness, x: f32, y: f32) -> PoseBuilder {
    let mut b = open_palm(hand, x, y);
    let w = b.points[idx::WRIST];
    b.set(idx::THUMB_IP,  w, (-0.075, -0.110));
    b.set(idx::THUMB_TIP, w, (-0.065, -0.135));
    b.set(idx::INDEX_PIP, w, (-0.045, -0.160));
    b.set(idx::INDEX_DIP, w, (-0.060, -0.160));
    b.set(idx::INDEX_TIP, w, (-0.060, -0.145));
    b
}

/// Volume pinch: index extended, middle/ring/pinky curled, thumb tip exactly
/// `span` away from the index tip.
pub fn pinch(hand: Handedness, x: f32, y: f32, span: f32) -> PoseBuilder {
    let mut b = open_palm(hand, x, y);
    b.curl(idx::MIDDLE_PIP, &MIDDLE_CURLED);
    b.curl(idx::RING_PIP,   &RING_CURLED);
    b.curl(idx::PINKY_PIP,  &PINKY_CURLED);
    let tip = b.points[idx::INDEX_TIP];
    b.points[idx::THUMB_TIP] = LandmarkPoint::new(tip.x - 0.6 * span, tip.y + 0.8 * span, 0.0);
    b
}

/// A closed fist: everything curled, thumb tucked.
pub fn fist(hand: Handedness, x: f32, y: f32) -> PoseBuilder {
    let mut b = pinch(hand, x, y, 0.0);
    let w = b.points[idx::WRIST];
    b.set(idx::INDEX_PIP, w, (-0.030, -0.140));
    b.set(idx::INDEX_DIP, w, (-0.028, -0.120));
    b.set(idx::INDEX_TIP, w, (-0.028, -0.100));
    b.set(idx::THUMB_TIP, w, (-0.010, -0.090));
    b
}

/// `n` open-palm frames whose wrist moves by `step` in x every `dt_ms`.
pub fn wave(
    hand:     Handedness,
    start_x:  f32,
    y:        f32,
    step:     f32,
    start_ms: u64,
    dt_ms:    u64,
    n:        usize,
) -> Vec<HandFrame> {
    (0..n)
        .map(|i| {
            open_palm(hand, start_x + step * i as f32, y)
                .at(start_ms + dt_ms * i as u64)
                .build()
        })
        .collect()
}
