//! Raw hand-landmark model.
//!
//! A [`HandFrame`] is one detected hand in one camera frame: 21 normalized
//! points in the MediaPipe hand layout, a handedness tag, the detector's
//! confidence and the frame timestamp.  Frames are immutable once built.

use serde::{Deserialize, Serialize};

/// Number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

/// Landmark indices (MediaPipe hand layout).
#[allow(dead_code)]
pub mod idx {
    pub const WRIST:      usize = 0;
    pub const THUMB_CMC:  usize = 1;
    pub const THUMB_MCP:  usize = 2;
    pub const THUMB_IP:   usize = 3;
    pub const THUMB_TIP:  usize = 4;
    pub const INDEX_MCP:  usize = 5;
    pub const INDEX_PIP:  usize = 6;
    pub const INDEX_DIP:  usize = 7;
    pub const INDEX_TIP:  usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP:   usize = 13;
    pub const RING_PIP:   usize = 14;
    pub const RING_DIP:   usize = 15;
    pub const RING_TIP:   usize = 16;
    pub const PINKY_MCP:  usize = 17;
    pub const PINKY_PIP:  usize = 18;
    pub const PINKY_DIP:  usize = 19;
    pub const PINKY_TIP:  usize = 20;
}

// ════════════════════════════════════════════════════════════════════════════
// Handedness
// ════════════════════════════════════════════════════════════════════════════

/// Which hand a frame belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub const ALL: [Handedness; 2] = [Handedness::Left, Handedness::Right];

    /// Slot in per-hand arenas.
    pub fn index(self) -> usize {
        match self {
            Handedness::Left  => 0,
            Handedness::Right => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Handedness::Left  => "left",
            Handedness::Right => "right",
        }
    }

    /// Parse the detector's label ("Left", "right", "L", ...).
    pub fn parse(s: &str) -> Option<Handedness> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left"  | "l" => Some(Handedness::Left),
            "right" | "r" => Some(Handedness::Right),
            _ => None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkPoint
// ════════════════════════════════════════════════════════════════════════════

/// One landmark in normalized image coordinates (x right, y down, z depth).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl LandmarkPoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        LandmarkPoint { x, y, z }
    }

    /// Distance in the image plane; depth is ignored.
    pub fn planar_distance(&self, other: &LandmarkPoint) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandFrame
// ════════════════════════════════════════════════════════════════════════════

/// One detected hand in one camera frame.
///
/// The landmark count is not checked here; the geometry extractor rejects
/// frames that do not carry exactly [`LANDMARK_COUNT`] points.
#[derive(Clone, Debug, PartialEq)]
pub struct HandFrame {
    handedness:   Handedness,
    landmarks:    Vec<LandmarkPoint>,
    confidence:   f32,
    timestamp_ms: u64,
}

impl HandFrame {
    pub fn new(
        handedness:   Handedness,
        landmarks:    Vec<LandmarkPoint>,
        confidence:   f32,
        timestamp_ms: u64,
    ) -> Self {
        HandFrame { handedness, landmarks, confidence, timestamp_ms }
    }

    pub fn handedness(&self)   -> Handedness       { self.handedness }
    pub fn landmarks(&self)    -> &[LandmarkPoint] { &self.landmarks }
    pub fn confidence(&self)   -> f32              { self.confidence }
    pub fn timestamp_ms(&self) -> u64              { self.timestamp_ms }

    pub fn wrist(&self) -> Option<&LandmarkPoint> {
        self.landmarks.get(idx::WRIST)
    }
}

/// All hands seen in one camera frame (zero, one or two).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameSet {
    pub timestamp_ms: u64,
    pub hands:        Vec<HandFrame>,
}

impl FrameSet {
    pub fn new(timestamp_ms: u64, hands: Vec<HandFrame>) -> Self {
        FrameSet { timestamp_ms, hands }
    }

    pub fn empty(timestamp_ms: u64) -> Self {
        FrameSet { timestamp_ms, hands: Vec::new() }
    }

    pub fn hand(&self, handedness: Handedness) -> Option<&HandFrame> {
        self.hands.iter().find(|h| h.handedness() == handedness)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handedness_parse_accepts_detector_labels() {
        assert_eq!(Handedness::parse("Left"),   Some(Handedness::Left));
        assert_eq!(Handedness::parse(" RIGHT"), Some(Handedness::Right));
        assert_eq!(Handedness::parse("r"),      Some(Handedness::Right));
        assert_eq!(Handedness::parse("both"),   None);
    }

    #[test]
    fn handedness_slots_are_distinct() {
        assert_ne!(Handedness::Left.index(), Handedness::Right.index());
        for h in Handedness::ALL {
            assert!(h.index() < 2);
        }
    }

    #[test]
    fn planar_distance_ignores_depth() {
        let a = LandmarkPoint::new(0.0, 0.0, 0.0);
        let b = LandmarkPoint::new(0.3, 0.4, 9.0);
        assert!((a.planar_distance(&b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn frame_set_finds_hand() {
        let left = HandFrame::new(Handedness::Left, vec![LandmarkPoint::default(); 21], 0.9, 5);
        let set = FrameSet::new(5, vec![left]);
        assert!(set.hand(Handedness::Left).is_some());
        assert!(set.hand(Handedness::Right).is_none());
    }
}
