//! JSON-lines landmark format shared by the tracker process and replay files.
//!
//! ```text
//! {"timestamp_ms": 1234, "hands": [{"handedness": "Right", "score": 0.93,
//!   "landmarks": [{"x": 0.51, "y": 0.62, "z": -0.01}, ... 21 points]}]}
//! ```
//!
//! `timestamp_ms` is optional; the source stamps frames that lack it.  A
//! line carrying `"error"` means the tracker could not process that camera
//! frame.

use log::warn;
use serde::{Deserialize, Serialize};

use gesture_core::{FrameSet, HandFrame, Handedness, LandmarkPoint};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireHand {
    pub handedness: String,
    #[serde(default = "full_score")]
    pub score:      f32,
    pub landmarks:  Vec<LandmarkPoint>,
}

fn full_score() -> f32 {
    1.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
    #[serde(default)]
    pub hands:        Vec<WireHand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error:        Option<String>,
}

/// Result of decoding one line.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Frame(WireFrame),
    /// The producer reported a failure, or the line was not valid JSON.
    Unavailable(String),
}

pub fn decode_line(line: &str) -> Decoded {
    match serde_json::from_str::<WireFrame>(line) {
        Ok(WireFrame { error: Some(e), .. }) => Decoded::Unavailable(e),
        Ok(frame) => Decoded::Frame(frame),
        Err(e) => Decoded::Unavailable(format!("undecodable line: {}", e)),
    }
}

impl WireFrame {
    /// Convert to core frames stamped with `timestamp_ms`.  Hands with an
    /// unknown handedness label are skipped; landmark counts are left for the
    /// geometry extractor to check.
    pub fn into_frame_set(self, timestamp_ms: u64) -> FrameSet {
        let hands = self.hands
            .into_iter()
            .filter_map(|h| match Handedness::parse(&h.handedness) {
                Some(hand) => Some(HandFrame::new(hand, h.landmarks, h.score, timestamp_ms)),
                None => {
                    warn!("skipping hand with unknown handedness {:?}", h.handedness);
                    None
                }
            })
            .collect();
        FrameSet::new(timestamp_ms, hands)
    }

    pub fn from_frame_set(frame: &FrameSet) -> Self {
        let hands = frame.hands.iter()
            .map(|h| WireHand {
                handedness: match h.handedness() {
                    Handedness::Left  => "Left".to_string(),
                    Handedness::Right => "Right".to_string(),
                },
                score:      h.confidence(),
                landmarks:  h.landmarks().to_vec(),
            })
            .collect();
        WireFrame { timestamp_ms: Some(frame.timestamp_ms), hands, error: None }
    }
}

/// One JSON line (no trailing newline) for `frame`.
pub fn encode_line(frame: &FrameSet) -> String {
    // Plain structs of numbers and strings always serialize.
    serde_json::to_string(&WireFrame::from_frame_set(frame)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gesture_core::poses;

    #[test]
    fn decodes_tracker_line() {
        let pts: Vec<String> = (0..21).map(|i| format!(r#"{{"x":0.{:02},"y":0.5,"z":0.0}}"#, i)).collect();
        let line = format!(
            r#"{{"hands":[{{"handedness":"Right","score":0.9,"landmarks":[{}]}}]}}"#,
            pts.join(",")
        );
        let Decoded::Frame(wf) = decode_line(&line) else { panic!("not a frame") };
        assert_eq!(wf.timestamp_ms, None);
        let fs = wf.into_frame_set(500);
        assert_eq!(fs.timestamp_ms, 500);
        assert_eq!(fs.hands.len(), 1);
        assert_eq!(fs.hands[0].handedness(), Handedness::Right);
        assert_eq!(fs.hands[0].landmarks().len(), 21);
        assert_eq!(fs.hands[0].timestamp_ms(), 500);
    }

    #[test]
    fn error_field_is_unavailable() {
        assert_eq!(
            decode_line(r#"{"hands":[],"error":"camera busy"}"#),
            Decoded::Unavailable("camera busy".into())
        );
    }

    #[test]
    fn garbage_is_unavailable() {
        assert!(matches!(decode_line("READY?"), Decoded::Unavailable(_)));
    }

    #[test]
    fn unknown_handedness_is_skipped() {
        let wf = WireFrame {
            hands: vec![WireHand { handedness: "Both".into(), score: 1.0, landmarks: vec![] }],
            ..Default::default()
        };
        assert!(wf.into_frame_set(0).hands.is_empty());
    }

    #[test]
    fn encoded_frame_decodes_to_same_hands() {
        let hand = poses::pinch(Handedness::Right, 0.6, 0.6, 0.2).at(66).build();
        let fs = FrameSet::new(66, vec![hand]);
        let Decoded::Frame(wf) = decode_line(&encode_line(&fs)) else { panic!("not a frame") };
        assert_eq!(wf.timestamp_ms, Some(66));
        assert_eq!(wf.into_frame_set(66), fs);
    }
}
