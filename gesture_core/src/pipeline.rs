//! One frame in, zero or more events out.
//!
//! [`GesturePipeline`] chains the geometry extractor, the classifier and the
//! debouncer.  A malformed hand frame is dropped and logged; the rest of the
//! frame, and the frames after it, are processed as usual.

use log::{debug, warn};

use crate::classifier::{GestureClassifier, GestureSample};
use crate::config::GestureConfig;
use crate::debounce::{Debouncer, GestureEvent};
use crate::error::ConfigError;
use crate::geometry::GeometryExtractor;
use crate::landmark::{FrameSet, Handedness};

/// Everything the pipeline produced for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameOutput {
    /// One sample per usable hand.
    pub samples: Vec<GestureSample>,
    pub events:  Vec<GestureEvent>,
    /// Hands rejected as malformed.
    pub dropped: usize,
}

#[derive(Clone, Debug)]
pub struct GesturePipeline {
    extractor:  GeometryExtractor,
    classifier: GestureClassifier,
    debouncer:  Debouncer,
}

impl GesturePipeline {
    pub fn new(config: &GestureConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(GesturePipeline {
            extractor:  GeometryExtractor::new(config),
            classifier: GestureClassifier::new(config),
            debouncer:  Debouncer::new(config),
        })
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    pub fn process(&mut self, frame: &FrameSet) -> FrameOutput {
        let mut out = FrameOutput::default();
        let mut seen = [false; 2];
        let mut tracked = [false; 2];

        for hand in &frame.hands {
            let slot = hand.handedness().index();
            if seen[slot] {
                debug!("duplicate {} hand in frame {} ignored", hand.handedness().name(), frame.timestamp_ms);
                continue;
            }
            seen[slot] = true;

            match self.extractor.extract(hand) {
                Ok(features) => {
                    tracked[slot] = true;
                    out.samples.push(self.classifier.classify(&features));
                }
                Err(e) => {
                    warn!("frame {}: {}", frame.timestamp_ms, e);
                    out.dropped += 1;
                }
            }
        }

        // A hand that reappears elsewhere must not read as a sweep.
        for hand in Handedness::ALL {
            if !tracked[hand.index()] && !self.extractor.history(hand).is_empty() {
                debug!("{} hand lost at {} ms, wrist history cleared", hand.name(), frame.timestamp_ms);
                self.extractor.reset(hand);
            }
        }

        out.events = self.debouncer.step(frame.timestamp_ms, &out.samples);
        out
    }
}
