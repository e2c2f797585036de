//! Temporal debouncer: per-frame samples → confirmed gesture events.
//!
//! Each hand owns one record in a two-slot arena: a sliding window of its
//! recent samples, one phase per discrete gesture and the volume phase.
//!
//! ```text
//!   discrete:   Idle ──sample──▶ Armed ──N frames (+dwell)──▶ [emit] ──▶ Cooldown ──D ms──▶ Idle
//!                 ▲                │ other label / timeout
//!                 └────────────────┘
//!
//!   volume:     Idle ──Pinch──▶ Active (emit SetVolume every frame, throttled) ──no Pinch──▶ Idle
//! ```
//!
//! Confirmation is transient: the frame that completes the run emits the
//! event and leaves the machine in `Cooldown`.  With
//! `global_discrete_cooldown` on, discrete events from either hand also
//! share one quiet period; a gesture completed inside it stays armed and
//! fires on its first frame after the period ends, if it is still held.

use std::collections::VecDeque;

use log::{debug, trace};

use crate::classifier::{GestureLabel, GestureSample};
use crate::config::GestureConfig;
use crate::landmark::Handedness;

/// Upper bound on samples retained per hand, whatever the lookback.
pub const WINDOW_CAPACITY: usize = 128;

// ════════════════════════════════════════════════════════════════════════════
// Events
// ════════════════════════════════════════════════════════════════════════════

/// What a confirmed gesture asks the player to do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EventKind {
    NextTrack,
    PrevTrack,
    TogglePlay,
    /// Volume level in [0, 1].
    SetVolume(f32),
}

impl EventKind {
    pub fn is_discrete(&self) -> bool {
        !matches!(self, EventKind::SetVolume(_))
    }

    /// Short on-screen caption.
    pub fn caption(&self) -> &'static str {
        match self {
            EventKind::NextTrack    => "Next Song",
            EventKind::PrevTrack    => "Previous Song",
            EventKind::TogglePlay   => "Play/Pause",
            EventKind::SetVolume(_) => "Volume",
        }
    }
}

/// A confirmed, deduplicated action.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureEvent {
    pub kind:         EventKind,
    pub hand:         Handedness,
    pub timestamp_ms: u64,
}

/// Gestures that fire once per completed motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscreteGesture {
    Next,
    Prev,
    Toggle,
}

impl DiscreteGesture {
    pub const ALL: [DiscreteGesture; 3] =
        [DiscreteGesture::Next, DiscreteGesture::Prev, DiscreteGesture::Toggle];

    pub fn from_label(label: GestureLabel) -> Option<Self> {
        match label {
            GestureLabel::WaveLeft  => Some(DiscreteGesture::Next),
            GestureLabel::WaveRight => Some(DiscreteGesture::Prev),
            GestureLabel::Ok        => Some(DiscreteGesture::Toggle),
            GestureLabel::Pinch | GestureLabel::None => None,
        }
    }

    pub fn event_kind(self) -> EventKind {
        match self {
            DiscreteGesture::Next   => EventKind::NextTrack,
            DiscreteGesture::Prev   => EventKind::PrevTrack,
            DiscreteGesture::Toggle => EventKind::TogglePlay,
        }
    }

    fn slot(self) -> usize {
        match self {
            DiscreteGesture::Next   => 0,
            DiscreteGesture::Prev   => 1,
            DiscreteGesture::Toggle => 2,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Phases
// ════════════════════════════════════════════════════════════════════════════

/// State of one discrete gesture on one hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// `run` counts the samples of this gesture since arming.
    Armed { since_ms: u64, last_seen_ms: u64, run: u32 },
    Cooldown { until_ms: u64 },
}

/// State of the continuous volume control on one hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumePhase {
    Idle,
    Active { last_emit_ms: u64 },
}

// ════════════════════════════════════════════════════════════════════════════
// SampleWindow
// ════════════════════════════════════════════════════════════════════════════

/// Recent samples of one hand, bounded by a lookback duration.
#[derive(Clone, Debug)]
pub struct SampleWindow {
    samples:     VecDeque<GestureSample>,
    lookback_ms: u64,
}

impl SampleWindow {
    pub fn new(lookback_ms: u64) -> Self {
        SampleWindow { samples: VecDeque::with_capacity(WINDOW_CAPACITY), lookback_ms }
    }

    pub fn len(&self) -> usize { self.samples.len() }
    pub fn is_empty(&self) -> bool { self.samples.is_empty() }

    pub fn push(&mut self, sample: GestureSample) {
        if self.samples.len() == WINDOW_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.evict(sample.timestamp_ms);
    }

    /// Drop samples older than the lookback relative to `now_ms`.
    pub fn evict(&mut self, now_ms: u64) {
        while let Some(front) = self.samples.front() {
            if now_ms.saturating_sub(front.timestamp_ms) > self.lookback_ms {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Length of the newest run of `label`, counting only samples taken at
    /// or after `since_ms`.
    pub fn run_since(&self, label: GestureLabel, since_ms: u64) -> u32 {
        self.samples.iter().rev()
            .take_while(|s| s.label == label && s.timestamp_ms >= since_ms)
            .count() as u32
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Per-hand record
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
struct HandMachine {
    window:   SampleWindow,
    discrete: [Phase; 3],
    volume:   VolumePhase,
}

impl HandMachine {
    fn new(lookback_ms: u64) -> Self {
        HandMachine {
            window:   SampleWindow::new(lookback_ms),
            discrete: [Phase::Idle; 3],
            volume:   VolumePhase::Idle,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Debouncer
// ════════════════════════════════════════════════════════════════════════════

/// Two independent per-hand state machines plus the shared discrete gate.
#[derive(Clone, Debug)]
pub struct Debouncer {
    confirm_frames:   u32,
    min_dwell_ms:     u64,
    cooldown_ms:      u64,
    armed_timeout_ms: u64,
    throttle_ms:      u64,
    shared_gate:      bool,
    quiet_until_ms:   Option<u64>,
    hands:            [HandMachine; 2],
}

impl Debouncer {
    pub fn new(config: &GestureConfig) -> Self {
        Debouncer {
            confirm_frames:   config.confirm_frame_count.max(1),
            min_dwell_ms:     config.min_dwell_ms,
            cooldown_ms:      config.cooldown_ms,
            armed_timeout_ms: config.armed_timeout_ms,
            throttle_ms:      config.volume_throttle_ms,
            shared_gate:      config.global_discrete_cooldown,
            quiet_until_ms:   None,
            hands: [
                HandMachine::new(config.sample_window_ms),
                HandMachine::new(config.sample_window_ms),
            ],
        }
    }

    pub fn phase(&self, hand: Handedness, gesture: DiscreteGesture) -> Phase {
        self.hands[hand.index()].discrete[gesture.slot()]
    }

    pub fn volume_phase(&self, hand: Handedness) -> VolumePhase {
        self.hands[hand.index()].volume
    }

    pub fn window(&self, hand: Handedness) -> &SampleWindow {
        &self.hands[hand.index()].window
    }

    /// Advance every machine to `now_ms` and feed this frame's samples.
    ///
    /// `samples` holds at most one sample per hand; a hand with no sample was
    /// not detected this frame.  Returns events in the order they fired.
    pub fn step(&mut self, now_ms: u64, samples: &[GestureSample]) -> Vec<GestureEvent> {
        let mut events = Vec::new();

        for hand in Handedness::ALL {
            self.expire(hand, now_ms);
        }

        let mut seen = [false; 2];
        for sample in samples {
            seen[sample.handedness.index()] = true;
            self.feed(sample, &mut events);
        }

        for hand in Handedness::ALL {
            let m = &mut self.hands[hand.index()];
            if !seen[hand.index()] {
                m.window.evict(now_ms);
                if m.volume != VolumePhase::Idle {
                    trace!("{} hand lost, volume control released", hand.name());
                    m.volume = VolumePhase::Idle;
                }
            }
        }

        events
    }

    /// Cooldowns that ran out and armed gestures that went stale.
    fn expire(&mut self, hand: Handedness, now_ms: u64) {
        let timeout = self.armed_timeout_ms;
        for phase in self.hands[hand.index()].discrete.iter_mut() {
            let lapsed = match *phase {
                Phase::Cooldown { until_ms }      => now_ms >= until_ms,
                Phase::Armed { last_seen_ms, .. } => now_ms.saturating_sub(last_seen_ms) > timeout,
                Phase::Idle                       => false,
            };
            if lapsed {
                *phase = Phase::Idle;
            }
        }
    }

    fn feed(&mut self, sample: &GestureSample, events: &mut Vec<GestureEvent>) {
        let hand = sample.handedness;
        let t = sample.timestamp_ms;
        self.hands[hand.index()].window.push(*sample);

        // ── discrete gestures ─────────────────────────────────────────────
        let active = DiscreteGesture::from_label(sample.label);
        for gesture in DiscreteGesture::ALL {
            let slot = gesture.slot();
            let phase = self.hands[hand.index()].discrete[slot];

            if active != Some(gesture) {
                if let Phase::Armed { .. } = phase {
                    trace!("{} {:?} disarmed by {}", hand.name(), gesture, sample.label);
                    self.hands[hand.index()].discrete[slot] = Phase::Idle;
                }
                continue;
            }

            let (since_ms, run) = match phase {
                Phase::Cooldown { .. } => continue,
                Phase::Idle => {
                    trace!("{} {:?} armed at {} ms", hand.name(), gesture, t);
                    (t, 1)
                }
                Phase::Armed { since_ms, run, .. } => (since_ms, run.saturating_add(1)),
            };

            let dwelled = t.saturating_sub(since_ms) >= self.min_dwell_ms;
            let next = if run >= self.confirm_frames && dwelled && self.gate_open(t) {
                debug!("{} {:?} confirmed after {} frames", hand.name(), gesture, run);
                events.push(GestureEvent { kind: gesture.event_kind(), hand, timestamp_ms: t });
                let until_ms = t.saturating_add(self.cooldown_ms);
                if self.shared_gate {
                    self.quiet_until_ms = Some(until_ms);
                }
                Phase::Cooldown { until_ms }
            } else {
                if run >= self.confirm_frames && dwelled {
                    trace!("{} {:?} held inside the quiet period", hand.name(), gesture);
                }
                Phase::Armed { since_ms, last_seen_ms: t, run }
            };
            self.hands[hand.index()].discrete[slot] = next;
        }

        // ── continuous volume ─────────────────────────────────────────────
        let throttle = self.throttle_ms;
        let m = &mut self.hands[hand.index()];
        if sample.label == GestureLabel::Pinch {
            let due = match m.volume {
                VolumePhase::Idle => true,
                VolumePhase::Active { last_emit_ms } => t.saturating_sub(last_emit_ms) >= throttle,
            };
            if due {
                events.push(GestureEvent {
                    kind: EventKind::SetVolume(sample.strength.clamp(0.0, 1.0)),
                    hand,
                    timestamp_ms: t,
                });
                m.volume = VolumePhase::Active { last_emit_ms: t };
            }
        } else {
            m.volume = VolumePhase::Idle;
        }
    }

    fn gate_open(&self, t: u64) -> bool {
        !self.shared_gate || self.quiet_until_ms.map_or(true, |until| t >= until)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
