//! End-to-end scenarios: synthetic hands through the pipeline and into the
//! dispatcher.

use crate::classifier::{GestureLabel, GestureSample};
use crate::config::GestureConfig;
use crate::debounce::{Debouncer, EventKind, GestureEvent};
use crate::dispatcher::testing::{dispatcher, songs, Call};
use crate::dispatcher::{DispatchOutcome, PlaybackSession};
use crate::landmark::{FrameSet, HandFrame, Handedness};
use crate::pipeline::GesturePipeline;
use crate::playlist::{Playlist, PlaylistOrder};
use crate::poses::{self, PoseBuilder};

const DT: u64 = 33;

fn pipeline() -> GesturePipeline {
    GesturePipeline::new(&GestureConfig::default()).unwrap()
}

fn feed(p: &mut GesturePipeline, frames: Vec<Vec<HandFrame>>, start_ms: u64) -> Vec<GestureEvent> {
    let mut events = Vec::new();
    for (i, hands) in frames.into_iter().enumerate() {
        let t = start_ms + i as u64 * DT;
        events.extend(p.process(&FrameSet::new(t, hands)).events);
    }
    events
}

/// `n` frames of one static pose on one hand starting at `start_ms`.
fn hold(p: &mut GesturePipeline, pose: impl Fn() -> PoseBuilder, start_ms: u64, n: usize) -> Vec<GestureEvent> {
    let frames = (0..n)
        .map(|i| vec![pose().at(start_ms + i as u64 * DT).build()])
        .collect();
    feed(p, frames, start_ms)
}

fn kinds(events: &[GestureEvent]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}

#[test]
fn n_wave_left_samples_fire_exactly_one_next() {
    let cfg = GestureConfig::default();
    for n in cfg.confirm_frame_count as usize..=30 {
        let mut db = Debouncer::new(&cfg);
        let mut fired = Vec::new();
        for i in 0..n as u64 {
            let t = i * DT;
            let s = GestureSample {
                handedness:   Handedness::Right,
                label:        GestureLabel::WaveLeft,
                timestamp_ms: t,
                strength:     1.0,
            };
            fired.extend(db.step(t, &[s]));
        }
        assert_eq!(kinds(&fired), vec![EventKind::NextTrack], "run of {} frames", n);
    }
}

#[test]
fn continuous_wave_refires_only_after_cooldown() {
    let mut p = pipeline();
    let frames = poses::wave(Handedness::Right, 1.2, 0.6, -0.025, 0, DT, 45)
        .into_iter()
        .map(|f| vec![f])
        .collect();
    let events = feed(&mut p, frames, 0);
    assert_eq!(kinds(&events), vec![EventKind::NextTrack, EventKind::NextTrack]);
    let gap = events[1].timestamp_ms - events[0].timestamp_ms;
    assert!(gap >= GestureConfig::default().cooldown_ms, "refired after {} ms", gap);
}

#[test]
fn pinch_sweep_gives_monotonic_clamped_volume() {
    let mut p = pipeline();
    let frames = (0..=30)
        .map(|i| {
            let span = 0.05 + i as f32 * 0.01;
            vec![poses::pinch(Handedness::Right, 0.6, 0.6, span).at(i as u64 * DT).build()]
        })
        .collect();
    let levels: Vec<f32> = feed(&mut p, frames, 0)
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::SetVolume(v) => Some(v),
            _ => None,
        })
        .collect();
    assert!(levels.len() >= 29, "only {} volume events", levels.len());
    assert!(levels.iter().all(|v| (0.0..=1.0).contains(v)));
    assert!(levels.windows(2).all(|w| w[1] >= w[0]));
}

#[test]
fn single_frame_ok_jitter_does_not_toggle() {
    let mut p = pipeline();
    let fist = || poses::fist(Handedness::Left, 0.4, 0.6);
    let mut events = hold(&mut p, fist, 0, 3);
    events.extend(hold(&mut p, || poses::ok_sign(Handedness::Left, 0.4, 0.6), 3 * DT, 1));
    events.extend(hold(&mut p, fist, 4 * DT, 5));
    assert!(events.is_empty(), "unexpected {:?}", kinds(&events));
}

#[test]
fn empty_playlist_next_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let playlist = Playlist::scan(dir.path(), &["mp3".to_string()], PlaylistOrder::Sorted).unwrap();
    let mut session = PlaybackSession::new(playlist);
    let mut d = dispatcher();
    assert_eq!(d.prime(&mut session), DispatchOutcome::Ignored);

    let mut p = pipeline();
    let frames = poses::wave(Handedness::Right, 0.9, 0.6, -0.05, 0, DT, 8)
        .into_iter()
        .map(|f| vec![f])
        .collect();
    let events = feed(&mut p, frames, 0);
    assert_eq!(kinds(&events), vec![EventKind::NextTrack]);

    for e in &events {
        assert_eq!(d.dispatch(&mut session, e), DispatchOutcome::Ignored);
    }
    assert!(d.playback().calls.is_empty());
}

#[test]
fn simultaneous_pinch_and_wave_are_independent() {
    let mut p = pipeline();
    let waving = poses::wave(Handedness::Left, 0.1, 0.6, 0.05, 0, DT, 8);
    let frames = waving
        .into_iter()
        .enumerate()
        .map(|(i, left)| {
            let right = poses::pinch(Handedness::Right, 0.8, 0.6, 0.20).at(i as u64 * DT).build();
            vec![left, right]
        })
        .collect();
    let events = feed(&mut p, frames, 0);

    let volumes: Vec<&GestureEvent> = events.iter().filter(|e| !e.kind.is_discrete()).collect();
    let prevs: Vec<&GestureEvent> = events.iter().filter(|e| e.kind == EventKind::PrevTrack).collect();

    assert_eq!(volumes.len(), 8, "one SET_VOLUME per pinch frame");
    for e in &volumes {
        assert_eq!(e.hand, Handedness::Right);
        assert!(matches!(e.kind, EventKind::SetVolume(v) if (v - 0.5).abs() < 1e-3), "{:?}", e.kind);
    }
    assert_eq!(prevs.len(), 1);
    assert_eq!(prevs[0].hand, Handedness::Left);
    assert!(prevs[0].timestamp_ms > volumes[0].timestamp_ms);

    let mut session = PlaybackSession::new(songs(&["a", "b", "c"]));
    let mut d = dispatcher();
    for e in &events {
        d.dispatch(&mut session, e);
    }
    assert_eq!(session.cursor(), 2);
    assert!(session.volume().map_or(false, |v| (v - 0.5).abs() < 1e-3));
}

fn two_ok_gestures(gap_ms: u64) -> Vec<GestureEvent> {
    let mut p = pipeline();
    let ok = || poses::ok_sign(Handedness::Left, 0.4, 0.6);
    let mut events = hold(&mut p, ok, 0, 5);
    events.extend(hold(&mut p, || poses::fist(Handedness::Left, 0.4, 0.6), 5 * DT, 3));
    events.extend(hold(&mut p, ok, gap_ms, 5));
    events
}

#[test]
fn ok_gestures_closer_than_cooldown_collapse() {
    let events = two_ok_gestures(500);
    assert_eq!(kinds(&events), vec![EventKind::TogglePlay]);
}

#[test]
fn ok_gestures_further_than_cooldown_both_toggle() {
    let events = two_ok_gestures(1500);
    assert_eq!(kinds(&events), vec![EventKind::TogglePlay, EventKind::TogglePlay]);

    let mut session = PlaybackSession::new(songs(&["a"]));
    let mut d = dispatcher();
    d.prime(&mut session);
    let outcomes: Vec<_> = events.iter().map(|e| d.dispatch(&mut session, e)).collect();
    assert_eq!(outcomes, vec![
        DispatchOutcome::Toggled { playing: true },
        DispatchOutcome::Toggled { playing: false },
    ]);
    assert_eq!(&d.playback().calls[1..], &[Call::Play, Call::Pause]);
}

#[test]
fn hand_reappearing_elsewhere_is_not_a_wave() {
    let mut p = pipeline();
    let still = |x: f32| move || poses::open_palm(Handedness::Right, x, 0.6);
    let mut events = hold(&mut p, still(0.8), 0, 5);
    let gap: Vec<Vec<HandFrame>> = (0..7).map(|_| Vec::new()).collect();
    events.extend(feed(&mut p, gap, 5 * DT));
    events.extend(hold(&mut p, still(0.4), 12 * DT, 4));
    assert!(events.is_empty(), "unexpected {:?}", kinds(&events));

    // A real sweep right after another dropout still counts.
    feed(&mut p, vec![Vec::new(), Vec::new()], 16 * DT);
    let sweep = poses::wave(Handedness::Right, 0.9, 0.6, -0.05, 18 * DT, DT, 8)
        .into_iter()
        .map(|f| vec![f])
        .collect();
    assert_eq!(kinds(&feed(&mut p, sweep, 18 * DT)), vec![EventKind::NextTrack]);
}
