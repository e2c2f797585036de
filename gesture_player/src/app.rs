//! Top-level frame loop.
//!
//! `App` owns the recognition pipeline, the control dispatcher and the
//! playback session.  Each landmark frame goes through one full pass
//! (extract → classify → debounce → dispatch) before the next is acquired;
//! the quit request is checked at frame boundaries.

use std::fmt;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use log::{info, trace, warn};

use gesture_core::playlist::track_title;
use gesture_core::{
    ControlDispatcher, DispatchOutcome, EventKind, FrameSet, GestureLabel, GesturePipeline,
    GestureSample, Handedness, PlaybackService, PlaybackSession, Playlist, VolumeService,
};

use crate::config::{AppConfig, SourceKind};
use crate::error::{SourceError, StartupError};
use crate::overlay::{FeedbackSink, FeedbackView, HandView, NullFeedback, Overlay};
use crate::player::Player;
use crate::source::{open_source, Acquire, LandmarkSource, SimInput};

// ════════════════════════════════════════════════════════════════════════════
// RunStats
// ════════════════════════════════════════════════════════════════════════════

/// Counters logged once at shutdown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames:      u64,
    pub unavailable: u64,
    /// Hands dropped as malformed.
    pub dropped:     u64,
    pub next:        u64,
    pub prev:        u64,
    pub toggles:     u64,
    pub volume:      u64,
    pub failures:    u64,
}

impl RunStats {
    fn record(&mut self, kind: EventKind, outcome: &DispatchOutcome) {
        match kind {
            EventKind::NextTrack    => self.next += 1,
            EventKind::PrevTrack    => self.prev += 1,
            EventKind::TogglePlay   => self.toggles += 1,
            EventKind::SetVolume(_) => self.volume += 1,
        }
        if matches!(outcome, DispatchOutcome::Failed(_)) {
            self.failures += 1;
        }
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames={} unavailable={} dropped={} next={} prev={} toggle={} volume={} failures={}",
            self.frames, self.unavailable, self.dropped,
            self.next, self.prev, self.toggles, self.volume, self.failures,
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════
// App
// ════════════════════════════════════════════════════════════════════════════

pub struct App<P, V> {
    pipeline:       GesturePipeline,
    dispatcher:     ControlDispatcher<P, V>,
    session:        PlaybackSession,
    stats:          RunStats,

    // ── feedback ─────────────────────────────────────────────────────────
    message:        Option<(String, Instant)>,
    message_for:    Duration,
    initial_volume: f32,
    labels:         [GestureLabel; 2],
}

impl<P: PlaybackService, V: VolumeService> App<P, V> {
    /// Build the app and load (but do not play) the first track.
    pub fn new(
        cfg:      &AppConfig,
        pipeline: GesturePipeline,
        playlist: Playlist,
        playback: P,
        volume:   V,
    ) -> Self {
        if playlist.is_empty() {
            warn!(
                "no {:?} files in {:?}; track and play/pause gestures will do nothing",
                cfg.playlist.extensions, cfg.playlist.dir
            );
        } else {
            info!("playlist: {} tracks from {:?}", playlist.len(), cfg.playlist.dir);
        }

        let mut dispatcher = ControlDispatcher::new(playback, volume);
        let mut session = PlaybackSession::new(playlist);
        let mut stats = RunStats::default();
        if let DispatchOutcome::Failed(_) = dispatcher.prime(&mut session) {
            stats.failures += 1;
        }

        App {
            pipeline,
            dispatcher,
            session,
            stats,
            message:        None,
            message_for:    Duration::from_millis(cfg.display.message_duration_ms),
            initial_volume: cfg.audio.initial_volume,
            labels:         [GestureLabel::None; 2],
        }
    }

    pub fn session(&self) -> &PlaybackSession { &self.session }
    pub fn stats(&self)   -> &RunStats        { &self.stats }
    pub fn dispatcher(&self) -> &ControlDispatcher<P, V> { &self.dispatcher }

    /// One full pass for one frame.
    pub fn handle_frame(&mut self, frame: &FrameSet) -> Vec<DispatchOutcome> {
        self.stats.frames += 1;
        let out = self.pipeline.process(frame);
        self.stats.dropped += out.dropped as u64;
        self.update_labels(&out.samples);

        let mut outcomes = Vec::with_capacity(out.events.len());
        for event in &out.events {
            let outcome = self.dispatcher.dispatch(&mut self.session, event);
            self.stats.record(event.kind, &outcome);
            if let Some(text) = caption(event.kind, &outcome) {
                self.show(text);
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    pub fn note_unavailable(&mut self) {
        self.stats.unavailable += 1;
        self.labels = [GestureLabel::None; 2];
    }

    fn update_labels(&mut self, samples: &[GestureSample]) {
        self.labels = [GestureLabel::None; 2];
        for s in samples {
            trace!("{} {} {:.2}", s.handedness.name(), s.label, s.strength);
            self.labels[s.handedness.index()] = s.label;
        }
    }

    fn show(&mut self, text: &str) {
        self.message = Some((text.to_string(), Instant::now()));
    }

    /// The command message, if it is still inside its display time at `now`.
    pub fn active_message(&self, now: Instant) -> Option<&str> {
        self.message
            .as_ref()
            .filter(|(_, shown)| now.saturating_duration_since(*shown) < self.message_for)
            .map(|(text, _)| text.as_str())
    }

    pub fn label(&self, hand: Handedness) -> GestureLabel {
        self.labels[hand.index()]
    }

    pub fn volume(&self) -> f32 {
        self.session.volume().unwrap_or(self.initial_volume)
    }

    pub fn view(&self, frame: Option<&FrameSet>, source: &'static str) -> FeedbackView {
        let hands = frame
            .map(|f| f.hands.iter()
                .map(|h| HandView {
                    handedness: h.handedness(),
                    landmarks:  h.landmarks().to_vec(),
                    label:      self.label(h.handedness()),
                })
                .collect())
            .unwrap_or_default();

        let playlist = self.session.playlist();
        FeedbackView {
            hands,
            message:  self.active_message(Instant::now()).map(str::to_string),
            volume:   self.volume(),
            track:    self.session.current_track().map(track_title),
            position: (!playlist.is_empty()).then(|| (self.session.cursor() + 1, playlist.len())),
            playing:  self.session.is_playing(),
            source,
        }
    }
}

/// Message shown for a dispatched event.
fn caption(kind: EventKind, outcome: &DispatchOutcome) -> Option<&'static str> {
    match outcome {
        DispatchOutcome::TrackChanged { .. } => Some(kind.caption()),
        DispatchOutcome::Toggled { .. }      => outcome.message(),
        _ => None,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run_loop / run
// ════════════════════════════════════════════════════════════════════════════

/// Drive `app` from `source` until the stream ends or the user quits.
pub fn run_loop<P: PlaybackService, V: VolumeService>(
    app:    &mut App<P, V>,
    source: &mut dyn LandmarkSource,
    sink:   &mut dyn FeedbackSink,
) -> Result<(), SourceError> {
    let mut last: Option<FrameSet> = None;
    loop {
        if !sink.poll() {
            info!("quit requested");
            return Ok(());
        }
        match source.acquire()? {
            Acquire::Frame(frame) => {
                app.handle_frame(&frame);
                last = Some(frame);
            }
            Acquire::Unavailable => {
                app.note_unavailable();
                last = None;
            }
            Acquire::Ended => {
                info!("{} stream ended", source.name());
                return Ok(());
            }
        }
        sink.present(&app.view(last.as_ref(), source.name()));
    }
}

/// Run the full application.
///
/// Startup failures (thresholds, playlist directory, audio device, landmark
/// source, window) are returned before the loop starts.  A landmark stream
/// that breaks mid-run is returned as well; the stats are logged either way.
pub fn run(cfg: AppConfig) -> anyhow::Result<RunStats> {
    let pipeline = GesturePipeline::new(&cfg.gestures).map_err(StartupError::from)?;
    let playlist = Playlist::scan(&cfg.playlist.dir, &cfg.playlist.extensions, cfg.playlist.order)
        .map_err(StartupError::from)?;

    // ── Audio ─────────────────────────────────────────────────────────────
    let player = Player::spawn(cfg.audio.enabled, cfg.audio.initial_volume)?;

    // ── Landmark source (the simulator reads keys from the overlay) ──────
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let mut source = open_source(&cfg.source, sim_rx)?;
    let sim_keys = (cfg.source.kind == SourceKind::Sim).then_some(sim_tx);

    // ── Feedback ──────────────────────────────────────────────────────────
    let mut sink: Box<dyn FeedbackSink> = if cfg.display.window {
        Box::new(Overlay::new(sim_keys)?)
    } else {
        if sim_keys.is_some() {
            warn!("the simulator takes its keys from the overlay window; without it the run ends at once");
        }
        drop(sim_keys);
        Box::new(NullFeedback)
    };

    let mut app = App::new(&cfg, pipeline, playlist, player.clone(), player);
    info!("listening for gestures from the {} source", source.name());

    let result = run_loop(&mut app, source.as_mut(), sink.as_mut());
    info!("shutting down: {}", app.stats());
    result?;
    Ok(app.stats().clone())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
