//! Control dispatcher: confirmed events → playback and volume calls.
//!
//! The dispatcher is the only writer of [`PlaybackSession`].  A failing
//! service call is logged and reported in the [`DispatchOutcome`]; the
//! session is left as it was before the call, and the next event is handled
//! normally.

use std::path::Path;

use log::{debug, info, warn};

use crate::debounce::{EventKind, GestureEvent};
use crate::error::ServiceError;
use crate::playlist::{track_title, Playlist};

// ════════════════════════════════════════════════════════════════════════════
// Service traits
// ════════════════════════════════════════════════════════════════════════════

/// Audio playback backend.
pub trait PlaybackService {
    /// Load `track`, replacing whatever was loaded.  Does not start playback.
    fn load(&mut self, track: &Path) -> Result<(), ServiceError>;
    fn play(&mut self) -> Result<(), ServiceError>;
    fn pause(&mut self) -> Result<(), ServiceError>;
    /// Whether audio is actually coming out.  False once a track has run
    /// to its end, even if nobody paused it.
    fn is_playing(&mut self) -> Result<bool, ServiceError>;
}

/// System or sink volume.
pub trait VolumeService {
    /// `level` is already clamped to [0, 1].
    fn set_volume(&mut self, level: f32) -> Result<(), ServiceError>;
}

// ════════════════════════════════════════════════════════════════════════════
// PlaybackSession
// ════════════════════════════════════════════════════════════════════════════

/// Playlist position and transport state.
#[derive(Clone, Debug, Default)]
pub struct PlaybackSession {
    playlist: Playlist,
    cursor:   usize,
    playing:  bool,
    loaded:   bool,
    volume:   Option<f32>,
}

impl PlaybackSession {
    pub fn new(playlist: Playlist) -> Self {
        PlaybackSession { playlist, ..Default::default() }
    }

    pub fn playlist(&self) -> &Playlist { &self.playlist }
    pub fn cursor(&self) -> usize { self.cursor }
    pub fn is_playing(&self) -> bool { self.playing }
    pub fn is_loaded(&self) -> bool { self.loaded }

    /// Last level successfully applied, if any.
    pub fn volume(&self) -> Option<f32> { self.volume }

    pub fn current_track(&self) -> Option<&Path> {
        self.playlist.get(self.cursor)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DispatchOutcome
// ════════════════════════════════════════════════════════════════════════════

/// What dispatching one event did.
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchOutcome {
    /// Moved to and started the track at `index`.
    TrackChanged { index: usize, title: String },
    /// Transport toggled; `playing` is the new state.
    Toggled { playing: bool },
    VolumeSet { level: f32 },
    /// Nothing to do (empty playlist).
    Ignored,
    /// The service call failed; the session is unchanged.
    Failed(ServiceError),
}

impl DispatchOutcome {
    /// On-screen feedback for the outcome, if it deserves one.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            DispatchOutcome::Toggled { playing: true }  => Some("Playing"),
            DispatchOutcome::Toggled { playing: false } => Some("Paused"),
            _ => None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ControlDispatcher
// ════════════════════════════════════════════════════════════════════════════

/// Applies [`GestureEvent`]s to a [`PlaybackSession`] through the services.
#[derive(Debug)]
pub struct ControlDispatcher<P, V> {
    playback: P,
    volume:   V,
}

impl<P: PlaybackService, V: VolumeService> ControlDispatcher<P, V> {
    pub fn new(playback: P, volume: V) -> Self {
        ControlDispatcher { playback, volume }
    }

    pub fn playback(&self) -> &P { &self.playback }
    pub fn volume(&self) -> &V { &self.volume }

    /// Load the cursor track without starting it.
    pub fn prime(&mut self, session: &mut PlaybackSession) -> DispatchOutcome {
        let Some(track) = session.current_track() else {
            info!("playlist is empty; waiting for gestures anyway");
            return DispatchOutcome::Ignored;
        };
        let title = track_title(track);
        match self.playback.load(track) {
            Ok(()) => {
                info!("loaded {:?}", title);
                session.loaded = true;
                session.playing = false;
                DispatchOutcome::TrackChanged { index: session.cursor, title }
            }
            Err(e) => failed(e),
        }
    }

    pub fn dispatch(&mut self, session: &mut PlaybackSession, event: &GestureEvent) -> DispatchOutcome {
        debug!("dispatch {:?} from {} hand at {} ms", event.kind, event.hand.name(), event.timestamp_ms);
        match event.kind {
            EventKind::NextTrack    => self.step_track(session, 1),
            EventKind::PrevTrack    => self.step_track(session, -1),
            EventKind::TogglePlay   => self.toggle(session),
            EventKind::SetVolume(v) => self.set_volume(session, v),
        }
    }

    fn step_track(&mut self, session: &mut PlaybackSession, delta: isize) -> DispatchOutcome {
        let len = session.playlist.len();
        if len == 0 {
            debug!("track change ignored: playlist is empty");
            return DispatchOutcome::Ignored;
        }
        let index = (session.cursor as isize + delta).rem_euclid(len as isize) as usize;
        let Some(track) = session.playlist.get(index) else {
            return DispatchOutcome::Ignored;
        };
        let title = track_title(track);

        let result = self.playback.load(track).and_then(|()| self.playback.play());
        match result {
            Ok(()) => {
                info!("track {}/{}: {}", index + 1, len, title);
                session.cursor = index;
                session.loaded = true;
                session.playing = true;
                DispatchOutcome::TrackChanged { index, title }
            }
            Err(e) => failed(e),
        }
    }

    fn toggle(&mut self, session: &mut PlaybackSession) -> DispatchOutcome {
        if !session.loaded {
            let Some(track) = session.current_track() else {
                debug!("toggle ignored: playlist is empty");
                return DispatchOutcome::Ignored;
            };
            if let Err(e) = self.playback.load(track) {
                return failed(e);
            }
            session.loaded = true;
        } else {
            self.sync_playing(session);
        }

        let result = if session.playing { self.playback.pause() } else { self.playback.play() };
        match result {
            Ok(()) => {
                session.playing = !session.playing;
                info!("{}", if session.playing { "playing" } else { "paused" });
                DispatchOutcome::Toggled { playing: session.playing }
            }
            Err(e) => failed(e),
        }
    }

    /// Track ends are only visible to the backend.  If it cannot say, the
    /// session keeps its own idea.
    fn sync_playing(&mut self, session: &mut PlaybackSession) {
        match self.playback.is_playing() {
            Ok(playing) if playing != session.playing => {
                debug!("session thought playing={}, backend says {}", session.playing, playing);
                session.playing = playing;
            }
            Ok(_) => {}
            Err(e) => debug!("playback state unknown, keeping playing={}: {}", session.playing, e),
        }
    }

    fn set_volume(&mut self, session: &mut PlaybackSession, level: f32) -> DispatchOutcome {
        let level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
        match self.volume.set_volume(level) {
            Ok(()) => {
                session.volume = Some(level);
                DispatchOutcome::VolumeSet { level }
            }
            Err(e) => failed(e),
        }
    }
}

fn failed(e: ServiceError) -> DispatchOutcome {
    warn!("{}", e);
    DispatchOutcome::Failed(e)
}

// ════════════════════════════════════════════════════════════════════════════
// Test doubles
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
pub mod testing {
    use std::path::PathBuf;

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        Load(PathBuf),
        Play,
        Pause,
    }

    /// Records every playback call; can be told to fail the next ones.
    ///
    /// `playing` follows play/pause/load; clear it to stand for a track that
    /// ran out.
    #[derive(Debug, Default)]
    pub struct RecordingPlayback {
        pub calls:       Vec<Call>,
        pub playing:     bool,
        pub fail_load:   bool,
        pub fail_play:   bool,
        pub fail_status: bool,
    }

    impl PlaybackService for RecordingPlayback {
        fn load(&mut self, track: &Path) -> Result<(), ServiceError> {
            if self.fail_load {
                return Err(ServiceError::playback(format!("cannot open {}", track.display())));
            }
            self.calls.push(Call::Load(track.to_path_buf()));
            self.playing = false;
            Ok(())
        }

        fn play(&mut self) -> Result<(), ServiceError> {
            if self.fail_play {
                return Err(ServiceError::playback("output device lost"));
            }
            self.calls.push(Call::Play);
            self.playing = true;
            Ok(())
        }

        fn pause(&mut self) -> Result<(), ServiceError> {
            self.calls.push(Call::Pause);
            self.playing = false;
            Ok(())
        }

        fn is_playing(&mut self) -> Result<bool, ServiceError> {
            if self.fail_status {
                return Err(ServiceError::playback("playback thread did not answer"));
            }
            Ok(self.playing)
        }
    }

    #[derive(Debug, Default)]
    pub struct RecordingVolume {
        pub levels: Vec<f32>,
        pub fail:   bool,
    }

    impl VolumeService for RecordingVolume {
        fn set_volume(&mut self, level: f32) -> Result<(), ServiceError> {
            if self.fail {
                return Err(ServiceError::volume("mixer unavailable"));
            }
            self.levels.push(level);
            Ok(())
        }
    }

    pub fn songs(names: &[&str]) -> Playlist {
        Playlist::new(names.iter().map(|n| PathBuf::from(format!("songs/{}.mp3", n))).collect())
    }

    pub fn dispatcher() -> ControlDispatcher<RecordingPlayback, RecordingVolume> {
        ControlDispatcher::new(RecordingPlayback::default(), RecordingVolume::default())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::testing::*;
    use super::*;
    use crate::landmark::Handedness;

    fn ev(kind: EventKind) -> GestureEvent {
        GestureEvent { kind, hand: Handedness::Right, timestamp_ms: 0 }
    }

    #[test]
    fn next_wraps_to_first_track() {
        let mut d = dispatcher();
        let mut s = PlaybackSession::new(songs(&["a", "b", "c"]));
        for _ in 0..3 {
            d.dispatch(&mut s, &ev(EventKind::NextTrack));
        }
        assert_eq!(s.cursor(), 0);
        assert!(s.is_playing());
        assert_eq!(d.playback().calls.last(), Some(&Call::Play));
    }

    #[test]
    fn prev_from_first_wraps_to_last() {
        let mut d = dispatcher();
        let mut s = PlaybackSession::new(songs(&["a", "b", "c"]));
        let out = d.dispatch(&mut s, &ev(EventKind::PrevTrack));
        assert_eq!(out, DispatchOutcome::TrackChanged { index: 2, title: "c".into() });
        assert_eq!(d.playback().calls[0], Call::Load(PathBuf::from("songs/c.mp3")));
    }

    #[test]
    fn empty_playlist_track_change_is_noop() {
        let mut d = dispatcher();
        let mut s = PlaybackSession::new(Playlist::default());
        assert_eq!(d.dispatch(&mut s, &ev(EventKind::NextTrack)), DispatchOutcome::Ignored);
        assert_eq!(d.dispatch(&mut s, &ev(EventKind::TogglePlay)), DispatchOutcome::Ignored);
        assert!(d.playback().calls.is_empty());
        assert_eq!(s.cursor(), 0);
    }

    #[test]
    fn prime_loads_without_playing() {
        let mut d = dispatcher();
        let mut s = PlaybackSession::new(songs(&["a", "b"]));
        d.prime(&mut s);
        assert!(s.is_loaded());
        assert!(!s.is_playing());
        assert_eq!(d.playback().calls, vec![Call::Load(PathBuf::from("songs/a.mp3"))]);
    }

    #[test]
    fn toggle_alternates_play_and_pause() {
        let mut d = dispatcher();
        let mut s = PlaybackSession::new(songs(&["a"]));
        d.prime(&mut s);
        assert_eq!(d.dispatch(&mut s, &ev(EventKind::TogglePlay)), DispatchOutcome::Toggled { playing: true });
        assert_eq!(d.dispatch(&mut s, &ev(EventKind::TogglePlay)), DispatchOutcome::Toggled { playing: false });
        assert_eq!(&d.playback().calls[1..], &[Call::Play, Call::Pause]);
    }

    #[test]
    fn toggle_after_track_ran_out_plays_again() {
        let mut d = dispatcher();
        let mut s = PlaybackSession::new(songs(&["a"]));
        d.prime(&mut s);
        d.dispatch(&mut s, &ev(EventKind::TogglePlay));
        assert!(s.is_playing());

        d.playback.playing = false;
        let out = d.dispatch(&mut s, &ev(EventKind::TogglePlay));
        assert_eq!(out, DispatchOutcome::Toggled { playing: true });
        assert_eq!(&d.playback().calls[1..], &[Call::Play, Call::Play]);
        assert!(s.is_playing());
    }

    #[test]
    fn toggle_keeps_session_state_when_backend_cannot_say() {
        let mut d = dispatcher();
        let mut s = PlaybackSession::new(songs(&["a"]));
        d.prime(&mut s);
        d.dispatch(&mut s, &ev(EventKind::TogglePlay));
        d.playback.fail_status = true;
        let out = d.dispatch(&mut s, &ev(EventKind::TogglePlay));
        assert_eq!(out, DispatchOutcome::Toggled { playing: false });
        assert_eq!(d.playback().calls.last(), Some(&Call::Pause));
    }

    #[test]
    fn toggle_without_loaded_track_loads_first() {
        let mut d = dispatcher();
        let mut s = PlaybackSession::new(songs(&["a", "b"]));
        d.dispatch(&mut s, &ev(EventKind::TogglePlay));
        assert_eq!(d.playback().calls, vec![Call::Load(PathBuf::from("songs/a.mp3")), Call::Play]);
        assert!(s.is_playing());
    }

    #[test]
    fn failed_load_leaves_cursor() {
        let mut d = dispatcher();
        let mut s = PlaybackSession::new(songs(&["a", "b"]));
        d.playback.fail_load = true;
        let out = d.dispatch(&mut s, &ev(EventKind::NextTrack));
        assert!(matches!(out, DispatchOutcome::Failed(_)));
        assert_eq!(s.cursor(), 0);
        assert!(!s.is_playing());

        // Next event proceeds normally.
        d.playback.fail_load = false;
        d.dispatch(&mut s, &ev(EventKind::NextTrack));
        assert_eq!(s.cursor(), 1);
    }

    #[test]
    fn failed_play_keeps_paused_state() {
        let mut d = dispatcher();
        let mut s = PlaybackSession::new(songs(&["a"]));
        d.prime(&mut s);
        d.playback.fail_play = true;
        let out = d.dispatch(&mut s, &ev(EventKind::TogglePlay));
        assert!(matches!(out, DispatchOutcome::Failed(ref e) if e.service == crate::error::ServiceKind::Playback));
        assert!(!s.is_playing());
    }

    #[test]
    fn volume_is_clamped() {
        let mut d = dispatcher();
        let mut s = PlaybackSession::new(Playlist::default());
        d.dispatch(&mut s, &ev(EventKind::SetVolume(1.7)));
        d.dispatch(&mut s, &ev(EventKind::SetVolume(-0.2)));
        d.dispatch(&mut s, &ev(EventKind::SetVolume(f32::NAN)));
        assert_eq!(d.volume().levels, vec![1.0, 0.0, 0.0]);
        assert_eq!(s.volume(), Some(0.0));
    }

    #[test]
    fn volume_failure_keeps_last_level() {
        let mut d = dispatcher();
        let mut s = PlaybackSession::new(Playlist::default());
        d.dispatch(&mut s, &ev(EventKind::SetVolume(0.3)));
        d.volume.fail = true;
        let out = d.dispatch(&mut s, &ev(EventKind::SetVolume(0.9)));
        assert!(matches!(out, DispatchOutcome::Failed(_)));
        assert_eq!(s.volume(), Some(0.3));
    }
}
