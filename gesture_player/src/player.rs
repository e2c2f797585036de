//! Audio playback thread.
//!
//! The output device lives on its own thread (rodio's output stream is not
//! `Send`).  [`Player`] is a cloneable handle that sends commands over a
//! channel and waits for the thread's answer, so load and device failures
//! come back to the dispatcher as [`ServiceError`]s.  When the last handle is
//! dropped the channel closes and the thread releases the device.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use log::{debug, info};

use gesture_core::{PlaybackService, ServiceError, VolumeService};

use crate::error::StartupError;

/// How long a handle waits for the playback thread to answer.
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

// ════════════════════════════════════════════════════════════════════════════
// PlayerCommand: sent to the playback thread
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerCommand {
    /// Replace the current track; stays paused.
    Load(PathBuf),
    Play,
    Pause,
    /// Sink gain in [0, 1].
    SetVolume(f32),
    /// Only asks for the answer.
    Status,
}

/// Every command is answered with whether audio is playing afterwards.
struct Request {
    cmd:   PlayerCommand,
    reply: Sender<Result<bool, String>>,
}

// ════════════════════════════════════════════════════════════════════════════
// AudioOut: abstraction over rodio / null (for testing and --no-audio)
// ════════════════════════════════════════════════════════════════════════════

trait AudioOut {
    fn name(&self) -> &'static str;
    fn load(&mut self, track: &Path) -> Result<(), String>;
    fn play(&mut self) -> Result<(), String>;
    fn pause(&mut self);
    fn set_volume(&mut self, level: f32);
    fn is_playing(&self) -> bool;
}

// ── rodio backend ─────────────────────────────────────────────────────────

struct RodioOut {
    // Dropping the stream closes the device.
    _stream: rodio::OutputStream,
    sink:    rodio::Sink,
    track:   Option<PathBuf>,
}

fn decode(track: &Path) -> Result<rodio::Decoder<BufReader<File>>, String> {
    let file = File::open(track)
        .map_err(|e| format!("cannot open {}: {}", track.display(), e))?;
    rodio::Decoder::new(BufReader::new(file))
        .map_err(|e| format!("cannot decode {}: {}", track.display(), e))
}

impl AudioOut for RodioOut {
    fn name(&self) -> &'static str { "rodio" }

    fn load(&mut self, track: &Path) -> Result<(), String> {
        let source = decode(track)?;
        // clear() drops the queued track and leaves the sink paused.
        self.sink.clear();
        self.sink.append(source);
        self.track = Some(track.to_path_buf());
        Ok(())
    }

    /// A track that ran out starts again from the top.
    fn play(&mut self) -> Result<(), String> {
        if self.sink.empty() {
            if let Some(track) = &self.track {
                debug!("{} finished, queueing it again", track.display());
                self.sink.append(decode(track)?);
            }
        }
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) { self.sink.pause(); }

    fn set_volume(&mut self, level: f32) {
        self.sink.set_volume(level);
    }

    fn is_playing(&self) -> bool {
        !self.sink.is_paused() && !self.sink.empty()
    }
}

// ── null backend (audio disabled) ─────────────────────────────────────────

/// Logs what would be played.  Still checks that tracks can be opened.
#[derive(Default)]
struct NullOut {
    loaded:  Option<PathBuf>,
    playing: bool,
}

impl AudioOut for NullOut {
    fn name(&self) -> &'static str { "null" }

    fn load(&mut self, track: &Path) -> Result<(), String> {
        File::open(track).map_err(|e| format!("cannot open {}: {}", track.display(), e))?;
        info!("[no audio] load {}", track.display());
        self.loaded = Some(track.to_path_buf());
        self.playing = false;
        Ok(())
    }

    fn play(&mut self) -> Result<(), String> {
        info!("[no audio] play {:?}", self.loaded);
        self.playing = self.loaded.is_some();
        Ok(())
    }

    fn pause(&mut self) {
        info!("[no audio] pause");
        self.playing = false;
    }

    fn set_volume(&mut self, level: f32) {
        debug!("[no audio] volume {:.2}", level);
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

// ════════════════════════════════════════════════════════════════════════════
// open_output
// ════════════════════════════════════════════════════════════════════════════

fn open_output(enabled: bool) -> Result<Box<dyn AudioOut>, String> {
    if !enabled {
        return Ok(Box::new(NullOut::default()));
    }
    let (stream, handle) = rodio::OutputStream::try_default()
        .map_err(|e| format!("no output device: {}", e))?;
    let sink = rodio::Sink::try_new(&handle)
        .map_err(|e| format!("cannot create sink: {}", e))?;
    sink.pause();
    Ok(Box::new(RodioOut { _stream: stream, sink, track: None }))
}

// ════════════════════════════════════════════════════════════════════════════
// Player: handle to the playback thread
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct Player {
    cmd_tx:  Sender<Request>,
    backend: &'static str,
}

impl Player {
    /// Spawn the playback thread and wait until the output device is open.
    ///
    /// With `enabled = false` the thread uses a logging null output and never
    /// touches the audio device.
    pub fn spawn(enabled: bool, initial_volume: f32) -> Result<Self, StartupError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Request>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<&'static str, String>>();

        thread::Builder::new()
            .name("player".into())
            .spawn(move || player_thread(enabled, initial_volume, cmd_rx, ready_tx))
            .map_err(|e| StartupError::Audio(format!("cannot start playback thread: {}", e)))?;

        let backend = ready_rx
            .recv()
            .map_err(|_| StartupError::Audio("playback thread exited during startup".into()))?
            .map_err(StartupError::Audio)?;
        info!("audio output: {}", backend);
        Ok(Player { cmd_tx, backend })
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    fn request(&self, cmd: PlayerCommand) -> Result<bool, String> {
        let (reply, answer) = mpsc::channel();
        self.cmd_tx
            .send(Request { cmd, reply })
            .map_err(|_| "playback thread has stopped".to_string())?;
        answer
            .recv_timeout(REPLY_TIMEOUT)
            .map_err(|_| "playback thread did not answer".to_string())?
    }
}

impl PlaybackService for Player {
    fn load(&mut self, track: &Path) -> Result<(), ServiceError> {
        self.request(PlayerCommand::Load(track.to_path_buf())).map(drop).map_err(ServiceError::playback)
    }

    fn play(&mut self) -> Result<(), ServiceError> {
        self.request(PlayerCommand::Play).map(drop).map_err(ServiceError::playback)
    }

    fn pause(&mut self) -> Result<(), ServiceError> {
        self.request(PlayerCommand::Pause).map(drop).map_err(ServiceError::playback)
    }

    fn is_playing(&mut self) -> Result<bool, ServiceError> {
        self.request(PlayerCommand::Status).map_err(ServiceError::playback)
    }
}

impl VolumeService for Player {
    fn set_volume(&mut self, level: f32) -> Result<(), ServiceError> {
        self.request(PlayerCommand::SetVolume(level)).map(drop).map_err(ServiceError::volume)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// player_thread: the actual loop
// ════════════════════════════════════════════════════════════════════════════

fn player_thread(
    enabled:        bool,
    initial_volume: f32,
    cmd_rx:         Receiver<Request>,
    ready_tx:       Sender<Result<&'static str, String>>,
) {
    let mut out = match open_output(enabled) {
        Ok(out) => out,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    out.set_volume(clamp_level(initial_volume));
    let _ = ready_tx.send(Ok(out.name()));

    for Request { cmd, reply } in cmd_rx {
        let result = match cmd {
            PlayerCommand::Load(path)   => out.load(&path),
            PlayerCommand::Play         => out.play(),
            PlayerCommand::Pause        => { out.pause(); Ok(()) }
            PlayerCommand::SetVolume(v) => { out.set_volume(clamp_level(v)); Ok(()) }
            PlayerCommand::Status       => Ok(()),
        };
        let _ = reply.send(result.map(|()| out.is_playing()));
    }
    debug!("player thread exiting");
}

fn clamp_level(v: f32) -> f32 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use gesture_core::ServiceKind;

    #[test]
    fn null_player_loads_existing_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut p = Player::spawn(false, 0.5).unwrap();
        assert_eq!(p.backend(), "null");
        assert!(p.load(file.path()).is_ok());
        assert!(p.play().is_ok());
        assert!(p.pause().is_ok());
    }

    #[test]
    fn status_follows_play_pause_and_load() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut p = Player::spawn(false, 0.5).unwrap();
        assert!(!p.is_playing().unwrap());
        p.play().unwrap();
        assert!(!p.is_playing().unwrap(), "nothing loaded yet");

        p.load(file.path()).unwrap();
        p.play().unwrap();
        assert!(p.is_playing().unwrap());
        p.pause().unwrap();
        assert!(!p.is_playing().unwrap());
        p.play().unwrap();
        p.load(file.path()).unwrap();
        assert!(!p.is_playing().unwrap());
    }

    #[test]
    fn missing_track_is_playback_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = Player::spawn(false, 0.5).unwrap();
        let err = p.load(&dir.path().join("gone.mp3")).unwrap_err();
        assert_eq!(err.service, ServiceKind::Playback);
        assert!(err.message.contains("gone.mp3"));
    }

    #[test]
    fn clones_share_one_thread() {
        let p = Player::spawn(false, 0.5).unwrap();
        let mut volume = p.clone();
        drop(p);
        assert!(volume.set_volume(0.8).is_ok());
    }

    #[test]
    fn level_clamping() {
        assert_eq!(clamp_level(1.5), 1.0);
        assert_eq!(clamp_level(-1.0), 0.0);
        assert_eq!(clamp_level(f32::NAN), 0.0);
        assert_eq!(clamp_level(0.25), 0.25);
    }
}
