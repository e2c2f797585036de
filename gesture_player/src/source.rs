//! Landmark sources: where hand frames come from.
//!
//! The frame loop calls [`LandmarkSource::acquire`] once per cycle.  It is the
//! only blocking call in the loop; it returns a frame, reports that this
//! cycle has none, or signals the end of the stream.  Callers don't need to
//! know whether frames come from a camera tracker, a recording, a
//! LeapMotion controller or the keyboard simulator.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use gesture_core::poses;
use gesture_core::{FrameSet, Handedness};

use crate::config::{SourceConfig, SourceKind};
use crate::error::{SourceError, StartupError};
use crate::wire::{self, Decoded};

/// Stamp spacing used when a source has no pacing of its own.
pub const DEFAULT_FRAME_MS: u64 = 33;

// ════════════════════════════════════════════════════════════════════════════
// LandmarkSource trait: unified interface for every input
// ════════════════════════════════════════════════════════════════════════════

/// Outcome of one acquisition.
#[derive(Clone, Debug, PartialEq)]
pub enum Acquire {
    Frame(FrameSet),
    /// No frame this cycle; the pipeline skips it.
    Unavailable,
    /// The stream is finished; the loop stops cleanly.
    Ended,
}

pub trait LandmarkSource {
    fn name(&self) -> &'static str;
    fn acquire(&mut self) -> Result<Acquire, SourceError>;
}

/// Build the source selected by `cfg`.  `sim_rx` carries keyboard input from
/// the overlay and is only used by the simulator.
pub fn open_source(cfg: &SourceConfig, sim_rx: Receiver<SimInput>)
    -> Result<Box<dyn LandmarkSource>, StartupError>
{
    match cfg.kind {
        SourceKind::Sim => Ok(Box::new(SimLandmarkSource::new(sim_rx, cfg.frame_interval_ms))),
        SourceKind::Tracker => Ok(Box::new(TrackerProcess::spawn(&cfg.tracker_command, &cfg.tracker_args)?)),
        SourceKind::Replay => {
            let path = cfg.replay_path.as_deref().ok_or_else(|| StartupError::Replay {
                path:   Default::default(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no replay path given"),
            })?;
            Ok(Box::new(ReplaySource::open(path, cfg.frame_interval_ms)?))
        }
        #[cfg(feature = "leap")]
        SourceKind::Leap => Ok(Box::new(LeapLandmarkSource::open()?)),
        #[cfg(not(feature = "leap"))]
        SourceKind::Leap => Err(StartupError::Unsupported("leap")),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Timestamps
// ════════════════════════════════════════════════════════════════════════════

/// Fills in timestamps for frames that arrive without one.
#[derive(Clone, Debug)]
enum Stamper {
    /// Milliseconds since the source opened.
    Receipt(Instant),
    /// Evenly spaced after the previous frame.
    Interval { next_ms: u64, step_ms: u64 },
}

impl Stamper {
    fn stamp(&mut self, given: Option<u64>) -> u64 {
        match self {
            Stamper::Receipt(start) => given.unwrap_or_else(|| start.elapsed().as_millis() as u64),
            Stamper::Interval { next_ms, step_ms } => {
                let t = given.unwrap_or(*next_ms);
                *next_ms = t.saturating_add(*step_ms);
                t
            }
        }
    }
}

/// Read and decode one JSON line.  `None` at end of stream.
///
/// A line that is not UTF-8 is an unavailable frame, not a stream failure.
fn read_frame<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>, stamper: &mut Stamper)
    -> Result<Option<Acquire>, SourceError>
{
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    let line = match std::str::from_utf8(buf) {
        Ok(text) => text.trim(),
        Err(e) => {
            debug!("frame unavailable: line is not UTF-8 ({})", e);
            return Ok(Some(Acquire::Unavailable));
        }
    };
    if line.is_empty() {
        return Ok(Some(Acquire::Unavailable));
    }
    match wire::decode_line(line) {
        Decoded::Frame(wf) => {
            let t = stamper.stamp(wf.timestamp_ms);
            Ok(Some(Acquire::Frame(wf.into_frame_set(t))))
        }
        Decoded::Unavailable(why) => {
            debug!("frame unavailable: {}", why);
            Ok(Some(Acquire::Unavailable))
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TrackerProcess: camera + hand model in a child process
// ════════════════════════════════════════════════════════════════════════════

/// External hand tracker speaking the JSON-lines format on stdout.
///
/// The process owns the camera.  It must print `READY` once the camera and
/// model are up; anything else is a startup failure.  Dropping the tracker
/// kills the process, which releases the camera.
pub struct TrackerProcess {
    child:   Child,
    stdout:  BufReader<ChildStdout>,
    buf:     Vec<u8>,
    stamper: Stamper,
}

impl TrackerProcess {
    pub fn spawn(command: &str, args: &[String]) -> Result<Self, StartupError> {
        info!("starting hand tracker: {} {}", command, args.join(" "));
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| StartupError::Tracker(format!("cannot start `{}`: {}", command, e)))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(StartupError::Tracker("tracker stdout unavailable".into()));
        };
        let mut tracker = TrackerProcess {
            child,
            stdout:  BufReader::new(stdout),
            buf:     Vec::new(),
            stamper: Stamper::Receipt(Instant::now()),
        };
        tracker.await_ready()?;
        info!("hand tracker ready");
        Ok(tracker)
    }

    fn await_ready(&mut self) -> Result<(), StartupError> {
        let mut line = String::new();
        let n = self.stdout.read_line(&mut line)
            .map_err(|e| StartupError::Tracker(format!("reading tracker output: {}", e)))?;
        if n == 0 {
            return Err(StartupError::Tracker("tracker exited before signalling READY".into()));
        }
        if line.trim() != "READY" {
            return Err(StartupError::Tracker(format!("tracker did not signal READY, got {:?}", line.trim())));
        }
        self.stamper = Stamper::Receipt(Instant::now());
        Ok(())
    }
}

impl LandmarkSource for TrackerProcess {
    fn name(&self) -> &'static str { "tracker" }

    fn acquire(&mut self) -> Result<Acquire, SourceError> {
        match read_frame(&mut self.stdout, &mut self.buf, &mut self.stamper)? {
            Some(a) => Ok(a),
            None    => Err(SourceError::Disconnected),
        }
    }
}

impl Drop for TrackerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ReplaySource: recorded JSON lines
// ════════════════════════════════════════════════════════════════════════════

/// Replays a JSON-lines recording; end of input ends the run.
pub struct ReplaySource<R> {
    reader:  R,
    buf:     Vec<u8>,
    stamper: Stamper,
    pace:    Option<Duration>,
}

impl ReplaySource<BufReader<File>> {
    pub fn open(path: &Path, frame_interval_ms: u64) -> Result<Self, StartupError> {
        let file = File::open(path).map_err(|source| StartupError::Replay {
            path: path.to_path_buf(),
            source,
        })?;
        info!("replaying {:?}", path);
        Ok(ReplaySource::new(BufReader::new(file), frame_interval_ms))
    }
}

impl<R: BufRead> ReplaySource<R> {
    /// `frame_interval_ms` paces playback; 0 replays without sleeping.
    pub fn new(reader: R, frame_interval_ms: u64) -> Self {
        let step_ms = if frame_interval_ms == 0 { DEFAULT_FRAME_MS } else { frame_interval_ms };
        ReplaySource {
            reader,
            buf:     Vec::new(),
            stamper: Stamper::Interval { next_ms: 0, step_ms },
            pace:    (frame_interval_ms > 0).then(|| Duration::from_millis(frame_interval_ms)),
        }
    }
}

impl<R: BufRead> LandmarkSource for ReplaySource<R> {
    fn name(&self) -> &'static str { "replay" }

    fn acquire(&mut self) -> Result<Acquire, SourceError> {
        if let Some(pace) = self.pace {
            thread::sleep(pace);
        }
        Ok(read_frame(&mut self.reader, &mut self.buf, &mut self.stamper)?.unwrap_or(Acquire::Ended))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SimLandmarkSource: keyboard simulation (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Raw input from the overlay window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimInput {
    /// Sweep a hand across the frame: the right hand leftward, the left
    /// hand rightward.
    Sweep(Handedness),
    /// Keys held during this poll.
    Held(SimHeld),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimHeld {
    /// Left hand forms an OK sign.
    pub ok:     bool,
    /// Right hand forms the volume pinch.
    pub pinch:  bool,
    pub widen:  bool,
    pub narrow: bool,
}

const SIM_Y:           f32   = 0.65;
const SIM_REST_X:      [f32; 2] = [0.30, 0.70];
const SWEEP_FRAMES:    usize = 8;
const SWEEP_STEP:      f32   = 0.05;
const SPAN_STEP:       f32   = 0.01;
const SPAN_MAX:        f32   = 0.45;

/// Synthesises two hands from [`SimInput`] and paces them at the configured
/// frame interval.  Frames go through the full recognition pipeline, just
/// like tracker frames.
pub struct SimLandmarkSource {
    rx:       Receiver<SimInput>,
    interval: Duration,
    started:  Instant,
    next_due: Instant,
    held:     SimHeld,
    span:     f32,
    sweeps:   [Option<usize>; 2],
}

impl SimLandmarkSource {
    pub fn new(rx: Receiver<SimInput>, frame_interval_ms: u64) -> Self {
        let ms = if frame_interval_ms == 0 { DEFAULT_FRAME_MS } else { frame_interval_ms };
        let now = Instant::now();
        SimLandmarkSource {
            rx,
            interval: Duration::from_millis(ms),
            started:  now,
            next_due: now,
            held:     SimHeld::default(),
            span:     0.20,
            sweeps:   [None; 2],
        }
    }

    /// Current simulated pinch span.
    pub fn span(&self) -> f32 {
        self.span
    }

    /// Drain pending input.  Returns false once the window side hung up.
    fn drain(&mut self) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(SimInput::Sweep(hand)) => {
                    let slot = &mut self.sweeps[hand.index()];
                    if slot.is_none() {
                        *slot = Some(0);
                    }
                }
                Ok(SimInput::Held(h)) => self.held = h,
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn synthesize(&mut self, t: u64) -> FrameSet {
        if self.held.widen {
            self.span = (self.span + SPAN_STEP).min(SPAN_MAX);
        }
        if self.held.narrow {
            self.span = (self.span - SPAN_STEP).max(0.0);
        }

        let hands = Handedness::ALL.iter().map(|&hand| {
            let rest = SIM_REST_X[hand.index()];
            let pose = match self.sweeps[hand.index()] {
                Some(k) => {
                    let dir = if hand == Handedness::Right { -1.0 } else { 1.0 };
                    let next = k + 1;
                    self.sweeps[hand.index()] = (next < SWEEP_FRAMES).then_some(next);
                    poses::open_palm(hand, rest + dir * SWEEP_STEP * k as f32, SIM_Y)
                }
                None if hand == Handedness::Left && self.held.ok => poses::ok_sign(hand, rest, SIM_Y),
                None if hand == Handedness::Right && self.held.pinch => poses::pinch(hand, rest, SIM_Y, self.span),
                None => poses::open_palm(hand, rest, SIM_Y),
            };
            pose.at(t).build()
        }).collect();

        FrameSet::new(t, hands)
    }
}

impl LandmarkSource for SimLandmarkSource {
    fn name(&self) -> &'static str { "sim" }

    fn acquire(&mut self) -> Result<Acquire, SourceError> {
        let now = Instant::now();
        if self.next_due > now {
            thread::sleep(self.next_due - now);
        }
        self.next_due += self.interval;
        if self.next_due + self.interval < Instant::now() {
            // Fell behind (window dragged, debugger); don't burst to catch up.
            self.next_due = Instant::now() + self.interval;
        }

        if !self.drain() {
            return Ok(Acquire::Ended);
        }
        let t = self.started.elapsed().as_millis() as u64;
        Ok(Acquire::Frame(self.synthesize(t)))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapLandmarkSource: real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Landmark source backed by a LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
/// Leap joints (millimetres, y up) are projected onto the 21-point image
/// layout (normalized, y down) so the same classifier applies.
#[cfg(feature = "leap")]
pub struct LeapLandmarkSource {
    connection: leaprs::Connection,
    stamper:    Stamper,
}

#[cfg(feature = "leap")]
impl LeapLandmarkSource {
    pub fn open() -> Result<Self, StartupError> {
        use leaprs::*;

        let mut connection = Connection::create(ConnectionConfig::default())
            .map_err(|e| StartupError::Tracker(format!("LeapC connection: {:?}", e)))?;
        connection.open()
            .map_err(|e| StartupError::Tracker(format!("LeapMotion device: {:?}", e)))?;
        info!("LeapMotion connection open");
        Ok(LeapLandmarkSource { connection, stamper: Stamper::Receipt(Instant::now()) })
    }
}

#[cfg(feature = "leap")]
impl LandmarkSource for LeapLandmarkSource {
    fn name(&self) -> &'static str { "leap" }

    fn acquire(&mut self) -> Result<Acquire, SourceError> {
        use gesture_core::{HandFrame, LandmarkPoint};
        use leaprs::*;

        // Interaction box mapped onto the unit image square.
        const HALF_WIDTH_MM: f32 = 200.0;
        const HEIGHT_MM:     f32 = 400.0;
        fn project(x: f32, y: f32, z: f32) -> LandmarkPoint {
            LandmarkPoint::new(0.5 + x / (2.0 * HALF_WIDTH_MM), 1.0 - y / HEIGHT_MM, z / HEIGHT_MM)
        }

        let msg = match self.connection.poll(100) {
            Ok(m)  => m,
            Err(_) => return Ok(Acquire::Unavailable),
        };
        let Event::Tracking(frame) = msg.event() else {
            return Ok(Acquire::Unavailable);
        };

        let t = self.stamper.stamp(None);
        let mut hands = Vec::new();
        for hand in frame.hands() {
            let handedness = if hand.hand_type() == HandType::Left {
                Handedness::Left
            } else {
                Handedness::Right
            };
            let digits: Vec<_> = hand.digits().collect();
            if digits.len() < 5 {
                continue;
            }
            // Base of the middle metacarpal sits at the wrist crease.
            let w = digits[2].metacarpal().prev_joint();
            let mut points = vec![project(w.x, w.y, w.z)];
            for d in &digits {
                let joints = [
                    d.proximal().prev_joint(),
                    d.intermediate().prev_joint(),
                    d.distal().prev_joint(),
                    d.distal().next_joint(),
                ];
                points.extend(joints.iter().map(|j| project(j.x, j.y, j.z)));
            }
            hands.push(HandFrame::new(handedness, points, 1.0, t));
        }
        Ok(Acquire::Frame(FrameSet::new(t, hands)))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::sync::mpsc;

    use gesture_core::{GestureConfig, GesturePipeline, EventKind};

    fn recording(frames: &[FrameSet]) -> String {
        frames.iter().map(|f| wire::encode_line(f) + "\n").collect()
    }

    #[test]
    fn replay_reads_until_end() {
        let hand = poses::ok_sign(Handedness::Left, 0.4, 0.6).at(10).build();
        let text = recording(&[FrameSet::new(10, vec![hand]), FrameSet::empty(43)]);
        let mut src = ReplaySource::new(Cursor::new(text), 0);
        assert!(matches!(src.acquire().unwrap(), Acquire::Frame(f) if f.timestamp_ms == 10 && f.hands.len() == 1));
        assert!(matches!(src.acquire().unwrap(), Acquire::Frame(f) if f.hands.is_empty()));
        assert_eq!(src.acquire().unwrap(), Acquire::Ended);
        assert_eq!(src.acquire().unwrap(), Acquire::Ended);
    }

    #[test]
    fn replay_bad_lines_are_unavailable() {
        let text = "{\"hands\":[],\"error\":\"no camera frame\"}\n\nnot json\n";
        let mut src = ReplaySource::new(Cursor::new(text), 0);
        for _ in 0..3 {
            assert_eq!(src.acquire().unwrap(), Acquire::Unavailable);
        }
        assert_eq!(src.acquire().unwrap(), Acquire::Ended);
    }

    #[test]
    fn replay_non_utf8_line_is_unavailable() {
        let mut bytes = b"{\"timestamp_ms\":0,\"hands\":[]}\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bytes.extend_from_slice(b"{\"timestamp_ms\":66,\"hands\":[]}\n");
        let mut src = ReplaySource::new(Cursor::new(bytes), 0);
        assert!(matches!(src.acquire().unwrap(), Acquire::Frame(f) if f.timestamp_ms == 0));
        assert_eq!(src.acquire().unwrap(), Acquire::Unavailable);
        assert!(matches!(src.acquire().unwrap(), Acquire::Frame(f) if f.timestamp_ms == 66));
        assert_eq!(src.acquire().unwrap(), Acquire::Ended);
    }

    #[test]
    fn replay_stamps_saturate_at_the_end_of_time() {
        let text = format!("{{\"timestamp_ms\":{},\"hands\":[]}}\n{{\"hands\":[]}}\n", u64::MAX);
        let mut src = ReplaySource::new(Cursor::new(text), 0);
        let mut stamps = Vec::new();
        while let Acquire::Frame(f) = src.acquire().unwrap() {
            stamps.push(f.timestamp_ms);
        }
        assert_eq!(stamps, vec![u64::MAX, u64::MAX]);
    }

    #[test]
    fn replay_stamps_missing_timestamps_evenly() {
        let text = "{\"hands\":[]}\n{\"hands\":[]}\n{\"timestamp_ms\":500,\"hands\":[]}\n{\"hands\":[]}\n";
        let mut src = ReplaySource::new(Cursor::new(text), 0);
        let mut stamps = Vec::new();
        while let Acquire::Frame(f) = src.acquire().unwrap() {
            stamps.push(f.timestamp_ms);
        }
        assert_eq!(stamps, vec![0, 33, 500, 533]);
    }

    #[test]
    fn replay_file_through_pipeline() {
        let frames: Vec<FrameSet> = (0..6u64)
            .map(|i| FrameSet::new(i * 33, vec![poses::ok_sign(Handedness::Left, 0.4, 0.6).at(i * 33).build()]))
            .collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(recording(&frames).as_bytes()).unwrap();

        let mut src = ReplaySource::open(file.path(), 0).unwrap();
        let mut pipeline = GesturePipeline::new(&GestureConfig::default()).unwrap();
        let mut events = Vec::new();
        while let Acquire::Frame(f) = src.acquire().unwrap() {
            events.extend(pipeline.process(&f).events);
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::TogglePlay);
    }

    #[test]
    fn missing_replay_file_is_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReplaySource::open(&dir.path().join("absent.jsonl"), 0).err();
        assert!(matches!(err, Some(StartupError::Replay { .. })));
    }

    #[test]
    fn missing_tracker_binary_is_startup_error() {
        let err = TrackerProcess::spawn("definitely-not-a-hand-tracker-binary", &[]).err();
        assert!(matches!(err, Some(StartupError::Tracker(_))));
    }

    #[test]
    fn sim_sweep_moves_right_hand_left() {
        let (tx, rx) = mpsc::channel();
        let mut src = SimLandmarkSource::new(rx, 1);
        tx.send(SimInput::Sweep(Handedness::Right)).unwrap();
        let mut xs = Vec::new();
        for _ in 0..SWEEP_FRAMES + 1 {
            let Acquire::Frame(f) = src.acquire().unwrap() else { panic!("no frame") };
            let right = f.hand(Handedness::Right).unwrap();
            xs.push(right.wrist().unwrap().x);
        }
        assert!(xs[SWEEP_FRAMES - 1] < xs[0] - 0.3);
        // Back at rest once the sweep is over.
        assert!((xs[SWEEP_FRAMES] - SIM_REST_X[1]).abs() < 1e-6);
    }

    #[test]
    fn sim_held_keys_shape_hands() {
        let (tx, rx) = mpsc::channel();
        let mut src = SimLandmarkSource::new(rx, 1);
        tx.send(SimInput::Held(SimHeld { pinch: true, widen: true, ..Default::default() })).unwrap();
        src.acquire().unwrap();
        assert!((src.span() - 0.21).abs() < 1e-6);
    }

    #[test]
    fn sim_ends_when_window_hangs_up() {
        let (tx, rx) = mpsc::channel::<SimInput>();
        let mut src = SimLandmarkSource::new(rx, 1);
        drop(tx);
        assert_eq!(src.acquire().unwrap(), Acquire::Ended);
    }
}
