//! # gesture_player
//!
//! Hand-gesture controller for a local music playlist, with audio playback
//! through rodio and a minifb overlay.
//!
//! ## Gesture → Action mapping
//!
//! | Gesture | Hand | Action |
//! |---|---|---|
//! | Wave leftward | Right | Next song (wraps to the first) |
//! | Wave rightward | Left | Previous song (wraps to the last) |
//! | OK sign (thumb + index touch, others up) | Either | Play / pause |
//! | Pinch (thumb–index span) | Right | Volume, continuously |
//!
//! ## Landmark sources
//!
//! * `sim` (default): keyboard shortcuts in the overlay window synthesise
//!   hands that run through the full recognition pipeline.
//! * `tracker`: an external camera + hand-model process printing JSON lines.
//! * `replay`: a recorded JSON-lines file.
//! * `leap` (feature `leap`): a LeapMotion controller via LeapC.
//!
//! ### Simulation keyboard shortcuts
//!
//! | Key | Gesture |
//! |---|---|
//! | `Left` | Right hand waves leftward (next) |
//! | `Right` | Left hand waves rightward (previous) |
//! | `O` (hold) | Left hand OK sign (play/pause) |
//! | `P` (hold) + `Up`/`Down` | Right hand pinch, widen / narrow |
//! | `Q` | Quit |

use std::path::PathBuf;

use clap::Parser;

pub mod app;
pub mod config;
pub mod error;
pub mod overlay;
pub mod player;
pub mod source;
pub mod wire;

use config::SourceKind;

/// Command-line flags.  Anything not given falls back to the config file.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "gesture_player", version, about = "Control a music playlist with hand gestures")]
pub struct Cli {
    /// Config file (default: ./gesture_player.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the songs
    #[arg(short, long)]
    pub songs: Option<PathBuf>,

    /// Landmark source
    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,

    /// Replay a recorded JSON-lines landmark file (implies --source replay)
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Hand tracker command line, e.g. "python3 hand_tracker.py"
    #[arg(long)]
    pub tracker_cmd: Option<String>,

    /// Run without the overlay window
    #[arg(long)]
    pub headless: bool,

    /// Log playback instead of opening the audio device
    #[arg(long)]
    pub no_audio: bool,

    /// Ignore the config file and use built-in defaults
    #[arg(long)]
    pub quick: bool,
}
