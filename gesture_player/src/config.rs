//! Player configuration: `gesture_player.toml` plus command-line overrides.
//!
//! Precedence is CLI flags > config file > defaults.  A missing default
//! config file is not an error; a file named with `--config` must exist.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use gesture_core::{GestureConfig, PlaylistOrder};

use crate::Cli;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "gesture_player.toml";

// ════════════════════════════════════════════════════════════════════════════
// Sections
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    pub dir:        PathBuf,
    /// Accepted file extensions, without the dot.
    pub extensions: Vec<String>,
    pub order:      PlaylistOrder,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        PlaylistConfig {
            dir:        PathBuf::from("songs"),
            extensions: vec!["mp3".to_string()],
            order:      PlaylistOrder::Sorted,
        }
    }
}

/// Where landmark frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Keyboard-driven synthetic hands.
    Sim,
    /// External hand-tracking process printing JSON lines.
    Tracker,
    /// Recorded JSON-lines file.
    Replay,
    /// LeapMotion controller (needs the `leap` feature).
    Leap,
}

impl SourceKind {
    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Sim     => "sim",
            SourceKind::Tracker => "tracker",
            SourceKind::Replay  => "replay",
            SourceKind::Leap    => "leap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind:              SourceKind,
    pub tracker_command:   String,
    pub tracker_args:      Vec<String>,
    pub replay_path:       Option<PathBuf>,
    /// Frame pacing for the simulator and for replays; 0 replays as fast
    /// as possible.
    pub frame_interval_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            kind:              SourceKind::Sim,
            tracker_command:   "python3".to_string(),
            tracker_args:      vec!["hand_tracker.py".to_string()],
            replay_path:       None,
            frame_interval_ms: 33,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Open the overlay window.
    pub window:              bool,
    /// How long a command message stays on screen.
    pub message_duration_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig { window: true, message_duration_ms: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// When false, playback calls are logged instead of played.
    pub enabled:        bool,
    pub initial_volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig { enabled: true, initial_volume: 0.5 }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gestures: GestureConfig,
    pub playlist: PlaylistConfig,
    pub source:   SourceConfig,
    pub display:  DisplayConfig,
    pub audio:    AudioConfig,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Resolve the effective configuration for one run.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut cfg = if cli.quick {
            AppConfig::default()
        } else if let Some(path) = &cli.config {
            Self::from_file(path)?
        } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
        } else {
            AppConfig::default()
        };
        cfg.apply_cli(cli);
        Ok(cfg)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(dir) = &cli.songs {
            self.playlist.dir = dir.clone();
        }
        if let Some(kind) = cli.source {
            self.source.kind = kind;
        }
        if let Some(path) = &cli.replay {
            self.source.replay_path = Some(path.clone());
            if cli.source.is_none() {
                self.source.kind = SourceKind::Replay;
            }
        }
        if let Some(cmd) = &cli.tracker_cmd {
            let mut words = cmd.split_whitespace().map(str::to_string);
            if let Some(program) = words.next() {
                self.source.tracker_command = program;
                self.source.tracker_args = words.collect();
            }
        }
        if cli.headless {
            self.display.window = false;
        }
        if cli.no_audio {
            self.audio.enabled = false;
        }
    }
}
