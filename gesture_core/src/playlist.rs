//! Playlist provider: audio files enumerated once at startup.

use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::PlaylistError;

/// How enumerated tracks are ordered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistOrder {
    /// By file name.
    #[default]
    Sorted,
    /// As the directory listing returns them.
    Directory,
}

/// Ordered list of track paths.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Playlist {
    tracks: Vec<PathBuf>,
}

impl Playlist {
    pub fn new(tracks: Vec<PathBuf>) -> Self {
        Playlist { tracks }
    }

    /// Enumerate files in `dir` whose extension (case-insensitive) is one of
    /// `extensions`.
    ///
    /// A missing directory yields an empty playlist with a warning; any other
    /// read failure is an error.
    pub fn scan(dir: &Path, extensions: &[String], order: PlaylistOrder)
        -> Result<Playlist, PlaylistError>
    {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("playlist directory {:?} does not exist", dir);
                return Ok(Playlist::default());
            }
            Err(source) => return Err(PlaylistError { dir: dir.to_path_buf(), source }),
        };

        let mut tracks = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PlaylistError { dir: dir.to_path_buf(), source })?;
            let path = entry.path();
            if path.is_file() && has_extension(&path, extensions) {
                tracks.push(path);
            }
        }
        if order == PlaylistOrder::Sorted {
            tracks.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        }
        Ok(Playlist { tracks })
    }

    pub fn len(&self) -> usize { self.tracks.len() }
    pub fn is_empty(&self) -> bool { self.tracks.is_empty() }

    pub fn get(&self, i: usize) -> Option<&Path> {
        self.tracks.get(i).map(PathBuf::as_path)
    }

    pub fn tracks(&self) -> &[PathBuf] {
        &self.tracks
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| extensions.iter().any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Display name for a track path.
pub fn track_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
