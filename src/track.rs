//! Track definitions, the track registry, and batch unit paths.
//!
//! This module provides:
//! - `Track`: one content lane with its branch and batch range
//! - `TrackRegistry`: validated, ordered lookup over configured tracks
//! - `BatchUnit`: a (track, batch) pair with its derived artifact paths
//! - `ArtifactLayout`: the naming convention for prompts and outputs

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::errors::RegistryError;

static TRACK_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2,3}(-[A-Za-z0-9]{2,8})*$").expect("track code pattern is valid")
});

/// One independently progressed content lane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    /// Short language tag (e.g. "en", "pt-BR")
    pub code: String,
    /// Human-readable name
    pub name: String,
    /// Branch that receives this track's commits
    pub branch: String,
    pub first_batch: u32,
    pub last_batch: u32,
}

impl Track {
    pub fn new(code: &str, name: &str, branch: &str, first_batch: u32, last_batch: u32) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            branch: branch.to_string(),
            first_batch,
            last_batch,
        }
    }

    pub fn batches(&self) -> RangeInclusive<u32> {
        self.first_batch..=self.last_batch
    }

    pub fn contains(&self, batch: u32) -> bool {
        self.batches().contains(&batch)
    }

    pub fn batch_count(&self) -> usize {
        self.batches().count()
    }

    pub fn check_batch(&self, batch: u32) -> Result<(), RegistryError> {
        if self.contains(batch) {
            Ok(())
        } else {
            Err(RegistryError::BatchOutOfRange {
                code: self.code.clone(),
                batch,
                first: self.first_batch,
                last: self.last_batch,
            })
        }
    }

    fn validate(&self) -> Result<(), RegistryError> {
        if !TRACK_CODE.is_match(&self.code) {
            return Err(RegistryError::InvalidCode {
                code: self.code.clone(),
            });
        }
        if self.branch.trim().is_empty() {
            return Err(RegistryError::MissingBranch {
                code: self.code.clone(),
            });
        }
        if self.first_batch == 0 || self.first_batch > self.last_batch {
            return Err(RegistryError::InvalidRange {
                code: self.code.clone(),
                first: self.first_batch,
                last: self.last_batch,
            });
        }
        Ok(())
    }
}

/// Static, validated track configuration in configured order.
#[derive(Debug, Clone)]
pub struct TrackRegistry {
    tracks: Vec<Track>,
}

impl TrackRegistry {
    pub fn new(tracks: Vec<Track>) -> Result<Self, RegistryError> {
        if tracks.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = HashSet::new();
        for track in &tracks {
            track.validate()?;
            if !seen.insert(track.code.as_str()) {
                return Err(RegistryError::DuplicateTrack {
                    code: track.code.clone(),
                });
            }
        }
        Ok(Self { tracks })
    }

    pub fn list_tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get_track(&self, code: &str) -> Result<&Track, RegistryError> {
        self.tracks
            .iter()
            .find(|t| t.code == code)
            .ok_or_else(|| RegistryError::UnknownTrack {
                code: code.to_string(),
            })
    }

    pub fn codes(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.code.clone()).collect()
    }
}

/// Naming convention for input prompts and output artifacts.
///
/// Patterns use `{track}` and `{batch}` placeholders and are resolved
/// against the project directory.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    pub root: PathBuf,
    pub prompt_pattern: String,
    pub output_pattern: String,
    pub batch_width: usize,
}

impl ArtifactLayout {
    pub fn new(
        root: impl AsRef<Path>,
        prompt_pattern: &str,
        output_pattern: &str,
        batch_width: usize,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            prompt_pattern: prompt_pattern.to_string(),
            output_pattern: output_pattern.to_string(),
            batch_width,
        }
    }

    pub fn unit(&self, track: &Track, batch: u32) -> BatchUnit {
        BatchUnit {
            track: track.code.clone(),
            batch,
            prompt_path: self.resolve(&self.prompt_pattern, &track.code, batch),
            output_path: self.resolve(&self.output_pattern, &track.code, batch),
        }
    }

    pub fn padded(&self, batch: u32) -> String {
        format!("{:0width$}", batch, width = self.batch_width)
    }

    fn resolve(&self, pattern: &str, code: &str, batch: u32) -> PathBuf {
        let relative = pattern
            .replace("{track}", code)
            .replace("{batch}", &self.padded(batch));
        self.root.join(relative)
    }
}

/// One numbered unit of work within a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchUnit {
    pub track: String,
    pub batch: u32,
    pub prompt_path: PathBuf,
    pub output_path: PathBuf,
}

impl BatchUnit {
    /// First and last item index covered by this batch (1-based, inclusive).
    pub fn item_range(&self, items_per_batch: u32) -> (u32, u32) {
        let start = (self.batch - 1) * items_per_batch + 1;
        let end = self.batch * items_per_batch;
        (start, end)
    }

    pub fn commit_message(&self, items_per_batch: u32, batch_width: usize) -> String {
        let (start, end) = self.item_range(items_per_batch);
        format!(
            "{}: batch {:0width$} (items {}-{})",
            self.track,
            self.batch,
            start,
            end,
            width = batch_width
        )
    }
}

impl std::fmt::Display for BatchUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.track, self.batch)
    }
}
