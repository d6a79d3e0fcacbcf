//! Observable "awaiting artifact" state.
//!
//! While a unit is suspended at the checkpoint, a small JSON marker is kept
//! at `<state_dir>/awaiting/<track>.json`. It is removed when the wait
//! ends, whatever the outcome. One file per track keeps concurrent track
//! processes from contending on it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::track::BatchUnit;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AwaitingMarker {
    pub track: String,
    pub batch: u32,
    pub prompt: PathBuf,
    pub output: PathBuf,
    pub since: DateTime<Utc>,
}

impl AwaitingMarker {
    pub fn for_unit(unit: &BatchUnit) -> Self {
        Self {
            track: unit.track.clone(),
            batch: unit.batch,
            prompt: unit.prompt_path.clone(),
            output: unit.output_path.clone(),
            since: Utc::now(),
        }
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.since
    }
}

pub struct MarkerDir {
    dir: PathBuf,
}

impl MarkerDir {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("awaiting"),
        }
    }

    fn path_for(&self, track: &str) -> PathBuf {
        self.dir.join(format!("{}.json", track))
    }

    pub fn write(&self, marker: &AwaitingMarker) -> Result<()> {
        fs::create_dir_all(&self.dir).context("Failed to create awaiting marker directory")?;
        let json = serde_json::to_string_pretty(marker).context("Failed to serialize marker")?;
        fs::write(self.path_for(&marker.track), json).context("Failed to write awaiting marker")?;
        Ok(())
    }

    pub fn clear(&self, track: &str) -> Result<()> {
        let path = self.path_for(track);
        if path.exists() {
            fs::remove_file(&path).context("Failed to remove awaiting marker")?;
        }
        Ok(())
    }

    /// Read a track's marker. Unreadable markers are treated as absent; they
    /// carry no state the run depends on.
    pub fn read(&self, track: &str) -> Option<AwaitingMarker> {
        let content = fs::read_to_string(self.path_for(track)).ok()?;
        serde_json::from_str(&content).ok()
    }
}
