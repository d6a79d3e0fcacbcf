use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::ProgressError;

/// Completed batch numbers per track code.
///
/// Serialized as a JSON object whose keys are track codes and whose values
/// are sorted arrays of batch numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressState(BTreeMap<String, BTreeSet<u32>>);

impl ProgressState {
    pub fn is_complete(&self, track: &str, batch: u32) -> bool {
        self.0.get(track).is_some_and(|set| set.contains(&batch))
    }

    /// Returns `true` if the batch was not already recorded.
    pub fn insert(&mut self, track: &str, batch: u32) -> bool {
        self.0.entry(track.to_string()).or_default().insert(batch)
    }

    pub fn ensure_track(&mut self, track: &str) {
        self.0.entry(track.to_string()).or_default();
    }

    /// Union `other` into `self`. Sets only grow.
    pub fn merge(&mut self, other: &ProgressState) {
        for (track, batches) in &other.0 {
            self.0
                .entry(track.clone())
                .or_default()
                .extend(batches.iter().copied());
        }
    }

    pub fn completed(&self, track: &str) -> BTreeSet<u32> {
        self.0.get(track).cloned().unwrap_or_default()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Durable record of completed (track, batch) units, shared between
/// processes through one JSON file.
///
/// Every write holds an exclusive lock on `<file>.lock`, re-reads the file,
/// unions it with the in-memory state and replaces the file through a
/// rename, so concurrent track processes never drop each other's
/// completions.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    lock_path: PathBuf,
    state: ProgressState,
}

impl ProgressStore {
    /// Load the progress file, creating empty entries for `known_tracks`.
    ///
    /// A missing file is an empty state. A file that exists but does not
    /// parse is `ProgressError::CorruptState`; it is never reset here.
    pub fn load(path: impl Into<PathBuf>, known_tracks: &[String]) -> Result<Self, ProgressError> {
        let path = path.into();
        let lock_path = lock_path_for(&path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ProgressError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut state = {
            let _lock = FileLock::shared(&lock_path)?;
            read_state(&path)?
        };
        for track in known_tracks {
            state.ensure_track(track);
        }

        tracing::debug!(path = %path.display(), "loaded progress state");
        Ok(Self {
            path,
            lock_path,
            state,
        })
    }

    /// Read the progress file without creating anything on disk.
    ///
    /// The shared lock is taken only when the lock file already exists.
    /// Writers replace the file by rename, so an unlocked read still sees a
    /// whole file.
    pub fn inspect(path: &Path) -> Result<ProgressState, ProgressError> {
        let lock_path = lock_path_for(path);
        let _lock = if lock_path.exists() {
            Some(FileLock::shared(&lock_path)?)
        } else {
            None
        };
        read_state(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_complete(&self, track: &str, batch: u32) -> bool {
        self.state.is_complete(track, batch)
    }

    pub fn completed(&self, track: &str) -> BTreeSet<u32> {
        self.state.completed(track)
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Record a completed unit and persist the merged state.
    ///
    /// Re-adding a recorded unit is a no-op and does not touch the file.
    pub fn mark_complete(&mut self, track: &str, batch: u32) -> Result<(), ProgressError> {
        if self.state.is_complete(track, batch) {
            return Ok(());
        }

        let _lock = FileLock::exclusive(&self.lock_path)?;
        let mut merged = read_state(&self.path)?;
        merged.merge(&self.state);
        merged.insert(track, batch);
        write_state(&self.path, &merged)?;
        self.state = merged;

        tracing::debug!(track, batch, path = %self.path.display(), "progress persisted");
        Ok(())
    }

    /// Pull in units completed by other processes since the last read.
    pub fn refresh(&mut self) -> Result<(), ProgressError> {
        let on_disk = {
            let _lock = FileLock::shared(&self.lock_path)?;
            read_state(&self.path)?
        };
        self.state.merge(&on_disk);
        Ok(())
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

fn read_state(path: &Path) -> Result<ProgressState, ProgressError> {
    if !path.exists() {
        return Ok(ProgressState::default());
    }
    let content = fs::read_to_string(path).map_err(|source| ProgressError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ProgressError::CorruptState {
        path: path.to_path_buf(),
        source,
    })
}

fn write_state(path: &Path, state: &ProgressState) -> Result<(), ProgressError> {
    let json = serde_json::to_string_pretty(state).map_err(ProgressError::Serialize)?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let io_err = |source| ProgressError::Io {
        path: tmp_path.clone(),
        source,
    };
    let mut file = File::create(&tmp_path).map_err(io_err)?;
    file.write_all(json.as_bytes()).map_err(io_err)?;
    file.write_all(b"\n").map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|source| ProgressError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Advisory lock on the sidecar lock file, released on drop.
struct FileLock {
    file: File,
}

impl FileLock {
    fn open(path: &Path) -> Result<File, ProgressError> {
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| ProgressError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    fn exclusive(path: &Path) -> Result<Self, ProgressError> {
        let file = Self::open(path)?;
        FileExt::lock_exclusive(&file).map_err(|source| ProgressError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { file })
    }

    fn shared(path: &Path) -> Result<Self, ProgressError> {
        let file = Self::open(path)?;
        FileExt::lock_shared(&file).map_err(|source| ProgressError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
