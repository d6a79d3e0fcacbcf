//! Typed error hierarchy for batchforge.
//!
//! Three top-level enums cover the three places a run can fail hard:
//! - `ProgressError`: the shared progress file
//! - `RegistryError`: track configuration
//! - `OrchestratorError`: run-level failures (worktree, repository)
//!
//! Per-unit failures (missing prompt, rejected artifact, failed commit) are
//! not errors; they are reported through `BatchOutcome`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the progress store.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Progress file {path} is corrupt and will not be reset: {source}")]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to access progress file at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to lock progress file at {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize progress state: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Errors from track configuration.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown track '{code}'")]
    UnknownTrack { code: String },

    #[error("Track '{code}' is configured more than once")]
    DuplicateTrack { code: String },

    #[error("Track code '{code}' is not a valid language tag")]
    InvalidCode { code: String },

    #[error("Track '{code}' has no branch configured")]
    MissingBranch { code: String },

    #[error("Track '{code}' has an invalid batch range {first}..={last}")]
    InvalidRange { code: String, first: u32, last: u32 },

    #[error("Batch {batch} is outside the range of track '{code}' ({first}..={last})")]
    BatchOutOfRange {
        code: String,
        batch: u32,
        first: u32,
        last: u32,
    },

    #[error("No tracks configured")]
    Empty,
}

/// Errors that stop a whole run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(
        "Working tree at {path} is in use by another batchforge process; run each track from its own clone"
    )]
    WorktreeBusy { path: PathBuf },

    #[error("Not a git repository: {path}")]
    NotARepository {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("Invalid configuration: {0:#}")]
    Config(anyhow::Error),

    #[error(transparent)]
    Progress(#[from] ProgressError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// Configuration and state errors are distinguished from everything else
    /// so the binary can report them with their own exit code.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Config(_)
                | OrchestratorError::Progress(ProgressError::CorruptState { .. })
                | OrchestratorError::Registry(_)
        )
    }
}
