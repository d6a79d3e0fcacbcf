use fs2::FileExt;
use git2::{BranchType, Repository};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::errors::OrchestratorError;

/// Read-only view of the working tree's repository, used for preflight
/// checks and status reporting. Mutations go through `VersionControl`.
pub struct RepoInspector {
    repo: Repository,
}

impl RepoInspector {
    pub fn open(project_dir: &Path) -> Result<Self, OrchestratorError> {
        let repo = Repository::discover(project_dir).map_err(|source| {
            OrchestratorError::NotARepository {
                path: project_dir.to_path_buf(),
                source,
            }
        })?;
        Ok(Self { repo })
    }

    /// Name of the checked-out branch (None when detached).
    pub fn current_branch(&self) -> Option<String> {
        let head = self.repo.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        head.shorthand().map(|s| s.to_string())
    }

    /// Get current HEAD SHA (returns None for unborn branches)
    pub fn head_sha(&self) -> Option<String> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
            .map(|c| c.id().to_string())
    }

    pub fn has_local_branch(&self, name: &str) -> bool {
        self.repo.find_branch(name, BranchType::Local).is_ok()
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }
}

/// Exclusive claim on a working tree for the lifetime of a run.
///
/// Two processes checking out different branches in one working tree would
/// corrupt each other's commits; the second one fails fast instead.
#[derive(Debug)]
pub struct WorktreeGuard {
    file: File,
    path: PathBuf,
}

impl WorktreeGuard {
    pub fn acquire(state_dir: &Path, worktree: &Path) -> Result<Self, OrchestratorError> {
        fs::create_dir_all(state_dir).map_err(|e| {
            anyhow::anyhow!("Failed to create state directory {}: {}", state_dir.display(), e)
        })?;
        let path = state_dir.join("worktree.lock");
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", path.display(), e))?;

        file.try_lock_exclusive()
            .map_err(|_| OrchestratorError::WorktreeBusy {
                path: worktree.to_path_buf(),
            })?;

        tracing::debug!(lock = %path.display(), "acquired worktree lock");
        Ok(Self { file, path })
    }
}

impl Drop for WorktreeGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        tracing::debug!(lock = %self.path.display(), "released worktree lock");
    }
}
