use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::command::{CommandOutcome, CommandRunner};

/// Version-control operations the orchestrator needs, one method each.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn checkout(&self, branch: &str) -> CommandOutcome;
    async fn stage(&self, path: &Path) -> CommandOutcome;
    async fn commit(&self, message: &str) -> CommandOutcome;
    /// True when the staged content of `path` already matches HEAD, i.e. an
    /// earlier run committed it. Any failure to tell answers false.
    async fn is_committed(&self, path: &Path) -> bool;
    async fn push(&self, branch: &str) -> CommandOutcome;
}

/// `VersionControl` backed by the git command line.
pub struct GitCli {
    runner: CommandRunner,
    repo_dir: PathBuf,
    remote: String,
    timeout: Duration,
}

impl GitCli {
    pub fn new(runner: CommandRunner, repo_dir: impl AsRef<Path>, remote: &str, timeout: Duration) -> Self {
        Self {
            runner,
            repo_dir: repo_dir.as_ref().to_path_buf(),
            remote: remote.to_string(),
            timeout,
        }
    }

    async fn git(&self, operation: &str, args: &[&str]) -> CommandOutcome {
        self.runner
            .run(operation, args, &self.repo_dir, self.timeout)
            .await
    }

    /// Paths inside the repository are staged relative to it.
    fn repo_relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.repo_dir).unwrap_or(path)
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn checkout(&self, branch: &str) -> CommandOutcome {
        self.git("checkout", &[branch]).await
    }

    async fn stage(&self, path: &Path) -> CommandOutcome {
        let relative = self.repo_relative(path).to_string_lossy().to_string();
        self.git("add", &["--", &relative]).await
    }

    async fn commit(&self, message: &str) -> CommandOutcome {
        self.git("commit", &["-m", message]).await
    }

    async fn is_committed(&self, path: &Path) -> bool {
        let relative = self.repo_relative(path).to_string_lossy().to_string();
        self.git("diff", &["--cached", "--quiet", "--", &relative])
            .await
            .succeeded
    }

    async fn push(&self, branch: &str) -> CommandOutcome {
        self.git("push", &[&self.remote, branch]).await
    }
}
