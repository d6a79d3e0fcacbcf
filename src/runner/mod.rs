//! External collaborators: subprocess execution and version control.
//!
//! - `command`: `CommandRunner`, bounded subprocess execution
//! - `vcs`: the `VersionControl` trait and its git CLI implementation
//! - `repo`: read-only repository inspection and the worktree guard

pub mod command;
pub mod repo;
pub mod vcs;

pub use command::{CommandOutcome, CommandRunner, DEFAULT_COMMAND_TIMEOUT};
pub use repo::{RepoInspector, WorktreeGuard};
pub use vcs::{GitCli, VersionControl};
