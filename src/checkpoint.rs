//! The suspension point between emitting a prompt and validating its
//! artifact.
//!
//! Waiting is an explicit task boundary: the processor hands the unit to an
//! `ArtifactWaiter` and resumes on its verdict. The console waiter is the
//! interactive checkpoint; the poll waiter resumes as soon as the artifact
//! appears on disk, which lets an out-of-process generator drive the run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use console::style;
use dialoguer::{Select, theme::ColorfulTheme};
use std::time::Duration;

use crate::settings::CheckpointMode;
use crate::track::BatchUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Resume: the artifact should now be at its expected path.
    Ready,
    /// The operator chose to stop this track.
    Abandoned,
    /// The configured poll timeout elapsed.
    TimedOut,
}

#[async_trait]
pub trait ArtifactWaiter: Send + Sync {
    async fn wait_for(&self, unit: &BatchUnit) -> Result<WaitOutcome>;
}

/// Asks the operator on the terminal.
pub struct ConsoleCheckpoint;

#[async_trait]
impl ArtifactWaiter for ConsoleCheckpoint {
    async fn wait_for(&self, unit: &BatchUnit) -> Result<WaitOutcome> {
        println!();
        println!(
            "  {} {}",
            style("Prompt:").bold(),
            style(unit.prompt_path.display()).cyan()
        );
        println!(
            "  {} {}",
            style("Save output to:").bold(),
            style(unit.output_path.display()).cyan()
        );

        let selection = tokio::task::spawn_blocking(|| {
            let options = &["Yes, validate and commit it", "Stop this track"];
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Artifact ready?")
                .items(options)
                .default(0)
                .interact()
        })
        .await
        .context("Console checkpoint task failed")?
        .context("Failed to read console input")?;

        match selection {
            0 => Ok(WaitOutcome::Ready),
            _ => Ok(WaitOutcome::Abandoned),
        }
    }
}

/// Polls the expected output path.
///
/// The artifact counts as ready once it exists and its size is unchanged
/// across two consecutive polls, so a generator still writing it is not
/// interrupted.
pub struct PollCheckpoint {
    pub interval: Duration,
    /// None waits indefinitely.
    pub timeout: Option<Duration>,
}

#[async_trait]
impl ArtifactWaiter for PollCheckpoint {
    async fn wait_for(&self, unit: &BatchUnit) -> Result<WaitOutcome> {
        let started = tokio::time::Instant::now();
        let mut last_size = None;
        loop {
            let size = std::fs::metadata(&unit.output_path).ok().map(|m| m.len());
            if settled(last_size, size) {
                return Ok(WaitOutcome::Ready);
            }
            last_size = size;
            if let Some(limit) = self.timeout
                && started.elapsed() >= limit
            {
                return Ok(WaitOutcome::TimedOut);
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

fn settled(previous: Option<u64>, current: Option<u64>) -> bool {
    current.is_some() && previous == current
}

/// Resumes at once; the artifact must already exist.
pub struct ImmediateCheckpoint;

#[async_trait]
impl ArtifactWaiter for ImmediateCheckpoint {
    async fn wait_for(&self, _unit: &BatchUnit) -> Result<WaitOutcome> {
        Ok(WaitOutcome::Ready)
    }
}

pub fn waiter_for(
    mode: CheckpointMode,
    poll_interval: Duration,
    poll_timeout: Option<Duration>,
) -> Box<dyn ArtifactWaiter> {
    match mode {
        CheckpointMode::Console => Box::new(ConsoleCheckpoint),
        CheckpointMode::Poll => Box::new(PollCheckpoint {
            interval: poll_interval,
            timeout: poll_timeout,
        }),
        CheckpointMode::Immediate => Box::new(ImmediateCheckpoint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn unit_at(output: PathBuf) -> BatchUnit {
        BatchUnit {
            track: "en".into(),
            batch: 1,
            prompt_path: PathBuf::from("prompt.md"),
            output_path: output,
        }
    }

    #[tokio::test]
    async fn test_poll_returns_when_artifact_appears() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("batch_001.json");
        let unit = unit_at(output.clone());

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            std::fs::write(output, "[]").unwrap();
        });

        let waiter = PollCheckpoint {
            interval: Duration::from_millis(10),
            timeout: Some(Duration::from_secs(5)),
        };
        assert_eq!(waiter.wait_for(&unit).await.unwrap(), WaitOutcome::Ready);
        writer.await.unwrap();
    }

    #[test]
    fn test_settled_needs_two_equal_sizes() {
        assert!(!settled(None, None));
        assert!(!settled(None, Some(12)));
        assert!(!settled(Some(4), Some(12)));
        assert!(settled(Some(12), Some(12)));
    }

    #[tokio::test]
    async fn test_poll_waits_for_growing_artifact_to_settle() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("batch_001.json");
        std::fs::write(&output, "[").unwrap();
        let unit = unit_at(output.clone());

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            std::fs::write(output, "[1, 2, 3]").unwrap();
        });

        // the first poll only records the partial size
        let waiter = PollCheckpoint {
            interval: Duration::from_millis(100),
            timeout: Some(Duration::from_secs(5)),
        };
        assert_eq!(waiter.wait_for(&unit).await.unwrap(), WaitOutcome::Ready);
        writer.await.unwrap();
        assert_eq!(std::fs::read_to_string(&unit.output_path).unwrap(), "[1, 2, 3]");
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let dir = tempdir().unwrap();
        let unit = unit_at(dir.path().join("never.json"));
        let waiter = PollCheckpoint {
            interval: Duration::from_millis(10),
            timeout: Some(Duration::from_millis(50)),
        };
        assert_eq!(waiter.wait_for(&unit).await.unwrap(), WaitOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_immediate_always_ready() {
        let unit = unit_at(PathBuf::from("/does/not/exist.json"));
        assert_eq!(
            ImmediateCheckpoint.wait_for(&unit).await.unwrap(),
            WaitOutcome::Ready
        );
    }
}
