use std::time::Duration;

use crate::batch::{BatchOutcome, BatchProcessor};
use crate::errors::{OrchestratorError, RegistryError};
use crate::settings::{FailurePolicy, SmokeSection};
use crate::track::{Track, TrackRegistry};

use super::report::{RunReport, TrackReport, TrackStatus};

/// Drives tracks through the batch processor.
///
/// The orchestrator owns the run-level decisions: which track and batch
/// comes next, when to check out and push, how to react to a failing
/// track. Everything about a single unit lives in `BatchProcessor`.
pub struct Orchestrator {
    registry: TrackRegistry,
    processor: BatchProcessor,
    policy: FailurePolicy,
    unit_delay: Duration,
    smoke: SmokeSection,
}

/// Whether the full-automation pacing applies to a track run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pacing {
    Immediate,
    Delayed,
}

impl Orchestrator {
    pub fn new(registry: TrackRegistry, processor: BatchProcessor) -> Self {
        Self {
            registry,
            processor,
            policy: FailurePolicy::default(),
            unit_delay: Duration::ZERO,
            smoke: SmokeSection::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_unit_delay(mut self, delay: Duration) -> Self {
        self.unit_delay = delay;
        self
    }

    pub fn with_smoke(mut self, smoke: SmokeSection) -> Self {
        self.smoke = smoke;
        self
    }

    pub fn processor(&self) -> &BatchProcessor {
        &self.processor
    }

    /// Run one track's full range on its branch, then push.
    ///
    /// Stops at the first failing unit; later batches are left for the next
    /// run. Already-completed batches are skipped without side effects.
    pub async fn run_track(&mut self, code: &str) -> Result<TrackReport, OrchestratorError> {
        let track = self.registry.get_track(code)?.clone();
        self.drive_track(&track, Pacing::Immediate).await
    }

    /// Run every configured track in order under the failure policy.
    pub async fn run_all(&mut self) -> Result<RunReport, OrchestratorError> {
        let tracks = self.registry.list_tracks().to_vec();
        let mut report = RunReport::default();

        for (index, track) in tracks.iter().enumerate() {
            let track_report = self.drive_track(track, Pacing::Delayed).await?;
            let failed = !track_report.succeeded();
            report.tracks.push(track_report);

            if failed && self.policy == FailurePolicy::Abort {
                tracing::warn!(track = %track.code, policy = %self.policy, "aborting run");
                report
                    .tracks
                    .extend(tracks[index + 1..].iter().map(|t| TrackReport::not_run(&t.code)));
                break;
            }
        }

        Ok(report)
    }

    /// Check out the smoke track and process exactly one batch. No push.
    pub async fn run_smoke(&mut self) -> Result<TrackReport, OrchestratorError> {
        let track = match &self.smoke.track {
            Some(code) => self.registry.get_track(code)?.clone(),
            None => self
                .registry
                .list_tracks()
                .first()
                .cloned()
                .ok_or(RegistryError::Empty)?,
        };
        let batch = self.smoke.batch.unwrap_or(track.first_batch);
        track.check_batch(batch)?;

        tracing::info!(track = %track.code, batch, "smoke run");
        if let Some(reason) = self.checkout(&track).await {
            return Ok(TrackReport::new(
                &track.code,
                TrackStatus::CheckoutFailed { reason },
            ));
        }

        let status = match self.processor.process_batch(&track, batch).await? {
            BatchOutcome::Completed => TrackStatus::Completed {
                completed: 1,
                skipped: 0,
            },
            BatchOutcome::AlreadyComplete => TrackStatus::Completed {
                completed: 0,
                skipped: 1,
            },
            BatchOutcome::Failed(failure) => TrackStatus::UnitFailed { batch, failure },
        };
        Ok(TrackReport::new(&track.code, status))
    }

    async fn drive_track(
        &mut self,
        track: &Track,
        pacing: Pacing,
    ) -> Result<TrackReport, OrchestratorError> {
        tracing::info!(
            track = %track.code,
            name = %track.name,
            branch = %track.branch,
            first = track.first_batch,
            last = track.last_batch,
            "starting track"
        );

        if let Some(reason) = self.checkout(track).await {
            return Ok(TrackReport::new(
                &track.code,
                TrackStatus::CheckoutFailed { reason },
            ));
        }

        let mut completed = 0;
        let mut skipped = 0;
        for batch in track.batches() {
            // another process may have finished units on a sibling track
            self.processor.progress_mut().refresh()?;

            match self.processor.process_batch(track, batch).await? {
                BatchOutcome::AlreadyComplete => skipped += 1,
                BatchOutcome::Completed => {
                    completed += 1;
                    if pacing == Pacing::Delayed && !self.unit_delay.is_zero() {
                        tokio::time::sleep(self.unit_delay).await;
                    }
                }
                BatchOutcome::Failed(failure) => {
                    tracing::warn!(
                        track = %track.code,
                        batch,
                        "track stopped; rerun to resume from batch {}",
                        batch
                    );
                    return Ok(TrackReport::new(
                        &track.code,
                        TrackStatus::UnitFailed { batch, failure },
                    ));
                }
            }
        }

        let mut report = TrackReport::new(&track.code, TrackStatus::Completed { completed, skipped });
        report.pushed = self.push(track).await;
        tracing::info!(track = %track.code, completed, skipped, pushed = report.pushed, "track finished");
        Ok(report)
    }

    /// Returns the failure reason, if any.
    async fn checkout(&self, track: &Track) -> Option<String> {
        let outcome = self.processor.vcs().checkout(&track.branch).await;
        if outcome.succeeded {
            None
        } else {
            let reason = outcome.diagnostic().to_string();
            tracing::error!(track = %track.code, branch = %track.branch, "checkout failed: {}", reason);
            Some(reason)
        }
    }

    async fn push(&self, track: &Track) -> bool {
        let outcome = self.processor.vcs().push(&track.branch).await;
        if !outcome.succeeded {
            tracing::warn!(
                track = %track.code,
                branch = %track.branch,
                "push failed, commits remain local: {}",
                outcome.diagnostic()
            );
        }
        outcome.succeeded
    }
}
