use crate::checkpoint::{ArtifactWaiter, ConsoleCheckpoint, WaitOutcome};
use crate::errors::OrchestratorError;
use crate::progress::{AwaitingMarker, MarkerDir, ProgressStore};
use crate::runner::VersionControl;
use crate::settings::ValidationSection;
use crate::track::{ArtifactLayout, BatchUnit, Track};
use crate::validate::{ExpectedShape, ShapeValidator, Validator};

/// The workflow step a unit failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStep {
    LocatePrompt,
    AwaitArtifact,
    Validate,
    Stage,
    Commit,
}

impl std::fmt::Display for BatchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStep::LocatePrompt => write!(f, "locate prompt"),
            BatchStep::AwaitArtifact => write!(f, "await artifact"),
            BatchStep::Validate => write!(f, "validate"),
            BatchStep::Stage => write!(f, "stage"),
            BatchStep::Commit => write!(f, "commit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub step: BatchStep,
    pub reason: String,
}

impl std::fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.step, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Recorded in the progress file before this call; nothing was run.
    AlreadyComplete,
    /// Validated and recorded by this call. Committed too, unless an
    /// earlier run committed it but never recorded it.
    Completed,
    /// Stopped at `step`; progress untouched, safe to retry.
    Failed(BatchFailure),
}

impl BatchOutcome {
    /// True when the unit needs no further work.
    pub fn is_handled(&self) -> bool {
        !matches!(self, BatchOutcome::Failed(_))
    }
}

/// Runs one (track, batch) unit from prompt to recorded commit.
pub struct BatchProcessor {
    layout: ArtifactLayout,
    progress: ProgressStore,
    vcs: Box<dyn VersionControl>,
    validator: Box<dyn Validator>,
    waiter: Box<dyn ArtifactWaiter>,
    markers: Option<MarkerDir>,
    shape: ExpectedShape,
    items_per_batch: u32,
}

impl BatchProcessor {
    /// Defaults: `ShapeValidator`, console checkpoint, default shape, no
    /// awaiting markers.
    pub fn new(
        layout: ArtifactLayout,
        progress: ProgressStore,
        vcs: Box<dyn VersionControl>,
    ) -> Self {
        let validation = ValidationSection::default();
        Self {
            layout,
            progress,
            vcs,
            validator: Box::new(ShapeValidator),
            waiter: Box::new(ConsoleCheckpoint),
            markers: None,
            shape: validation.expected_shape(),
            items_per_batch: validation.items_per_batch,
        }
    }

    pub fn with_validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_waiter(mut self, waiter: Box<dyn ArtifactWaiter>) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn with_shape(mut self, shape: ExpectedShape, items_per_batch: u32) -> Self {
        self.shape = shape;
        self.items_per_batch = items_per_batch;
        self
    }

    pub fn with_markers(mut self, markers: MarkerDir) -> Self {
        self.markers = Some(markers);
        self
    }

    pub fn vcs(&self) -> &dyn VersionControl {
        self.vcs.as_ref()
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn progress_mut(&mut self) -> &mut ProgressStore {
        &mut self.progress
    }

    /// Process one unit.
    ///
    /// Unit-level problems come back as `BatchOutcome::Failed`. `Err` means
    /// the run cannot continue: the batch is outside the track's range or
    /// the progress file could not be written.
    pub async fn process_batch(
        &mut self,
        track: &Track,
        batch: u32,
    ) -> Result<BatchOutcome, OrchestratorError> {
        track.check_batch(batch)?;

        if self.progress.is_complete(&track.code, batch) {
            tracing::info!(track = %track.code, batch, "already completed, skipping");
            return Ok(BatchOutcome::AlreadyComplete);
        }

        let unit = self.layout.unit(track, batch);
        if !unit.prompt_path.exists() {
            return Ok(fail(
                &unit,
                BatchStep::LocatePrompt,
                format!("prompt not found at {}", unit.prompt_path.display()),
            ));
        }

        let (first_item, last_item) = unit.item_range(self.items_per_batch);
        tracing::info!(
            track = %track.code,
            batch,
            prompt = %unit.prompt_path.display(),
            output = %unit.output_path.display(),
            "generate items {}-{} from the prompt and save the output",
            first_item,
            last_item
        );

        if let Some(failure) = self.await_artifact(&unit).await {
            return Ok(failure);
        }

        if !unit.output_path.exists() {
            return Ok(fail(
                &unit,
                BatchStep::AwaitArtifact,
                format!("artifact not found at {}", unit.output_path.display()),
            ));
        }

        let verdict = self.validator.validate(&unit.output_path, &self.shape);
        if !verdict.accepted {
            return Ok(fail(&unit, BatchStep::Validate, verdict.reason));
        }
        tracing::info!(track = %track.code, batch, "validation passed: {}", verdict.reason);

        let staged = self.vcs.stage(&unit.output_path).await;
        if !staged.succeeded {
            return Ok(fail(&unit, BatchStep::Stage, staged.diagnostic().to_string()));
        }

        let message = unit.commit_message(self.items_per_batch, self.layout.batch_width);
        if self.vcs.is_committed(&unit.output_path).await {
            self.progress.mark_complete(&track.code, batch)?;
            tracing::info!(
                track = %track.code,
                batch,
                "artifact already committed, recorded without a new commit"
            );
            return Ok(BatchOutcome::Completed);
        }

        let committed = self.vcs.commit(&message).await;
        if !committed.succeeded {
            return Ok(fail(
                &unit,
                BatchStep::Commit,
                committed.diagnostic().to_string(),
            ));
        }

        self.progress.mark_complete(&track.code, batch)?;
        tracing::info!(track = %track.code, batch, commit = %message, "batch completed");
        Ok(BatchOutcome::Completed)
    }

    /// Suspend on the waiter with the awaiting marker in place.
    async fn await_artifact(&self, unit: &BatchUnit) -> Option<BatchOutcome> {
        if let Some(markers) = &self.markers
            && let Err(e) = markers.write(&AwaitingMarker::for_unit(unit))
        {
            tracing::warn!(track = %unit.track, batch = unit.batch, "{:#}", e);
        }

        let waited = self.waiter.wait_for(unit).await;

        if let Some(markers) = &self.markers
            && let Err(e) = markers.clear(&unit.track)
        {
            tracing::warn!(track = %unit.track, batch = unit.batch, "{:#}", e);
        }

        match waited {
            Ok(WaitOutcome::Ready) => None,
            Ok(WaitOutcome::Abandoned) => Some(fail(
                unit,
                BatchStep::AwaitArtifact,
                "stopped by operator".to_string(),
            )),
            Ok(WaitOutcome::TimedOut) => Some(fail(
                unit,
                BatchStep::AwaitArtifact,
                format!("timed out waiting for {}", unit.output_path.display()),
            )),
            Err(e) => Some(fail(unit, BatchStep::AwaitArtifact, format!("{:#}", e))),
        }
    }
}

fn fail(unit: &BatchUnit, step: BatchStep, reason: String) -> BatchOutcome {
    tracing::warn!(
        track = %unit.track,
        batch = unit.batch,
        step = %step,
        "batch failed: {}",
        reason
    );
    BatchOutcome::Failed(BatchFailure { step, reason })
}
