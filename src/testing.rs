//! Test doubles shared by the unit tests.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::batch::BatchProcessor;
use crate::checkpoint::{ArtifactWaiter, WaitOutcome};
use crate::progress::ProgressStore;
use crate::runner::{CommandOutcome, VersionControl};
use crate::track::{ArtifactLayout, BatchUnit, Track, TrackRegistry};
use crate::validate::ExpectedShape;

/// Records every version-control call as `"<op> <arg>"`.
#[derive(Clone, Default)]
pub struct RecordingVcs {
    calls: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    committed: Arc<Mutex<HashSet<String>>>,
}

impl RecordingVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call whose recorded form starts with `prefix` fail.
    pub fn fail_on(&self, prefix: &str) {
        self.failing.lock().unwrap().insert(prefix.to_string());
    }

    /// Report the artifact with this file name as already committed.
    pub fn already_committed(&self, file_name: &str) {
        self.committed.lock().unwrap().insert(file_name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    fn record(&self, call: String) -> CommandOutcome {
        let fails = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| call.starts_with(prefix.as_str()));
        self.calls.lock().unwrap().push(call.clone());
        if fails {
            CommandOutcome::failure(format!("simulated failure: {}", call))
        } else {
            CommandOutcome::success("")
        }
    }
}

#[async_trait]
impl VersionControl for RecordingVcs {
    async fn checkout(&self, branch: &str) -> CommandOutcome {
        self.record(format!("checkout {}", branch))
    }

    async fn stage(&self, path: &Path) -> CommandOutcome {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        self.record(format!("stage {}", name))
    }

    async fn commit(&self, message: &str) -> CommandOutcome {
        self.record(format!("commit {}", message))
    }

    async fn is_committed(&self, path: &Path) -> bool {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        self.committed.lock().unwrap().contains(&*name)
    }

    async fn push(&self, branch: &str) -> CommandOutcome {
        self.record(format!("push {}", branch))
    }
}

/// Plays the external generator: writes the artifact (if given) when the
/// processor suspends, then resumes with a fixed outcome.
pub struct ScriptedWaiter {
    pub content: Option<String>,
    pub outcome: WaitOutcome,
    pub waited: Arc<Mutex<Vec<String>>>,
}

impl ScriptedWaiter {
    pub fn writing(content: String) -> Self {
        Self {
            content: Some(content),
            outcome: WaitOutcome::Ready,
            waited: Arc::default(),
        }
    }

    pub fn returning(outcome: WaitOutcome) -> Self {
        Self {
            content: None,
            outcome,
            waited: Arc::default(),
        }
    }
}

#[async_trait]
impl ArtifactWaiter for ScriptedWaiter {
    async fn wait_for(&self, unit: &BatchUnit) -> Result<WaitOutcome> {
        self.waited.lock().unwrap().push(unit.to_string());
        if let Some(content) = &self.content {
            if let Some(parent) = unit.output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&unit.output_path, content)?;
        }
        Ok(self.outcome)
    }
}

/// A temporary project with prompt and content directories.
pub struct Fixture {
    pub dir: TempDir,
    pub layout: ArtifactLayout,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(
            dir.path(),
            "prompts/{track}/batch_{batch}.md",
            "content/{track}/batch_{batch}.json",
            3,
        );
        Self { dir, layout }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn progress_path(&self) -> PathBuf {
        self.root().join(".batchforge/progress.json")
    }

    pub fn shape() -> ExpectedShape {
        ExpectedShape {
            item_count: 2,
            required_fields: vec!["word".into(), "translations".into()],
            nested_field: "translations".into(),
            nested_count: 3,
        }
    }

    pub fn valid_artifact() -> String {
        json!([
            {"word": "casa", "translations": ["house", "home", "dwelling"]},
            {"word": "gato", "translations": ["cat", "tomcat", "kitty"]}
        ])
        .to_string()
    }

    pub fn invalid_artifact() -> String {
        json!([{"word": "casa", "translations": ["house"]}]).to_string()
    }

    pub fn write_prompt(&self, track: &Track, batch: u32) {
        let unit = self.layout.unit(track, batch);
        std::fs::create_dir_all(unit.prompt_path.parent().unwrap()).unwrap();
        std::fs::write(&unit.prompt_path, format!("Generate batch {}", batch)).unwrap();
    }

    pub fn write_prompts(&self, track: &Track) {
        for batch in track.batches() {
            self.write_prompt(track, batch);
        }
    }

    pub fn store(&self, registry: &TrackRegistry) -> ProgressStore {
        ProgressStore::load(self.progress_path(), &registry.codes()).unwrap()
    }

    /// Processor wired to fakes: artifacts are written by the waiter.
    pub fn processor(&self, registry: &TrackRegistry, vcs: &RecordingVcs) -> BatchProcessor {
        BatchProcessor::new(self.layout.clone(), self.store(registry), Box::new(vcs.clone()))
            .with_waiter(Box::new(ScriptedWaiter::writing(Self::valid_artifact())))
            .with_shape(Self::shape(), 20)
    }
}

pub fn en_track() -> Track {
    Track::new("en", "English", "content/en", 2, 5)
}

pub fn registry(tracks: Vec<Track>) -> TrackRegistry {
    TrackRegistry::new(tracks).unwrap()
}
