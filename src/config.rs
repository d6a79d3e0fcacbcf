use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::RegistryError;
use crate::settings::{
    BatchforgeToml, CONFIG_FILE_NAME, CheckpointMode, FailurePolicy, SmokeSection,
};
use crate::track::{ArtifactLayout, TrackRegistry};
use crate::validate::ExpectedShape;

/// Runtime configuration for batchforge.
///
/// Resolves `batchforge.toml` (file), the environment and CLI flags into
/// absolute paths and concrete durations. Relative paths in the file are
/// taken relative to the project directory.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    /// The file that was loaded, if any
    pub config_file: Option<PathBuf>,
    pub state_dir: PathBuf,
    pub progress_file: PathBuf,
    pub log_file: PathBuf,
    pub layout: ArtifactLayout,
    pub git_cmd: String,
    pub remote: String,
    pub command_timeout: Duration,
    pub unit_delay: Duration,
    pub failure_policy: FailurePolicy,
    pub checkpoint: CheckpointMode,
    pub poll_interval: Duration,
    pub poll_timeout: Option<Duration>,
    pub shape: ExpectedShape,
    pub items_per_batch: u32,
    pub smoke: SmokeSection,
    pub verbose: bool,
    settings: BatchforgeToml,
}

impl Config {
    /// Build the runtime configuration.
    ///
    /// `config_file` overrides `<project_dir>/batchforge.toml`; an explicit
    /// file must exist. `checkpoint` overrides `[run].checkpoint`.
    pub fn new(
        project_dir: PathBuf,
        config_file: Option<PathBuf>,
        verbose: bool,
        checkpoint: Option<CheckpointMode>,
    ) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve project directory {}", project_dir.display()))?;

        let (settings, config_file) = match config_file {
            Some(path) => (BatchforgeToml::load(&path)?, Some(path)),
            None => {
                let default_path = project_dir.join(CONFIG_FILE_NAME);
                let loaded = default_path.exists().then_some(default_path);
                (BatchforgeToml::load_or_default(&project_dir)?, loaded)
            }
        };

        let state_dir = resolve(&project_dir, &settings.project.state_dir);
        let progress_file = resolve(&project_dir, &settings.progress_file());
        let log_file = resolve(&project_dir, &settings.log_file());
        let layout = ArtifactLayout::new(
            &project_dir,
            &settings.paths.prompt_pattern,
            &settings.paths.output_pattern,
            settings.paths.batch_width,
        );
        let run = &settings.run;

        Ok(Self {
            config_file,
            state_dir,
            progress_file,
            log_file,
            layout,
            git_cmd: settings.git_cmd(),
            remote: settings.project.remote.clone(),
            command_timeout: Duration::from_secs(run.command_timeout_secs),
            unit_delay: Duration::from_secs(run.unit_delay_secs),
            failure_policy: run.failure_policy,
            checkpoint: checkpoint.unwrap_or(run.checkpoint),
            poll_interval: Duration::from_secs(run.poll_interval_secs.max(1)),
            poll_timeout: run.poll_timeout_secs.map(Duration::from_secs),
            shape: settings.validation.expected_shape(),
            items_per_batch: settings.validation.items_per_batch,
            smoke: settings.smoke.clone(),
            verbose,
            project_dir,
            settings,
        })
    }

    /// Validated track registry from the `[[tracks]]` entries.
    pub fn registry(&self) -> Result<TrackRegistry, RegistryError> {
        TrackRegistry::new(self.settings.tracks())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.state_dir).context("Failed to create state directory")?;
        for file in [&self.progress_file, &self.log_file] {
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory {}", parent.display())
                })?;
            }
        }
        Ok(())
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
