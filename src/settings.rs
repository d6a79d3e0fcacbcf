//! File-level configuration for batchforge.
//!
//! This module models `batchforge.toml`. Every section is optional and every
//! field has a default, so an empty file is valid (though a run needs at
//! least one `[[tracks]]` entry).
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! git_cmd = "git"
//! remote = "origin"
//! state_dir = ".batchforge"
//!
//! [paths]
//! prompt_pattern = "prompts/{track}/batch_{batch}.md"
//! output_pattern = "content/{track}/batch_{batch}.json"
//! batch_width = 3
//! progress_file = ".batchforge/progress.json"
//! log_file = ".batchforge/batchforge.log"
//!
//! [run]
//! command_timeout_secs = 300
//! unit_delay_secs = 2
//! failure_policy = "skip-track"
//! checkpoint = "console"
//! poll_interval_secs = 5
//!
//! [validation]
//! item_count = 20
//! items_per_batch = 20
//! required_fields = ["word", "translations", "example"]
//! nested_field = "translations"
//! nested_count = 9
//!
//! [smoke]
//! track = "en"
//! batch = 1
//!
//! [[tracks]]
//! code = "en"
//! name = "English"
//! branch = "content/en"
//! first_batch = 1
//! last_batch = 50
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::runner::DEFAULT_COMMAND_TIMEOUT;
use crate::track::Track;
use crate::validate::ExpectedShape;

/// Default name of the configuration file inside the project directory.
pub const CONFIG_FILE_NAME: &str = "batchforge.toml";

/// What the full-automation loop does when a track fails.
///
/// The same policy applies to checkout failures and unit failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Report the failing track and continue with the next one.
    #[default]
    SkipTrack,
    /// Stop the whole run at the first failing track.
    Abort,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::SkipTrack => write!(f, "skip-track"),
            FailurePolicy::Abort => write!(f, "abort"),
        }
    }
}

/// How the orchestrator waits for an artifact to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointMode {
    /// Ask the operator on the console.
    #[default]
    Console,
    /// Poll the output path until the file exists.
    Poll,
    /// Do not wait; the artifact must already be present.
    Immediate,
}

impl std::fmt::Display for CheckpointMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointMode::Console => write!(f, "console"),
            CheckpointMode::Poll => write!(f, "poll"),
            CheckpointMode::Immediate => write!(f, "immediate"),
        }
    }
}

impl std::str::FromStr for CheckpointMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" => Ok(CheckpointMode::Console),
            "poll" => Ok(CheckpointMode::Poll),
            "immediate" => Ok(CheckpointMode::Immediate),
            _ => anyhow::bail!(
                "Invalid checkpoint mode '{}'. Valid values: console, poll, immediate",
                s
            ),
        }
    }
}

/// Project-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Version-control executable (default: "git")
    #[serde(default)]
    pub git_cmd: Option<String>,
    /// Remote that finished branches are pushed to
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Directory for locks, markers and default state files
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_state_dir() -> String {
    ".batchforge".to_string()
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            git_cmd: None,
            remote: default_remote(),
            state_dir: default_state_dir(),
        }
    }
}

/// Artifact and state file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    #[serde(default = "default_prompt_pattern")]
    pub prompt_pattern: String,
    #[serde(default = "default_output_pattern")]
    pub output_pattern: String,
    /// Zero-padding width for `{batch}`
    #[serde(default = "default_batch_width")]
    pub batch_width: usize,
    /// Shared progress file; may live outside the working tree
    #[serde(default)]
    pub progress_file: Option<String>,
    #[serde(default)]
    pub log_file: Option<String>,
}

fn default_prompt_pattern() -> String {
    "prompts/{track}/batch_{batch}.md".to_string()
}

fn default_output_pattern() -> String {
    "content/{track}/batch_{batch}.json".to_string()
}

fn default_batch_width() -> usize {
    3
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            prompt_pattern: default_prompt_pattern(),
            output_pattern: default_output_pattern(),
            batch_width: default_batch_width(),
            progress_file: None,
            log_file: None,
        }
    }
}

/// Run behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Delay between completed units in the full-automation loop
    #[serde(default = "default_unit_delay")]
    pub unit_delay_secs: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub checkpoint: CheckpointMode,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Unset means wait indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_timeout_secs: Option<u64>,
}

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT.as_secs()
}

fn default_unit_delay() -> u64 {
    2
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout(),
            unit_delay_secs: default_unit_delay(),
            failure_policy: FailurePolicy::default(),
            checkpoint: CheckpointMode::default(),
            poll_interval_secs: default_poll_interval(),
            poll_timeout_secs: None,
        }
    }
}

/// Shape conventions every artifact must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSection {
    #[serde(default = "default_item_count")]
    pub item_count: usize,
    /// Used for the item range in commit messages
    #[serde(default = "default_item_count_u32")]
    pub items_per_batch: u32,
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<String>,
    #[serde(default = "default_nested_field")]
    pub nested_field: String,
    #[serde(default = "default_nested_count")]
    pub nested_count: usize,
}

fn default_item_count() -> usize {
    20
}

fn default_item_count_u32() -> u32 {
    20
}

fn default_required_fields() -> Vec<String> {
    vec![
        "word".to_string(),
        "translations".to_string(),
        "example".to_string(),
    ]
}

fn default_nested_field() -> String {
    "translations".to_string()
}

fn default_nested_count() -> usize {
    9
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            item_count: default_item_count(),
            items_per_batch: default_item_count_u32(),
            required_fields: default_required_fields(),
            nested_field: default_nested_field(),
            nested_count: default_nested_count(),
        }
    }
}

impl ValidationSection {
    pub fn expected_shape(&self) -> ExpectedShape {
        ExpectedShape {
            item_count: self.item_count,
            required_fields: self.required_fields.clone(),
            nested_field: self.nested_field.clone(),
            nested_count: self.nested_count,
        }
    }
}

/// The single unit processed when no arguments are given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmokeSection {
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub batch: Option<u32>,
}

/// One `[[tracks]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackEntry {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub branch: String,
    pub first_batch: u32,
    pub last_batch: u32,
}

impl From<&TrackEntry> for Track {
    fn from(entry: &TrackEntry) -> Self {
        Track::new(
            &entry.code,
            &entry.name,
            &entry.branch,
            entry.first_batch,
            entry.last_batch,
        )
    }
}

/// The complete batchforge.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchforgeToml {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub validation: ValidationSection,
    #[serde(default)]
    pub smoke: SmokeSection,
    #[serde(default)]
    pub tracks: Vec<TrackEntry>,
}

impl BatchforgeToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse batchforge.toml")
    }

    /// Load `batchforge.toml` from the project directory, or defaults when
    /// the file does not exist.
    pub fn load_or_default(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Git executable, with fallback to `BATCHFORGE_GIT_CMD`.
    pub fn git_cmd(&self) -> String {
        self.project
            .git_cmd
            .clone()
            .or_else(|| std::env::var("BATCHFORGE_GIT_CMD").ok())
            .unwrap_or_else(|| "git".to_string())
    }

    /// Progress file, with `BATCHFORGE_PROGRESS_FILE` taking precedence so
    /// several clones can share one record.
    pub fn progress_file(&self) -> String {
        std::env::var("BATCHFORGE_PROGRESS_FILE")
            .ok()
            .or_else(|| self.paths.progress_file.clone())
            .unwrap_or_else(|| format!("{}/progress.json", self.project.state_dir))
    }

    pub fn log_file(&self) -> String {
        self.paths
            .log_file
            .clone()
            .unwrap_or_else(|| format!("{}/batchforge.log", self.project.state_dir))
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.tracks.iter().map(Track::from).collect()
    }
}
