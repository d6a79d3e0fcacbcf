//! CLI command implementations.
//!
//! | Module   | Invocation                                   |
//! |----------|----------------------------------------------|
//! | `run`    | no arguments (smoke unit), `<TRACK>`, `--all` |
//! | `status` | `--status`                                   |

pub mod run;
pub mod status;

pub use run::{RunMode, cmd_run};
pub use status::cmd_status;

use anyhow::{Context, Result};
use std::path::PathBuf;

use batchforge::config::Config;
use batchforge::errors::{OrchestratorError, ProgressError, RegistryError};

use super::Cli;

/// A unit or track failed; rerunning resumes where it stopped.
pub const EXIT_UNIT_FAILED: u8 = 1;
/// Configuration or progress state is unusable; nothing was processed.
pub const EXIT_CONFIG: u8 = 2;

pub fn project_dir(cli: &Cli) -> Result<PathBuf> {
    match cli.project_dir.clone() {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let project_dir = project_dir(cli)?;
    let config = Config::new(project_dir, cli.config.clone(), cli.verbose, cli.checkpoint)
        .map_err(OrchestratorError::Config)?;
    Ok(config)
}

/// Map an error to the process exit code.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<OrchestratorError>()
            && e.is_configuration()
        {
            return EXIT_CONFIG;
        }
        if cause.downcast_ref::<RegistryError>().is_some() {
            return EXIT_CONFIG;
        }
        if let Some(ProgressError::CorruptState { .. }) = cause.downcast_ref::<ProgressError>() {
            return EXIT_CONFIG;
        }
    }
    EXIT_UNIT_FAILED
}
