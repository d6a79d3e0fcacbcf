//! `batchforge --status`: per-track progress and awaiting markers.
//!
//! Read-only: creates nothing on disk and takes no worktree lock, so it can
//! be run next to a live run.

use anyhow::Result;
use console::style;

use batchforge::errors::OrchestratorError;
use batchforge::progress::{AwaitingMarker, MarkerDir, ProgressState, ProgressStore};
use batchforge::track::Track;

use super::super::Cli;
use super::load_config;

pub fn cmd_status(cli: &Cli) -> Result<u8> {
    let config = load_config(cli)?;
    let registry = config.registry().map_err(OrchestratorError::from)?;
    let state = ProgressStore::inspect(&config.progress_file).map_err(OrchestratorError::from)?;
    let markers = MarkerDir::new(&config.state_dir);

    println!();
    println!("batchforge status");
    println!("=================");
    println!();
    println!("Project:  {}", config.project_dir.display());
    println!("Progress: {}", config.progress_file.display());
    println!();

    for track in registry.list_tracks() {
        let done = completed_in_range(track, &state);
        let next = track.batches().find(|b| !state.is_complete(&track.code, *b));

        println!(
            "{:<8} {} [{}] batches {}-{}",
            style(&track.code).bold(),
            track.name,
            track.branch,
            track.first_batch,
            track.last_batch
        );
        let next_label = match next {
            Some(batch) => format!("next: {}", batch),
            None => style("done").green().to_string(),
        };
        println!(
            "         {}/{} complete, {}",
            done,
            track.batch_count(),
            next_label
        );
        if let Some(marker) = markers.read(&track.code) {
            println!("         {}", style(awaiting_line(&marker)).yellow());
        }
    }
    println!();

    Ok(0)
}

/// Batches recorded for `track` that still fall inside its configured range.
fn completed_in_range(track: &Track, state: &ProgressState) -> usize {
    state
        .completed(&track.code)
        .iter()
        .filter(|b| track.contains(**b))
        .count()
}

fn awaiting_line(marker: &AwaitingMarker) -> String {
    format!(
        "awaiting batch {} for {} ({})",
        marker.batch,
        format_age(marker.age()),
        marker.output.display()
    )
}

fn format_age(age: chrono::Duration) -> String {
    let secs = age.num_seconds().max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
