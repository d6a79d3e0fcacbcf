//! Processing runs: the smoke unit, `batchforge <TRACK>` and
//! `batchforge --all`.

use anyhow::Result;
use console::style;

use batchforge::batch::BatchProcessor;
use batchforge::checkpoint::waiter_for;
use batchforge::config::Config;
use batchforge::errors::OrchestratorError;
use batchforge::logging::init_logging;
use batchforge::orchestrator::{Orchestrator, RunReport, TrackReport, TrackStatus};
use batchforge::progress::{MarkerDir, ProgressStore};
use batchforge::runner::{CommandRunner, GitCli, RepoInspector, WorktreeGuard};
use batchforge::track::TrackRegistry;

use super::super::Cli;
use super::{EXIT_UNIT_FAILED, load_config};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// One configured unit, no push.
    Smoke,
    /// A track's full range, then push.
    Track(String),
    /// Every track in configured order.
    All,
}

/// Returns the process exit code.
pub async fn cmd_run(cli: &Cli, mode: RunMode) -> Result<u8> {
    let config = load_config(cli)?;
    let registry = config.registry().map_err(OrchestratorError::from)?;
    if let RunMode::Track(code) = &mode {
        registry.get_track(code).map_err(OrchestratorError::from)?;
    }

    config.ensure_directories()?;
    let _log_guard = init_logging(Some(config.log_file.as_path()), config.verbose)?;
    match &config.config_file {
        Some(path) => tracing::info!(config = %path.display(), "configuration loaded"),
        None => tracing::info!("no batchforge.toml found, using defaults"),
    }

    let repo = RepoInspector::open(&config.project_dir)?;
    let worktree = repo
        .workdir()
        .unwrap_or(config.project_dir.as_path())
        .to_path_buf();
    let branch = repo.current_branch();
    let head = repo.head_sha();
    tracing::info!(
        worktree = %worktree.display(),
        branch = branch.as_deref().unwrap_or("(detached)"),
        head = head.as_deref().unwrap_or("(unborn)"),
        "repository opened"
    );
    for track in registry.list_tracks() {
        if !repo.has_local_branch(&track.branch) {
            tracing::warn!(track = %track.code, branch = %track.branch, "no local branch; checkout may fail");
        }
    }
    let _worktree_guard = WorktreeGuard::acquire(&config.state_dir, &worktree)?;

    let mut orchestrator = build_orchestrator(&config, registry)?;

    let succeeded = match mode {
        RunMode::Smoke => {
            let report = orchestrator.run_smoke().await?;
            print_track_report(&report, false);
            report.succeeded()
        }
        RunMode::Track(code) => {
            let report = orchestrator.run_track(&code).await?;
            print_track_report(&report, true);
            report.succeeded()
        }
        RunMode::All => {
            let report = orchestrator.run_all().await?;
            print_run_report(&report);
            report.success()
        }
    };

    Ok(if succeeded { 0 } else { EXIT_UNIT_FAILED })
}

fn build_orchestrator(config: &Config, registry: TrackRegistry) -> Result<Orchestrator> {
    let store = ProgressStore::load(&config.progress_file, &registry.codes())
        .map_err(OrchestratorError::from)?;
    tracing::info!(progress = %store.path().display(), "progress loaded");

    let vcs = GitCli::new(
        CommandRunner::new(config.git_cmd.clone()),
        &config.project_dir,
        &config.remote,
        config.command_timeout,
    );
    let waiter = waiter_for(config.checkpoint, config.poll_interval, config.poll_timeout);

    let processor = BatchProcessor::new(config.layout.clone(), store, Box::new(vcs))
        .with_waiter(waiter)
        .with_shape(config.shape.clone(), config.items_per_batch)
        .with_markers(MarkerDir::new(&config.state_dir));

    Ok(Orchestrator::new(registry, processor)
        .with_policy(config.failure_policy)
        .with_unit_delay(config.unit_delay)
        .with_smoke(config.smoke.clone()))
}

fn print_track_report(report: &TrackReport, pushes: bool) {
    println!();
    let marker = match &report.status {
        TrackStatus::Completed { .. } => style("✓").green(),
        TrackStatus::NotRun => style("-").dim(),
        _ => style("✗").red(),
    };
    let pushed = if pushes && report.succeeded() && !report.pushed {
        format!(" {}", style("(not pushed)").yellow())
    } else {
        String::new()
    };
    println!(
        "  {} {:<8} {}{}",
        marker,
        style(&report.code).bold(),
        report.status,
        pushed
    );
}

fn print_run_report(report: &RunReport) {
    for track in &report.tracks {
        print_track_report(track, true);
    }
    println!();
    let failed = report.failed().count();
    if failed == 0 {
        println!("{}", style("All tracks completed").green().bold());
    } else {
        println!(
            "{}",
            style(format!(
                "{} of {} track(s) did not complete; rerun to resume",
                failed,
                report.tracks.len()
            ))
            .red()
            .bold()
        );
    }
}
