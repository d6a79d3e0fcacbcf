use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use batchforge::settings::CheckpointMode;

mod cmd;

#[derive(Parser)]
#[command(name = "batchforge")]
#[command(
    version,
    about = "Resumable per-track batch pipeline: prompt, wait for the artifact, validate, commit",
    long_about = "Without arguments, processes one smoke unit (no push). With a TRACK, \
                  processes that track's whole batch range on its branch and pushes it. \
                  With --all, runs every configured track in order."
)]
pub struct Cli {
    /// Track code to run over its full batch range (e.g. "en")
    pub track: Option<String>,

    /// Run every configured track in order
    #[arg(long, conflicts_with_all = ["track", "status"])]
    pub all: bool,

    /// Show per-track progress and any artifact being waited on
    #[arg(long, conflicts_with = "track")]
    pub status: bool,

    /// Path to batchforge.toml (defaults to <project-dir>/batchforge.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub project_dir: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,

    /// How to wait for each artifact. Overrides batchforge.toml.
    #[arg(long, value_enum)]
    pub checkpoint: Option<CheckpointMode>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = if cli.status {
        cmd::cmd_status(&cli)
    } else if cli.all {
        cmd::cmd_run(&cli, cmd::RunMode::All).await
    } else if let Some(track) = &cli.track {
        cmd::cmd_run(&cli, cmd::RunMode::Track(track.clone())).await
    } else {
        cmd::cmd_run(&cli, cmd::RunMode::Smoke).await
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(cmd::exit_code_for(&e))
        }
    }
}
