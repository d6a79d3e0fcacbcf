//! Run-level control: single-track runs, the full-automation loop and the
//! smoke unit, plus the reports they produce.

pub mod report;
pub mod runner;

pub use report::{RunReport, TrackReport, TrackStatus};
pub use runner::Orchestrator;
