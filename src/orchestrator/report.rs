use crate::batch::BatchFailure;

/// How a track's run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackStatus {
    /// Every batch in scope is recorded as complete.
    Completed { completed: usize, skipped: usize },
    /// Stopped at `batch`; later batches were not attempted.
    UnitFailed { batch: u32, failure: BatchFailure },
    /// The branch could not be checked out; no unit was attempted.
    CheckoutFailed { reason: String },
    /// Never started because an earlier track aborted the run.
    NotRun,
}

impl std::fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackStatus::Completed { completed, skipped } => {
                write!(f, "completed ({} new, {} already done)", completed, skipped)
            }
            TrackStatus::UnitFailed { batch, failure } => {
                write!(f, "batch {} {}", batch, failure)
            }
            TrackStatus::CheckoutFailed { reason } => write!(f, "checkout failed: {}", reason),
            TrackStatus::NotRun => write!(f, "not run"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackReport {
    pub code: String,
    pub status: TrackStatus,
    /// Whether the branch was pushed after the track completed.
    pub pushed: bool,
}

impl TrackReport {
    pub fn new(code: &str, status: TrackStatus) -> Self {
        Self {
            code: code.to_string(),
            status,
            pushed: false,
        }
    }

    pub fn not_run(code: &str) -> Self {
        Self::new(code, TrackStatus::NotRun)
    }

    /// A push failure does not make a track unsuccessful; its progress stands.
    pub fn succeeded(&self) -> bool {
        matches!(self.status, TrackStatus::Completed { .. })
    }
}

/// Per-track results of a full-automation run, in configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub tracks: Vec<TrackReport>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.tracks.iter().all(TrackReport::succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TrackReport> {
        self.tracks.iter().filter(|t| !t.succeeded())
    }

    pub fn unpushed(&self) -> impl Iterator<Item = &TrackReport> {
        self.tracks.iter().filter(|t| t.succeeded() && !t.pushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchStep;

    fn completed(code: &str) -> TrackReport {
        TrackReport {
            code: code.into(),
            status: TrackStatus::Completed {
                completed: 2,
                skipped: 1,
            },
            pushed: true,
        }
    }

    #[test]
    fn test_run_report_success() {
        let report = RunReport {
            tracks: vec![completed("en"), completed("de")],
        };
        assert!(report.success());
        assert_eq!(report.failed().count(), 0);
    }

    #[test]
    fn test_any_failed_or_not_run_track_fails_the_run() {
        let failed = TrackReport::new(
            "de",
            TrackStatus::UnitFailed {
                batch: 3,
                failure: BatchFailure {
                    step: BatchStep::Validate,
                    reason: "expected 20 records, found 19".into(),
                },
            },
        );
        let report = RunReport {
            tracks: vec![completed("en"), failed, TrackReport::not_run("fr")],
        };
        assert!(!report.success());
        let codes: Vec<_> = report.failed().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, vec!["de", "fr"]);
    }

    #[test]
    fn test_unpushed_track_still_succeeds() {
        let mut en = completed("en");
        en.pushed = false;
        let report = RunReport { tracks: vec![en] };
        assert!(report.success());
        assert_eq!(report.unpushed().count(), 1);
    }

    #[test]
    fn test_status_display() {
        let status = TrackStatus::UnitFailed {
            batch: 4,
            failure: BatchFailure {
                step: BatchStep::Commit,
                reason: "nothing to commit".into(),
            },
        };
        assert_eq!(status.to_string(), "batch 4 commit failed: nothing to commit");
        assert_eq!(
            TrackStatus::Completed {
                completed: 0,
                skipped: 4
            }
            .to_string(),
            "completed (0 new, 4 already done)"
        );
    }
}
