//! Run lifecycle rules.
//!
//! ```text
//! pending ─┐
//!          │ (reserved)
//! running ─┬─> success
//!          └─> failed
//! ```
//!
//! Runs are created directly in `running`. The only legal moves are from
//! `running` to a terminal status, and a terminal status is final.

use chrono::{DateTime, Utc};

use crate::error::{TransitionError, ValidationError};
use crate::types::{RunStatus, SyncJob, SyncRun, SyncRunId, TransferStats};

impl RunStatus {
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Running, RunStatus::Success) | (RunStatus::Running, RunStatus::Failed)
        )
    }
}

impl SyncJob {
    /// Reject a job with an empty name, source or destination.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::missing("name"));
        }
        if self.source.is_empty() {
            return Err(ValidationError::missing("source"));
        }
        if self.destination.is_empty() {
            return Err(ValidationError::missing("destination"));
        }
        Ok(())
    }
}

impl SyncRun {
    /// A new run for `job`, already `running`, with a fresh identifier.
    pub fn start(job: &SyncJob, started_at: DateTime<Utc>) -> Self {
        Self {
            id: SyncRunId::generate(),
            job_name: job.name.clone(),
            status: RunStatus::Running,
            started_at,
            finished_at: None,
            files_transferred: 0,
            bytes_transferred: 0,
            error_message: String::new(),
            created_at: None,
        }
    }

    /// Checked before any create or update reaches storage.
    ///
    /// `status` is an enum and therefore always set.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::missing("id"));
        }
        if self.job_name.is_empty() {
            return Err(ValidationError::missing("job_name"));
        }
        Ok(())
    }

    /// `running → success`, copying the executor's counters.
    pub fn succeed(
        &mut self,
        finished_at: DateTime<Utc>,
        stats: &TransferStats,
    ) -> Result<(), TransitionError> {
        self.transition(RunStatus::Success)?;
        self.finished_at = Some(finished_at);
        self.record_stats(Some(stats));
        self.error_message.clear();
        Ok(())
    }

    /// `running → failed`. Counters come from partial progress, or zero when
    /// the executor produced none.
    pub fn fail(
        &mut self,
        finished_at: DateTime<Utc>,
        partial: Option<&TransferStats>,
        error_message: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.transition(RunStatus::Failed)?;
        self.finished_at = Some(finished_at);
        self.record_stats(partial);
        self.error_message = error_message.into();
        Ok(())
    }

    fn record_stats(&mut self, stats: Option<&TransferStats>) {
        let stats = stats.copied().unwrap_or_default();
        self.files_transferred = stats.files_transferred;
        self.bytes_transferred = stats.bytes_transferred;
    }

    fn transition(&mut self, next: RunStatus) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                id: self.id.clone(),
                status: self.status,
            });
        }
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;

    fn job() -> SyncJob {
        SyncJob::new("test-job", "source", "dest")
    }

    fn stats(files: u64, bytes: u64) -> TransferStats {
        TransferStats {
            files_transferred: files,
            bytes_transferred: bytes,
            duration: Duration::from_secs(1),
        }
    }

    #[test]
    fn start_creates_running_run_for_job() {
        let now = Utc::now();
        let run = SyncRun::start(&job(), now);
        assert!(!run.id.is_empty());
        assert_eq!(run.job_name, "test-job");
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.started_at, now);
        assert!(run.finished_at.is_none());
        assert!(run.validate().is_ok());
    }

    #[rstest]
    #[case("", "job", "id")]
    #[case("id", "", "job_name")]
    fn validate_rejects_missing_fields(
        #[case] id: &str,
        #[case] job_name: &str,
        #[case] field: &str,
    ) {
        let mut run = SyncRun::start(&job(), Utc::now());
        run.id = SyncRunId::from(id);
        run.job_name = job_name.to_string();
        let err = run.validate().unwrap_err();
        assert_eq!(err.field, field);
        assert!(err.to_string().contains(&format!("{field} must be set")));
    }

    #[rstest]
    #[case(SyncJob::new("", "src", "dst"), "name")]
    #[case(SyncJob::new("job", "", "dst"), "source")]
    #[case(SyncJob::new("job", "src", ""), "destination")]
    fn job_validation(#[case] job: SyncJob, #[case] field: &str) {
        assert_eq!(job.validate().unwrap_err().field, field);
    }

    #[test]
    fn succeed_sets_terminal_fields() {
        let mut run = SyncRun::start(&job(), Utc::now());
        let finished = Utc::now();
        run.succeed(finished, &stats(10, 100)).expect("succeed");
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.finished_at, Some(finished));
        assert_eq!(run.files_transferred, 10);
        assert_eq!(run.bytes_transferred, 100);
        assert!(run.error_message.is_empty());
    }

    #[test]
    fn fail_without_result_zeroes_counters() {
        let mut run = SyncRun::start(&job(), Utc::now());
        run.files_transferred = 3;
        run.fail(Utc::now(), None, "sync failed").expect("fail");
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message, "sync failed");
        assert_eq!(run.files_transferred, 0);
        assert_eq!(run.bytes_transferred, 0);
    }

    #[test]
    fn fail_keeps_partial_progress() {
        let mut run = SyncRun::start(&job(), Utc::now());
        run.fail(Utc::now(), Some(&stats(2, 20)), "disk full")
            .expect("fail");
        assert_eq!(run.files_transferred, 2);
        assert_eq!(run.bytes_transferred, 20);
    }

    #[test]
    fn terminal_status_is_final() {
        let mut run = SyncRun::start(&job(), Utc::now());
        run.succeed(Utc::now(), &stats(1, 1)).expect("succeed");

        let err = run.fail(Utc::now(), None, "late failure").unwrap_err();
        assert!(matches!(err, TransitionError::AlreadyTerminal { .. }));
        assert_eq!(run.status, RunStatus::Success);
        assert!(run.error_message.is_empty());
    }

    #[test]
    fn pending_runs_cannot_jump_to_terminal() {
        let mut run = SyncRun::start(&job(), Utc::now());
        run.status = RunStatus::Pending;
        let err = run.succeed(Utc::now(), &stats(0, 0)).unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Illegal {
                from: RunStatus::Pending,
                to: RunStatus::Success,
                ..
            }
        ));
        assert!(run.finished_at.is_none());
    }

    #[rstest]
    #[case(RunStatus::Running, RunStatus::Success, true)]
    #[case(RunStatus::Running, RunStatus::Failed, true)]
    #[case(RunStatus::Pending, RunStatus::Running, false)]
    #[case(RunStatus::Success, RunStatus::Failed, false)]
    #[case(RunStatus::Failed, RunStatus::Running, false)]
    fn transition_table(#[case] from: RunStatus, #[case] to: RunStatus, #[case] legal: bool) {
        assert_eq!(from.can_transition_to(to), legal);
    }
}
