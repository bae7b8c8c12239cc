//! Domain types for backup-guardian.
//!
//! A [`SyncJob`] is static configuration; a [`SyncRun`] is one recorded attempt
//! to execute it. All types are serializable via serde so that store adapters
//! can persist them verbatim.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Globally unique identifier of a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncRunId(pub String);

impl SyncRunId {
    /// Generate a fresh random (v4) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SyncRunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SyncRunId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a sync run.
///
/// `Pending` is reserved for queued runs; the runner creates every run
/// directly in `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    /// `success` and `failed` never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A source/destination pair kept in sync. Configured once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub name: String,
    /// Location identifier understood by the executor (e.g. `gdrive:` or a path).
    pub source: String,
    pub destination: String,
}

impl SyncJob {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// Counters reported by an executor for one sync call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStats {
    pub files_transferred: u64,
    pub bytes_transferred: u64,
    #[serde(with = "duration_millis")]
    pub duration: std::time::Duration,
}

/// One recorded attempt to execute a [`SyncJob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: SyncRunId,
    pub job_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files_transferred: u64,
    #[serde(default)]
    pub bytes_transferred: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    /// Assigned by the store on insertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl SyncRun {
    /// Wall-clock time between start and finish, if the run has finished.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|finished| finished - self.started_at)
    }
}

/// Identifies a single sync run for reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRunSelector {
    pub id: SyncRunId,
}

/// Filters sync runs for listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRunsSelector {
    /// Empty matches every job.
    pub job_name: String,
    /// `0` means [`DEFAULT_LIST_LIMIT`].
    pub limit: usize,
    pub offset: usize,
}

/// Page size used when a listing does not set one.
pub const DEFAULT_LIST_LIMIT: usize = 50;

impl SyncRunsSelector {
    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_LIST_LIMIT
        } else {
            self.limit
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_uuids_and_unique() {
        let a = SyncRunId::generate();
        let b = SyncRunId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok(), "not a uuid: {a}");
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&RunStatus::Success).expect("serialize");
        assert_eq!(json, "\"success\"");
        let status: RunStatus = serde_json::from_str("\"failed\"").expect("deserialize");
        assert_eq!(status, RunStatus::Failed);
    }

    #[test]
    fn only_success_and_failed_are_terminal() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn zero_limit_falls_back_to_default_page() {
        assert_eq!(SyncRunsSelector::default().effective_limit(), DEFAULT_LIST_LIMIT);
        let selector = SyncRunsSelector {
            limit: 5,
            ..Default::default()
        };
        assert_eq!(selector.effective_limit(), 5);
    }

    #[test]
    fn unfinished_run_omits_optional_fields() {
        let run = SyncRun {
            id: SyncRunId::from("run-1"),
            job_name: "job".to_string(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            files_transferred: 0,
            bytes_transferred: 0,
            error_message: String::new(),
            created_at: None,
        };
        let value = serde_json::to_value(&run).expect("serialize");
        assert!(value.get("finished_at").is_none());
        assert!(value.get("error_message").is_none());
        assert_eq!(value["status"], "running");
        assert!(run.elapsed().is_none());
    }
}
