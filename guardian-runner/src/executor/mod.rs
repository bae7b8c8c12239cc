//! Data-transfer executors.
//!
//! The runner treats an executor as an opaque capability: hand it a source and
//! a destination, get back counters or a failure. Two implementations ship
//! with the crate:
//!
//! - [`RcloneExecutor`] drives the `rclone` binary (any rclone remote).
//! - [`LocalExecutor`] mirrors one local directory into another.

mod local;
mod rclone;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use guardian_core::TransferStats;

pub use local::LocalExecutor;
pub use rclone::RcloneExecutor;

/// Moves data from `source` to `destination`.
///
/// Implementations should stop promptly once `cancel` fires, returning a
/// [`ExecutorError::Cancelled`] failure with whatever progress was made.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn sync(
        &self,
        cancel: CancellationToken,
        source: &str,
        destination: &str,
    ) -> Result<TransferStats, SyncFailure>;
}

/// Reasons an executor can fail.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {detail}")]
    Exit {
        program: String,
        status: String,
        detail: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sync cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl ExecutorError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// A failed sync, with the counters reached before the failure if the
/// executor got that far.
///
/// Displays as the underlying error so it can be recorded verbatim.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct SyncFailure {
    pub error: ExecutorError,
    pub partial: Option<TransferStats>,
}

impl SyncFailure {
    /// Failure before any progress was made.
    pub fn early(error: ExecutorError) -> Self {
        Self {
            error,
            partial: None,
        }
    }

    pub fn with_progress(error: ExecutorError, partial: TransferStats) -> Self {
        Self {
            error,
            partial: Some(partial),
        }
    }
}

impl From<ExecutorError> for SyncFailure {
    fn from(error: ExecutorError) -> Self {
        Self::early(error)
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ExecutorError {
    ExecutorError::Io {
        path: path.into(),
        source,
    }
}
