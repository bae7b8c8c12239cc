use thiserror::Error;

use guardian_core::ValidationError;

use crate::interval::IntervalError;

/// Misconfiguration detected before the runner loop starts.
///
/// Nothing that happens inside a sync attempt surfaces here; attempt-level
/// failures are recorded on the run and reported through diagnostics.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid sync interval '{value}': {source}")]
    InvalidInterval {
        value: String,
        #[source]
        source: IntervalError,
    },

    #[error("invalid sync job: {0}")]
    InvalidJob(#[from] ValidationError),

    #[error("scheduler task failed: {0}")]
    Scheduler(String),
}
