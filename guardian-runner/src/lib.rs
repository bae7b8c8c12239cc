//! Backup run orchestration: cadence, executors and the sync loop.

mod error;
pub mod executor;
pub mod interval;
mod runner;
pub mod scheduler;
pub mod signal;
pub mod telemetry;

pub use error::RunnerError;
pub use executor::{Executor, ExecutorError, LocalExecutor, RcloneExecutor, SyncFailure};
pub use interval::{parse_interval, IntervalError};
pub use runner::Runner;
pub use scheduler::{Scheduler, Ticks};
pub use telemetry::{init_tracing, LogFormat};
