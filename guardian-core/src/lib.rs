//! backup-guardian core library: domain types, run lifecycle, errors and the
//! store boundary.
//!
//! - [`types`]: `SyncJob`, `SyncRun`, `RunStatus`, selectors
//! - [`lifecycle`]: validation and the `running → success | failed` machine
//! - [`error`]: [`StoreError`], [`ValidationError`], [`TransitionError`]
//! - [`store`]: the [`SyncRunStore`] trait

pub mod error;
pub mod lifecycle;
pub mod store;
pub mod types;

pub use error::{ErrorCode, StoreError, TransitionError, ValidationError};
pub use store::SyncRunStore;
pub use types::{
    RunStatus, SyncJob, SyncRun, SyncRunId, SyncRunSelector, SyncRunsSelector, TransferStats,
    DEFAULT_LIST_LIMIT,
};
