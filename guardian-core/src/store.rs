//! Persistence boundary for sync runs.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{SyncRun, SyncRunSelector, SyncRunsSelector};

/// Durable storage of [`SyncRun`] records.
///
/// Implementations must call [`SyncRun::validate`] before any create or update
/// and must not touch storage when it fails.
#[async_trait]
pub trait SyncRunStore: Send + Sync {
    /// Persist a new run and return the canonical stored representation
    /// (with `created_at` assigned).
    async fn create_sync_run(&self, run: &SyncRun) -> Result<SyncRun, StoreError>;

    /// Overwrite status, `finished_at`, counters and error message of the run
    /// identified by `run.id`.
    async fn update_sync_run(&self, run: &SyncRun) -> Result<(), StoreError>;

    async fn get_sync_run(&self, selector: &SyncRunSelector) -> Result<SyncRun, StoreError>;

    async fn list_sync_runs(&self, selector: &SyncRunsSelector)
        -> Result<Vec<SyncRun>, StoreError>;
}
