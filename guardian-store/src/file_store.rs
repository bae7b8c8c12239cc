//! JSON-document run store.
//!
//! # Storage layout
//!
//! ```text
//! <data_dir>/backup-guardian/
//!   runs/                 (mode 0700)
//!     <run_id>.json       (one document per run, mode 0600)
//! ```
//!
//! # API pattern
//!
//! The blocking `*_at(data_dir, …)` functions do the file work and are what the
//! tests exercise directly. [`FileRunStore`] wraps them for async callers by
//! moving each call onto the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use guardian_core::error::io_err;
use guardian_core::{
    StoreError, SyncRun, SyncRunId, SyncRunSelector, SyncRunStore, SyncRunsSelector,
};

use crate::paths::{run_path_at, runs_dir};

// ---------------------------------------------------------------------------
// 1. Blocking operations
// ---------------------------------------------------------------------------

/// Insert `run` and return the stored document with `created_at` assigned.
///
/// Returns `StoreError::Conflict` when a run with the same id already exists.
pub fn create_at(data_dir: &Path, run: &SyncRun) -> Result<SyncRun, StoreError> {
    run.validate()?;
    ensure_file_name(&run.id)?;
    ensure_runs_dir(data_dir)?;

    let path = run_path_at(data_dir, &run.id);
    if path.exists() {
        return Err(StoreError::Conflict { id: run.id.clone() });
    }

    let mut stored = run.clone();
    stored.created_at = Some(Utc::now());
    write_document(&path, &stored)?;
    tracing::debug!(run_id = %stored.id, path = %path.display(), "created sync run");
    Ok(stored)
}

/// Overwrite the mutable outcome fields of an existing run.
///
/// `job_name`, `started_at` and `created_at` keep their stored values.
pub fn update_at(data_dir: &Path, run: &SyncRun) -> Result<(), StoreError> {
    run.validate()?;
    let mut stored = load_at(data_dir, &run.id)?;

    stored.status = run.status;
    stored.finished_at = run.finished_at;
    stored.error_message = run.error_message.clone();
    stored.files_transferred = run.files_transferred;
    stored.bytes_transferred = run.bytes_transferred;

    let path = run_path_at(data_dir, &run.id);
    write_document(&path, &stored)?;
    tracing::debug!(run_id = %stored.id, status = %stored.status, "updated sync run");
    Ok(())
}

/// Load a single run. Returns `StoreError::NotFound` if absent.
pub fn load_at(data_dir: &Path, id: &SyncRunId) -> Result<SyncRun, StoreError> {
    if ensure_file_name(id).is_err() {
        return Err(StoreError::NotFound { id: id.clone() });
    }
    let path = run_path_at(data_dir, id);
    if !path.exists() {
        return Err(StoreError::NotFound { id: id.clone() });
    }
    read_document(&path)
}

/// List runs newest first (by `created_at`, ties by id), filtered by job name
/// when the selector sets one, then paged by offset/limit.
pub fn list_at(data_dir: &Path, selector: &SyncRunsSelector) -> Result<Vec<SyncRun>, StoreError> {
    let dir = runs_dir(data_dir);
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut runs = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
        let entry = entry.map_err(|e| io_err(&dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let run = read_document(&path)?;
        if selector.job_name.is_empty() || run.job_name == selector.job_name {
            runs.push(run);
        }
    }

    runs.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });

    Ok(runs
        .into_iter()
        .skip(selector.offset)
        .take(selector.effective_limit())
        .collect())
}

// ---------------------------------------------------------------------------
// 2. Async adapter
// ---------------------------------------------------------------------------

/// [`SyncRunStore`] backed by the JSON documents described above.
#[derive(Debug, Clone)]
pub struct FileRunStore {
    data_dir: Arc<PathBuf>,
}

impl FileRunStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Arc::new(data_dir.into()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let data_dir = self.data_dir.clone();
        let dispatch = tracing::dispatcher::get_default(|current| current.clone());
        tokio::task::spawn_blocking(move || {
            tracing::dispatcher::with_default(&dispatch, || op(&data_dir))
        })
            .await
            .map_err(|err| StoreError::Backend(format!("store task join error: {err}")))?
    }
}

#[async_trait]
impl SyncRunStore for FileRunStore {
    async fn create_sync_run(&self, run: &SyncRun) -> Result<SyncRun, StoreError> {
        // Reject before scheduling any I/O.
        run.validate()?;
        let run = run.clone();
        self.blocking(move |dir| create_at(dir, &run)).await
    }

    async fn update_sync_run(&self, run: &SyncRun) -> Result<(), StoreError> {
        run.validate()?;
        let run = run.clone();
        self.blocking(move |dir| update_at(dir, &run)).await
    }

    async fn get_sync_run(&self, selector: &SyncRunSelector) -> Result<SyncRun, StoreError> {
        let id = selector.id.clone();
        self.blocking(move |dir| load_at(dir, &id)).await
    }

    async fn list_sync_runs(
        &self,
        selector: &SyncRunsSelector,
    ) -> Result<Vec<SyncRun>, StoreError> {
        let selector = selector.clone();
        self.blocking(move |dir| list_at(dir, &selector)).await
    }
}

// ---------------------------------------------------------------------------
// 3. File helpers
// ---------------------------------------------------------------------------

/// Write flow: serialize → `<id>.json.tmp` sibling → `chmod 0600` → `rename`.
fn write_document(path: &Path, run: &SyncRun) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(run).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

fn read_document(path: &Path) -> Result<SyncRun, StoreError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Ids become file names; anything that could escape the runs directory is refused.
fn ensure_file_name(id: &SyncRunId) -> Result<(), StoreError> {
    let unsafe_name = id.0.starts_with('.') || id.0.contains(|c: char| c == '/' || c == '\\');
    if unsafe_name {
        return Err(StoreError::Backend(format!(
            "sync run id '{id}' is not usable as a file name"
        )));
    }
    Ok(())
}

fn ensure_runs_dir(data_dir: &Path) -> Result<(), StoreError> {
    let dir = runs_dir(data_dir);
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
