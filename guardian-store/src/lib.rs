//! # guardian-store
//!
//! File-backed [`SyncRunStore`](guardian_core::SyncRunStore): one JSON
//! document per run under `<data_dir>/backup-guardian/runs/`, written with the
//! `.tmp` + rename pattern so readers never observe a partial document.

pub mod file_store;
pub mod paths;

pub use file_store::FileRunStore;
