use std::path::{Path, PathBuf};

use guardian_core::SyncRunId;

pub const APP_DIR: &str = "backup-guardian";
pub const RUNS_DIR: &str = "runs";

/// `<data_dir>/backup-guardian/`
pub fn app_root(data_dir: &Path) -> PathBuf {
    data_dir.join(APP_DIR)
}

/// `<data_dir>/backup-guardian/runs/`
pub fn runs_dir(data_dir: &Path) -> PathBuf {
    app_root(data_dir).join(RUNS_DIR)
}

/// `<data_dir>/backup-guardian/runs/<id>.json` (pure, no I/O).
pub fn run_path_at(data_dir: &Path, id: &SyncRunId) -> PathBuf {
    runs_dir(data_dir).join(format!("{}.json", id.0))
}
