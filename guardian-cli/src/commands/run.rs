//! `backup-guardian run`: the long-running sync loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tokio_util::sync::CancellationToken;

use guardian_core::SyncJob;
use guardian_runner::{
    init_tracing, parse_interval, Executor, LocalExecutor, RcloneExecutor, Runner,
};
use guardian_store::FileRunStore;

use crate::GlobalArgs;

/// Job name recorded on every run when none is configured.
pub const DEFAULT_JOB_NAME: &str = "gdrive-to-s3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutorKind {
    /// `rclone sync` between any two rclone remotes.
    Rclone,
    /// Mirror one local directory into another.
    Local,
}

/// Arguments for `backup-guardian run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Where to copy from (rclone remote or path).
    #[arg(long, env = "BG_SYNC_SOURCE")]
    pub sync_source: String,

    /// Where to copy to (rclone remote or path).
    #[arg(long, env = "BG_SYNC_DEST")]
    pub sync_dest: String,

    /// Time between syncs, e.g. 6h, 30m, 1h30m.
    #[arg(long, env = "BG_SYNC_INTERVAL", default_value = "6h")]
    pub sync_interval: String,

    /// Name recorded on every run.
    #[arg(long, env = "BG_JOB_NAME", default_value = DEFAULT_JOB_NAME)]
    pub job_name: String,

    #[arg(long, env = "BG_EXECUTOR", value_enum, default_value_t = ExecutorKind::Rclone)]
    pub executor: ExecutorKind,

    /// rclone binary to invoke.
    #[arg(long, env = "BG_RCLONE_BIN", default_value = "rclone")]
    pub rclone_bin: PathBuf,

    /// How often rclone reports transfer stats, e.g. 10s.
    #[arg(long, env = "BG_RCLONE_STATS", default_value = "10s", value_parser = parse_interval)]
    pub rclone_stats: Duration,

    /// Extra flag passed through to rclone. Repeatable.
    #[arg(long = "rclone-flag", allow_hyphen_values = true)]
    pub rclone_flags: Vec<String>,
}

impl RunArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        init_tracing(&global.log_level, global.log_format);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start tokio runtime")?;
        runtime.block_on(self.serve(global.data_dir.clone()))
    }

    async fn serve(self, data_dir: PathBuf) -> Result<()> {
        let executor: Arc<dyn Executor> = match self.executor {
            ExecutorKind::Rclone => Arc::new(
                RcloneExecutor::new(&self.rclone_bin)
                    .with_stats_interval(self.rclone_stats)
                    .with_extra_args(self.rclone_flags),
            ),
            ExecutorKind::Local => Arc::new(LocalExecutor::new()),
        };
        let store = Arc::new(FileRunStore::new(data_dir));
        let job = SyncJob::new(self.job_name, self.sync_source, self.sync_dest);

        Runner::new(store, executor, job)
            .run(&CancellationToken::new(), &self.sync_interval)
            .await
            .context("backup runner could not start")
    }
}
