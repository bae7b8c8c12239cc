//! The sync control loop.
//!
//! One attempt runs immediately, then one per scheduler tick, until the
//! parent token is cancelled or the process receives SIGINT/SIGTERM. Attempts
//! run one at a time on the loop task, so attempt N is fully recorded before
//! attempt N+1 creates its run.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use guardian_core::{SyncJob, SyncRun, SyncRunStore};

use crate::error::RunnerError;
use crate::executor::Executor;
use crate::interval::parse_interval;
use crate::scheduler::Scheduler;
use crate::signal::shutdown_signal;

pub struct Runner {
    store: Arc<dyn SyncRunStore>,
    executor: Arc<dyn Executor>,
    job: SyncJob,
    scheduler: Option<Scheduler>,
    diagnostics: Option<Dispatch>,
    handle_signals: bool,
}

impl Runner {
    pub fn new(store: Arc<dyn SyncRunStore>, executor: Arc<dyn Executor>, job: SyncJob) -> Self {
        Self {
            store,
            executor,
            job,
            scheduler: None,
            diagnostics: None,
            handle_signals: true,
        }
    }

    /// Use this scheduler instead of one built from the interval passed to
    /// [`Runner::run`]. The interval is still validated.
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Send this runner's diagnostics to `dispatch` instead of the process
    /// default subscriber.
    pub fn with_diagnostics(mut self, dispatch: impl Into<Dispatch>) -> Self {
        self.diagnostics = Some(dispatch.into());
        self
    }

    /// Whether SIGINT/SIGTERM stop the loop. On by default.
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Run until `parent` is cancelled or a termination signal arrives.
    ///
    /// Only misconfiguration is an error; it is reported before anything is
    /// spawned. A clean stop returns `Ok(())`.
    pub async fn run(
        &self,
        parent: &CancellationToken,
        sync_interval: &str,
    ) -> Result<(), RunnerError> {
        match &self.diagnostics {
            Some(dispatch) => {
                self.run_loop(parent, sync_interval)
                    .with_subscriber(dispatch.clone())
                    .await
            }
            None => self.run_loop(parent, sync_interval).await,
        }
    }

    async fn run_loop(
        &self,
        parent: &CancellationToken,
        sync_interval: &str,
    ) -> Result<(), RunnerError> {
        let interval =
            parse_interval(sync_interval).map_err(|source| RunnerError::InvalidInterval {
                value: sync_interval.to_string(),
                source,
            })?;
        self.job.validate()?;

        let token = parent.child_token();

        let signals = self.handle_signals.then(|| {
            let shutdown = shutdown_signal();
            let token = token.clone();
            tokio::spawn(
                async move {
                    tokio::select! {
                        signal = shutdown => {
                            tracing::info!(signal, "received signal, stopping");
                            token.cancel();
                        }
                        _ = token.cancelled() => {}
                    }
                }
                .with_current_subscriber(),
            )
        });

        let scheduler = self
            .scheduler
            .clone()
            .unwrap_or_else(|| Scheduler::new(interval));
        let mut ticks = scheduler.start(token.clone());

        tracing::info!(
            job = %self.job.name,
            source = %self.job.source,
            destination = %self.job.destination,
            interval = ?scheduler.interval(),
            "runner started"
        );

        self.run_sync(&token).await;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                tick = ticks.recv() => match tick {
                    Some(()) => self.run_sync(&token).await,
                    None => break,
                },
            }
        }

        tracing::info!(job = %self.job.name, "runner stopping");
        token.cancel();
        if let Some(signals) = signals {
            let _ = signals.await;
        }
        ticks
            .join()
            .await
            .map_err(|err| RunnerError::Scheduler(err.to_string()))
    }

    /// One attempt: record the run, execute, record the outcome.
    async fn run_sync(&self, token: &CancellationToken) {
        let run = SyncRun::start(&self.job, Utc::now());
        let created = match self.store.create_sync_run(&run).await {
            Ok(created) => created,
            Err(err) => {
                tracing::error!(job = %self.job.name, error = %err, "failed to create sync run");
                return;
            }
        };

        tracing::info!(run_id = %created.id, job = %self.job.name, "starting sync");

        let outcome = self
            .executor
            .sync(token.clone(), &self.job.source, &self.job.destination)
            .await;

        let mut finished = created;
        let now = Utc::now();
        let recorded = match &outcome {
            Ok(stats) => finished.succeed(now, stats),
            Err(failure) => finished.fail(now, failure.partial.as_ref(), failure.to_string()),
        };
        // Only a store that hands back a non-running record gets here; there
        // is no legal terminal state to write, so the update is skipped.
        if let Err(err) = recorded {
            tracing::error!(run_id = %finished.id, error = %err, "cannot record sync outcome");
            return;
        }

        match &outcome {
            Ok(stats) => tracing::info!(
                run_id = %finished.id,
                files = stats.files_transferred,
                bytes = stats.bytes_transferred,
                duration_ms = stats.duration.as_millis() as u64,
                "sync completed"
            ),
            Err(failure) => {
                tracing::error!(run_id = %finished.id, error = %failure, "sync failed")
            }
        }

        if let Err(err) = self.store.update_sync_run(&finished).await {
            tracing::error!(run_id = %finished.id, error = %err, "failed to update sync run");
        }
    }
}
