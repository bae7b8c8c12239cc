//! Fixed-cadence tick source with a single-slot mailbox.
//!
//! The timer fires every `interval`, starting one interval after
//! [`Scheduler::start`]. A tick is offered to a channel of capacity one; if the
//! consumer has not drained the previous tick the new one is dropped, so a slow
//! sync never leaves a backlog of triggers behind it. Drops do not shift the
//! cadence.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;

/// Cadence source. The interval must be positive; callers validate it.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
}

/// Receiving half handed back by [`Scheduler::start`].
#[derive(Debug)]
pub struct Ticks {
    rx: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the timer loop. It runs until `cancel` fires, then closes the
    /// tick channel. The task logs to the caller's current subscriber.
    pub fn start(&self, cancel: CancellationToken) -> Ticks {
        let (tx, rx) = mpsc::channel(1);
        let handle =
            tokio::spawn(tick_loop(self.interval, tx, cancel).with_current_subscriber());
        Ticks { rx, handle }
    }
}

async fn tick_loop(period: Duration, tx: mpsc::Sender<()>, cancel: CancellationToken) {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {
                match tx.try_send(()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(())) => {
                        tracing::debug!("previous tick still pending, dropping this one");
                    }
                    Err(mpsc::error::TrySendError::Closed(())) => break,
                }
            }
        }
    }
    tracing::debug!("scheduler stopped");
}

impl Ticks {
    /// Wait for the next tick. `None` once the scheduler has stopped and the
    /// pending tick (if any) has been drained.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Take a pending tick without waiting.
    pub fn try_recv(&mut self) -> Option<()> {
        self.rx.try_recv().ok()
    }

    /// Wait for the timer task to exit. Only returns after cancellation.
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::advance;
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    const INTERVAL: Duration = Duration::from_millis(100);

    /// Let the spawned timer task run (and observe the clock after an `advance`).
    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn no_tick_before_first_interval() {
        let cancel = CancellationToken::new();
        let mut ticks = Scheduler::new(INTERVAL).start(cancel.clone());
        settle().await;

        advance(INTERVAL - Duration::from_millis(1)).await;
        settle().await;
        {
            let mut next = task::spawn(ticks.recv());
            assert_pending!(next.poll());
        }

        advance(Duration::from_millis(1)).await;
        settle().await;
        let mut next = task::spawn(ticks.recv());
        assert_eq!(assert_ready!(next.poll()), Some(()));
        drop(next);

        cancel.cancel();
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn bursts_coalesce_into_one_pending_tick() {
        let cancel = CancellationToken::new();
        let mut ticks = Scheduler::new(INTERVAL).start(cancel.clone());
        settle().await;

        for _ in 0..5 {
            advance(INTERVAL).await;
            settle().await;
        }

        assert_eq!(ticks.try_recv(), Some(()));
        assert_eq!(ticks.try_recv(), None, "only one tick may be queued");

        cancel.cancel();
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn cadence_survives_dropped_ticks() {
        let cancel = CancellationToken::new();
        let mut ticks = Scheduler::new(INTERVAL).start(cancel.clone());
        settle().await;

        // The tick due at 1x fires late at 2x; the one due at 2x is skipped.
        advance(INTERVAL * 2).await;
        settle().await;
        assert_eq!(ticks.try_recv(), Some(()));

        // The next tick still lands on the original grid (t = 3 * INTERVAL).
        advance(INTERVAL - Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(ticks.try_recv(), None);
        advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(ticks.try_recv(), Some(()));

        cancel.cancel();
    }

    #[tokio::test]
    async fn stops_promptly_on_cancel() {
        let cancel = CancellationToken::new();
        let mut ticks = Scheduler::new(Duration::from_secs(3600)).start(cancel.clone());

        cancel.cancel();
        assert_eq!(
            tokio::time::timeout(Duration::from_secs(1), ticks.recv())
                .await
                .expect("channel closes after cancel"),
            None
        );
        tokio::time::timeout(Duration::from_secs(1), ticks.join())
            .await
            .expect("timer task exits")
            .expect("timer task did not panic");
    }

    #[tokio::test]
    async fn emits_shortly_after_first_interval() {
        let interval = Duration::from_millis(5);
        let cancel = CancellationToken::new();
        let mut ticks = Scheduler::new(interval).start(cancel.clone());

        tokio::time::timeout(interval * 20, ticks.recv())
            .await
            .expect("expected a tick")
            .expect("scheduler still running");
        cancel.cancel();
    }
}
