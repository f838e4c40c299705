//! Periodic proximity walk on a tokio timer.

use std::time::Duration;

use rand::rngs::SmallRng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use tl_core::{ProximityEstimator, ProximitySnapshot};

/// Owns a [`ProximityEstimator`] inside a timer task and publishes every
/// snapshot on a watch channel.
///
/// Once [`stop`](Self::stop) returns no further tick is applied and the last
/// published snapshot stays readable. [`cancel`](Self::cancel) only signals
/// the task; a tick already past the timer may still land after it returns.
pub struct RadarTicker {
    token: CancellationToken,
    snapshots: watch::Receiver<ProximitySnapshot>,
    handle: JoinHandle<ProximityEstimator>,
}

impl RadarTicker {
    /// Start ticking every `period`. The first tick lands one full period
    /// after the call; missed ticks are skipped, not bunched.
    pub fn spawn(estimator: ProximityEstimator, rng: SmallRng, period: Duration) -> Self {
        Self::start(estimator, rng, period, None)
    }

    /// Like [`spawn`](Self::spawn), but the task ends by itself after
    /// `ticks` ticks, closing the channel once the final snapshot is out.
    pub fn spawn_bounded(
        estimator: ProximityEstimator,
        rng: SmallRng,
        period: Duration,
        ticks: u64,
    ) -> Self {
        Self::start(estimator, rng, period, Some(ticks))
    }

    fn start(
        estimator: ProximityEstimator,
        rng: SmallRng,
        period: Duration,
        limit: Option<u64>,
    ) -> Self {
        let token = CancellationToken::new();
        let (tx, snapshots) = watch::channel(estimator.snapshot());
        let handle = tokio::spawn(run(estimator, rng, period, limit, tx, token.clone()));
        tracing::info!(period_ms = period.as_millis() as u64, "radar started");
        Self {
            token,
            snapshots,
            handle,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProximitySnapshot> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> ProximitySnapshot {
        self.snapshots.borrow().clone()
    }

    /// Stop without waiting for the task.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Stop and take the estimator back in its final state.
    pub async fn stop(self) -> ProximityEstimator {
        self.cancel();
        match self.handle.await {
            Ok(estimator) => estimator,
            Err(e) => {
                // The loop itself cannot panic; a join error means the
                // runtime is shutting down. Rebuild from the last snapshot.
                tracing::warn!("radar task did not finish cleanly: {e}");
                let last = self.snapshots.borrow().clone();
                ProximityEstimator::new(last.peers.into_iter().map(|p| (p.id, p.distance)))
                    .unwrap_or_else(|_| ProximityEstimator::with_default_peers())
            }
        }
    }
}

async fn run(
    mut estimator: ProximityEstimator,
    mut rng: SmallRng,
    period: Duration,
    limit: Option<u64>,
    tx: watch::Sender<ProximitySnapshot>,
    token: CancellationToken,
) -> ProximityEstimator {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while limit.is_none_or(|n| estimator.ticks() < n) {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }
        let snapshot = estimator.tick(&mut rng);
        tracing::debug!(tick = snapshot.tick, "radar tick");
        tx.send_replace(snapshot);
    }

    tracing::info!(ticks = estimator.ticks(), "radar stopped");
    estimator
}
