use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval_at;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use super::Reconciler;
use crate::GroupKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickTarget {
    /// Default group plus every known client group; first tick is immediate.
    AllGroups,
    /// One group, first tick after one interval.
    Group(GroupKey),
}

/// Periodic reconciliation. Errors are logged and the loop continues until
/// the token is cancelled.
pub struct ReconcileTicker {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    target: TickTarget,
}

impl ReconcileTicker {
    pub fn new(
        reconciler: Arc<Reconciler>,
        interval: Duration,
        target: TickTarget,
    ) -> Self {
        Self {
            reconciler,
            interval,
            target,
        }
    }

    pub fn spawn(
        self,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    pub async fn run(
        self,
        token: CancellationToken,
    ) {
        let start = match self.target {
            TickTarget::AllGroups => Instant::now(),
            TickTarget::Group(_) => Instant::now() + self.interval,
        };
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(target = ?self.target, "reconcile ticker stopped");
                    return;
                }
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    async fn tick(&self) {
        match &self.target {
            TickTarget::AllGroups => {
                let summary = self.reconciler.reconcile_all().await;
                if summary.failed > 0 {
                    warn!(?summary, "periodic reconciliation had failures, retrying next tick");
                } else {
                    debug!(?summary, "periodic reconciliation done");
                }
            }
            TickTarget::Group(key) => {
                if let Err(e) = self.reconciler.reconcile(key).await {
                    warn!(%key, "watchdog reconciliation failed, retrying next tick: {:?}", e);
                }
            }
        }
    }
}
