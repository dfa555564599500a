use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::SnapshotGenerator;
use crate::metrics::RECONCILIATIONS;
use crate::ContentVersioner;
use crate::GroupKey;
use crate::Result;
use crate::Snapshot;
use crate::SnapshotCache;
use crate::DEFAULT_CLIENT_ID;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// New content was published to the cache
    Published,
    /// Regenerated content matched the cached snapshot
    Unchanged,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub published: usize,
    pub unchanged: usize,
    pub failed: usize,
}

pub struct Reconciler {
    generator: Arc<dyn SnapshotGenerator>,
    cache: SnapshotCache,
    versioner: ContentVersioner,
    known_client_ids: ArcSwap<BTreeSet<String>>,
    /// One mutex per key: concurrent reconciles of a key run one at a time.
    in_flight: DashMap<GroupKey, Arc<Mutex<()>>>,
}

impl Reconciler {
    pub fn new(
        generator: Arc<dyn SnapshotGenerator>,
        cache: SnapshotCache,
    ) -> Self {
        Self {
            generator,
            cache,
            versioner: ContentVersioner,
            known_client_ids: ArcSwap::from_pointee(BTreeSet::new()),
            in_flight: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn type_urls(&self) -> Vec<String> {
        self.generator.type_urls()
    }

    /// Ids currently tracked in their own group.
    pub fn known_client_ids(&self) -> Arc<BTreeSet<String>> {
        self.known_client_ids.load_full()
    }

    /// Maps a declared client id onto its group: known ids get their own
    /// key, everything else shares the default key.
    pub fn resolve_key(
        &self,
        client_id: &str,
    ) -> GroupKey {
        if client_id != DEFAULT_CLIENT_ID && self.known_client_ids.load().contains(client_id) {
            GroupKey::new(client_id)
        } else {
            GroupKey::default_key()
        }
    }

    /// Whether a fetch must reconcile before answering.
    pub fn needs_reconciliation(
        &self,
        key: &GroupKey,
    ) -> bool {
        !self.cache.has_snapshot(key)
    }

    /// Regenerates the snapshot of `key` and publishes it if its content
    /// changed. On failure the previously published snapshot stays in place.
    pub async fn reconcile(
        &self,
        key: &GroupKey,
    ) -> Result<ReconcileOutcome> {
        let lock = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let resources = match self.generator.generate(key).await {
            Ok(resources) => resources,
            Err(e) => {
                RECONCILIATIONS.with_label_values(&["failed"]).inc();
                warn!(%key, "snapshot generation failed, keeping previous snapshot: {:?}", e);
                return Err(e);
            }
        };

        let fresh = self
            .versioner
            .stamp(Snapshot::from_resources(&self.generator.type_urls(), resources));

        if self.cache.has_snapshot(key) && self.cache.get_snapshot(key).content_equal_all(&fresh) {
            RECONCILIATIONS.with_label_values(&["unchanged"]).inc();
            debug!(%key, "snapshot unchanged");
            return Ok(ReconcileOutcome::Unchanged);
        }

        let fired = self.cache.set_snapshot(key, Arc::new(fresh));
        RECONCILIATIONS.with_label_values(&["published"]).inc();
        info!(%key, fired, "published new snapshot");
        Ok(ReconcileOutcome::Published)
    }

    /// Reloads the ids tracked individually. Keeps the previous set when the
    /// generator fails.
    pub async fn refresh_client_ids(&self) -> Result<()> {
        let ids = self.generator.client_ids().await?;
        if **self.known_client_ids.load() != ids {
            debug!(?ids, "known client ids changed");
            self.known_client_ids.store(Arc::new(ids));
        }
        Ok(())
    }

    /// Reconciles the default group and every known client group. A failing
    /// group is logged and counted; the others still reconcile.
    pub async fn reconcile_all(&self) -> ReconcileSummary {
        if let Err(e) = self.refresh_client_ids().await {
            warn!("could not refresh known client ids: {:?}", e);
        }

        let mut keys = vec![GroupKey::default_key()];
        keys.extend(
            self.known_client_ids()
                .iter()
                .filter(|id| id.as_str() != DEFAULT_CLIENT_ID)
                .map(GroupKey::new),
        );

        let outcomes = join_all(keys.iter().map(|key| self.reconcile(key))).await;

        let mut summary = ReconcileSummary::default();
        for outcome in outcomes {
            match outcome {
                Ok(ReconcileOutcome::Published) => summary.published += 1,
                Ok(ReconcileOutcome::Unchanged) => summary.unchanged += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}
