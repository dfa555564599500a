use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::trace;

use super::watch::Registration;
use super::GroupKey;
use super::Watch;
use crate::metrics::OPEN_WATCHES;
use crate::Snapshot;

/// Watch bookkeeping for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusInfo {
    pub num_watches: usize,
    pub last_watch_request: Option<Instant>,
}

/// Cheap-to-clone handle on the shared cache.
#[derive(Clone, Default)]
pub struct SnapshotCache {
    shared: Arc<CacheShared>,
}

#[derive(Default)]
pub(super) struct CacheShared {
    state: RwLock<CacheState>,
    next_watch_id: AtomicU64,
}

#[derive(Default)]
struct CacheState {
    snapshots: HashMap<GroupKey, Arc<Snapshot>>,
    status: HashMap<GroupKey, GroupStatus>,
}

#[derive(Default)]
struct GroupStatus {
    watches: HashMap<u64, PendingWatch>,
    last_watch_request: Option<Instant>,
}

struct PendingWatch {
    type_url: String,
    version: String,
    notify: oneshot::Sender<()>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot for `key`, or the shared empty snapshot.
    pub fn get_snapshot(
        &self,
        key: &GroupKey,
    ) -> Arc<Snapshot> {
        self.shared
            .state
            .read()
            .snapshots
            .get(key)
            .cloned()
            .unwrap_or_else(Snapshot::empty)
    }

    pub fn has_snapshot(
        &self,
        key: &GroupKey,
    ) -> bool {
        self.shared.state.read().snapshots.contains_key(key)
    }

    /// Publishes `snapshot` and fires every watch of `key` whose type now
    /// reports a different version. Returns the number of watches fired.
    pub fn set_snapshot(
        &self,
        key: &GroupKey,
        snapshot: Arc<Snapshot>,
    ) -> usize {
        let mut guard = self.shared.state.write();
        let state = &mut *guard;
        state.snapshots.insert(key.clone(), snapshot.clone());

        let Some(status) = state.status.get_mut(key) else {
            return 0;
        };

        let stale: Vec<u64> = status
            .watches
            .iter()
            .filter(|(_, w)| snapshot.version(&w.type_url) != w.version)
            .map(|(id, _)| *id)
            .collect();

        for id in &stale {
            if let Some(watch) = status.watches.remove(id) {
                trace!(%key, id, type_url = %watch.type_url, "firing watch");
                let _ = watch.notify.send(());
                OPEN_WATCHES.dec();
            }
        }

        debug!(%key, fired = stale.len(), "snapshot published");
        stale.len()
    }

    /// Forgets `key`. Pending watches resolve and their callers re-read an
    /// empty snapshot.
    pub fn clear_snapshot(
        &self,
        key: &GroupKey,
    ) {
        let mut state = self.shared.state.write();
        state.snapshots.remove(key);
        if let Some(status) = state.status.remove(key) {
            OPEN_WATCHES.sub(status.watches.len() as i64);
        }
    }

    /// Registers interest in `type_url` changing away from `version`.
    ///
    /// The staleness check and the registration happen under one write lock:
    /// when a snapshot exists and its version already differs, the returned
    /// watch is fired at once instead of being registered.
    pub fn create_watch(
        &self,
        key: &GroupKey,
        type_url: &str,
        version: &str,
    ) -> Watch {
        let (tx, rx) = oneshot::channel();

        let mut guard = self.shared.state.write();
        let state = &mut *guard;

        let current = state.snapshots.get(key).map(|s| s.version(type_url).to_string());
        let status = state.status.entry(key.clone()).or_default();
        status.last_watch_request = Some(Instant::now());

        if let Some(current) = current {
            if current != version {
                trace!(%key, %type_url, %current, requested = %version, "watch stale on creation");
                let _ = tx.send(());
                return Watch::fired(rx);
            }
        }

        let id = self.shared.next_watch_id.fetch_add(1, Ordering::Relaxed);
        status.watches.insert(id, PendingWatch {
            type_url: type_url.to_string(),
            version: version.to_string(),
            notify: tx,
        });
        OPEN_WATCHES.inc();
        trace!(%key, id, %type_url, %version, "watch registered");

        Watch::registered(rx, Registration {
            cache: Arc::downgrade(&self.shared),
            key: key.clone(),
            id,
        })
    }

    pub fn status_info(
        &self,
        key: &GroupKey,
    ) -> Option<StatusInfo> {
        self.shared.state.read().status.get(key).map(|status| StatusInfo {
            num_watches: status.watches.len(),
            last_watch_request: status.last_watch_request,
        })
    }

    /// Keys holding a snapshot, sorted.
    pub fn keys(&self) -> Vec<GroupKey> {
        let mut keys: Vec<GroupKey> = self.shared.state.read().snapshots.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl CacheShared {
    pub(super) fn release(
        &self,
        key: &GroupKey,
        id: u64,
    ) {
        let mut state = self.state.write();
        if let Some(status) = state.status.get_mut(key) {
            if status.watches.remove(&id).is_some() {
                OPEN_WATCHES.dec();
                trace!(%key, id, "watch released");
            }
        }
    }
}

impl fmt::Debug for SnapshotCache {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("SnapshotCache")
            .field("keys", &state.snapshots.len())
            .field("watched_groups", &state.status.len())
            .finish()
    }
}
