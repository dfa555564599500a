use std::sync::Weak;

use tokio::sync::oneshot;

use super::snapshot_cache::CacheShared;
use super::GroupKey;

/// A single-fire wake-up registered against `(key, type, version)`.
///
/// The registration lives exactly as long as this value: dropping the watch
/// (after firing, on timeout or when the awaiting future is cancelled)
/// removes it from the cache.
#[derive(Debug)]
pub struct Watch {
    rx: oneshot::Receiver<()>,
    registration: Option<Registration>,
    fired: bool,
}

#[derive(Debug)]
pub(super) struct Registration {
    pub(super) cache: Weak<CacheShared>,
    pub(super) key: GroupKey,
    pub(super) id: u64,
}

impl Watch {
    pub(super) fn registered(
        rx: oneshot::Receiver<()>,
        registration: Registration,
    ) -> Self {
        Self {
            rx,
            registration: Some(registration),
            fired: false,
        }
    }

    /// Already stale at creation: resolves without waiting.
    pub(super) fn fired(rx: oneshot::Receiver<()>) -> Self {
        Self {
            rx,
            registration: None,
            fired: false,
        }
    }

    /// Resolves once a publish changes the watched version, or when the
    /// registration is discarded by the cache. Callers must re-read the
    /// cache afterwards.
    pub async fn changed(&mut self) {
        if self.fired {
            return;
        }
        let _ = (&mut self.rx).await;
        self.fired = true;
    }

    /// True when the version was already stale at creation and no
    /// registration was made.
    pub fn fired_immediately(&self) -> bool {
        self.registration.is_none()
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            if let Some(cache) = registration.cache.upgrade() {
                cache.release(&registration.key, registration.id);
            }
        }
    }
}
