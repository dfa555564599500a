use std::sync::Arc;
use std::time::Duration;

use nanoid::nanoid;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::instrument;
use tracing::trace;

use crate::metrics::FETCH_WAIT_DURATION;
use crate::proto::DiscoveryRequest;
use crate::proto::DiscoveryResponse;
use crate::GroupKey;
use crate::ProtocolError;
use crate::ReconcileTicker;
use crate::Reconciler;
use crate::Result;
use crate::ServerConfig;
use crate::Snapshot;
use crate::TickTarget;

/// How long a fetch may wait for the requested version to go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Answer from the current cache state
    Immediate,
    /// Wait up to the deadline; a zero deadline behaves like `Immediate`
    LongPoll(Duration),
    /// Wait until the version changes (stream cycles)
    UntilChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Response(DiscoveryResponse),
    /// The requester already holds the current version
    NotModified,
}

/// Shared handle behind both bindings. Cheap to clone.
#[derive(Clone)]
pub struct DiscoveryServer {
    pub(super) reconciler: Arc<Reconciler>,
    pub(super) config: ServerConfig,
    /// Parent of every background task the server spawns
    pub(super) token: CancellationToken,
}

impl DiscoveryServer {
    pub fn new(
        reconciler: Arc<Reconciler>,
        config: ServerConfig,
    ) -> Self {
        Self {
            reconciler,
            config,
            token: CancellationToken::new(),
        }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Starts the server-wide refresh ticker: every known group plus the
    /// default group, once per refresh interval.
    pub fn start(&self) -> JoinHandle<()> {
        ReconcileTicker::new(
            self.reconciler.clone(),
            self.config.refresh_interval(),
            TickTarget::AllGroups,
        )
        .spawn(self.token.child_token())
    }

    /// Stops the refresh ticker, stream watchdogs and open streams.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Reconciles `key` once per refresh interval until `token` fires.
    pub(super) fn spawn_watchdog(
        &self,
        key: GroupKey,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        ReconcileTicker::new(
            self.reconciler.clone(),
            self.config.refresh_interval(),
            TickTarget::Group(key),
        )
        .spawn(token)
    }

    /// Answers one discovery request.
    ///
    /// Unknown client ids are served from the default group. A group without
    /// a snapshot is reconciled first and a generation failure is returned
    /// to the caller. When the requested version is current the call waits
    /// according to `mode`, then always re-reads the cache.
    #[instrument(skip_all, fields(node = %request.node_id(), version = %request.version_info))]
    pub async fn fetch(
        &self,
        request: &DiscoveryRequest,
        mode: FetchMode,
    ) -> Result<FetchOutcome> {
        let type_url = self.resolve_type(request)?;
        let key = self.reconciler.resolve_key(request.node_id());

        if self.reconciler.needs_reconciliation(&key) {
            debug!(%key, "first request for group, reconciling before answering");
            self.reconciler.reconcile(&key).await?;
        }

        let cache = self.reconciler.cache();
        if cache.get_snapshot(&key).version(&type_url) == request.version_info {
            self.wait_for_change(&key, &type_url, &request.version_info, mode)
                .await;
        }

        let snapshot = cache.get_snapshot(&key);
        if snapshot.version(&type_url) == request.version_info {
            trace!(%key, "version up to date");
            return Ok(FetchOutcome::NotModified);
        }

        Ok(FetchOutcome::Response(build_response(&snapshot, &type_url)))
    }

    fn resolve_type(
        &self,
        request: &DiscoveryRequest,
    ) -> Result<String> {
        let supported = self.reconciler.type_urls();
        if request.type_url.is_empty() {
            return match supported.as_slice() {
                [only] => Ok(only.clone()),
                _ => Err(ProtocolError::MalformedRequest("type_url is required".into()).into()),
            };
        }
        if supported.iter().any(|t| *t == request.type_url) {
            Ok(request.type_url.clone())
        } else {
            Err(ProtocolError::UnsupportedType(request.type_url.clone()).into())
        }
    }

    async fn wait_for_change(
        &self,
        key: &GroupKey,
        type_url: &str,
        version: &str,
        mode: FetchMode,
    ) {
        let (deadline, label) = match mode {
            FetchMode::Immediate => return,
            FetchMode::LongPoll(timeout) if timeout.is_zero() => return,
            FetchMode::LongPoll(timeout) => (Some(timeout), "long_poll"),
            FetchMode::UntilChanged => (None, "stream"),
        };

        let mut watch = self.reconciler.cache().create_watch(key, type_url, version);
        let started = Instant::now();
        match deadline {
            Some(timeout) => {
                if tokio::time::timeout(timeout, watch.changed()).await.is_err() {
                    trace!(%key, ?timeout, "long poll deadline reached");
                }
            }
            None => watch.changed().await,
        }
        FETCH_WAIT_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_millis() as f64);
    }
}

fn build_response(
    snapshot: &Snapshot,
    type_url: &str,
) -> DiscoveryResponse {
    DiscoveryResponse {
        version_info: snapshot.version(type_url).to_string(),
        resources: snapshot
            .resources(type_url)
            .map(|resource| resource.payload.clone())
            .collect(),
        type_url: type_url.to_string(),
        nonce: nanoid!(),
    }
}
