use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::GroupKey;
use crate::Inbound;
use crate::Mesh;
use crate::MemoryWorkloadStore;
use crate::MonitoringAssignmentGenerator;
use crate::PrometheusBackend;
use crate::Reconciler;
use crate::SnapshotCache;
use crate::Workload;

pub(crate) fn prometheus_mesh(name: &str) -> Mesh {
    Mesh {
        name: name.into(),
        prometheus: Some(PrometheusBackend::default()),
    }
}

/// Mesh whose backend addresses `client_ids` individually.
pub(crate) fn dedicated_mesh(
    name: &str,
    client_ids: &[&str],
) -> Mesh {
    Mesh {
        name: name.into(),
        prometheus: Some(PrometheusBackend {
            client_ids: client_ids.iter().map(|id| id.to_string()).collect::<BTreeSet<_>>(),
            ..Default::default()
        }),
    }
}

/// Workload with a single inbound tagged with `service`.
pub(crate) fn service_workload(
    mesh: &str,
    name: &str,
    service: &str,
) -> Workload {
    Workload {
        mesh: mesh.into(),
        name: name.into(),
        address: "192.168.0.1".into(),
        inbounds: vec![Inbound {
            address: None,
            port: 80,
            tags: BTreeMap::from([("kuma.io/service".to_string(), service.to_string())]),
        }],
        ..Default::default()
    }
}

/// Store, cache and reconciler wired to the reference generator.
pub(crate) fn assignment_reconciler(
    store: Arc<MemoryWorkloadStore>,
) -> (Arc<Reconciler>, SnapshotCache) {
    let cache = SnapshotCache::new();
    let generator = MonitoringAssignmentGenerator::new(store);
    (Arc::new(Reconciler::new(Arc::new(generator), cache.clone())), cache)
}

pub(crate) fn default_key() -> GroupKey {
    GroupKey::default_key()
}
