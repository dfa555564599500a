use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use tonic::async_trait;
use tracing::debug;

use super::labels::target_labels;
use super::Mesh;
use super::PrometheusBackend;
use super::Workload;
use super::WorkloadStore;
use crate::constants::DATAPLANE_PATH_PREFIX;
use crate::constants::SCRAPE_SCHEME;
use crate::proto::monitoring_assignment::Target;
use crate::proto::MonitoringAssignment;
use crate::proto::TypedPayload;
use crate::Error;
use crate::GenerationError;
use crate::GroupKey;
use crate::Resource;
use crate::Result;
use crate::SnapshotGenerator;
use crate::MONITORING_ASSIGNMENT_TYPE_URL;

/// Builds one monitoring assignment per workload whose mesh exposes
/// Prometheus metrics.
pub struct MonitoringAssignmentGenerator {
    store: Arc<dyn WorkloadStore>,
}

impl MonitoringAssignmentGenerator {
    pub fn new(store: Arc<dyn WorkloadStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SnapshotGenerator for MonitoringAssignmentGenerator {
    async fn generate(
        &self,
        key: &GroupKey,
    ) -> Result<Vec<Resource>> {
        let meshes = self.store.meshes().await.map_err(store_error)?;
        let workloads = self.store.workloads().await.map_err(store_error)?;

        let resources: Vec<Resource> = build_assignments(&meshes, &workloads, key)
            .into_iter()
            .map(|assignment| {
                Resource::new(
                    assignment.name.clone(),
                    TypedPayload::pack(MONITORING_ASSIGNMENT_TYPE_URL, &assignment),
                )
            })
            .collect();

        debug!(%key, count = resources.len(), "generated monitoring assignments");
        Ok(resources)
    }

    async fn client_ids(&self) -> Result<BTreeSet<String>> {
        let meshes = self.store.meshes().await.map_err(store_error)?;
        Ok(meshes
            .iter()
            .filter_map(|mesh| mesh.prometheus.as_ref())
            .flat_map(|backend| backend.client_ids.iter().cloned())
            .collect())
    }

    fn type_urls(&self) -> Vec<String> {
        vec![MONITORING_ASSIGNMENT_TYPE_URL.to_string()]
    }
}

/// Assignments visible to `key`, sorted by name.
///
/// The default group sees every mesh with a backend; any other group sees
/// only meshes whose backend lists it.
pub fn build_assignments(
    meshes: &[Mesh],
    workloads: &[Workload],
    key: &GroupKey,
) -> Vec<MonitoringAssignment> {
    let backends: HashMap<&str, &PrometheusBackend> = meshes
        .iter()
        .filter_map(|mesh| mesh.prometheus.as_ref().map(|backend| (mesh.name.as_str(), backend)))
        .filter(|(_, backend)| key.is_default() || backend.client_ids.contains(key.as_str()))
        .collect();

    let mut assignments: Vec<MonitoringAssignment> = workloads
        .iter()
        .filter_map(|workload| {
            backends
                .get(workload.mesh.as_str())
                .map(|backend| assignment_for(workload, backend))
        })
        .collect();
    assignments.sort_by(|a, b| a.name.cmp(&b.name));
    assignments
}

fn assignment_for(
    workload: &Workload,
    backend: &PrometheusBackend,
) -> MonitoringAssignment {
    let overrides = workload.prometheus.clone().unwrap_or_default();
    let port = overrides.port.unwrap_or(backend.port);
    let path = overrides.path.unwrap_or_else(|| backend.path.clone());

    MonitoringAssignment {
        name: format!(
            "{DATAPLANE_PATH_PREFIX}/{}/dataplanes/{}",
            workload.mesh, workload.name
        ),
        mesh: workload.mesh.clone(),
        service: workload.service().to_string(),
        targets: vec![Target {
            name: workload.name.clone(),
            scheme: SCRAPE_SCHEME.to_string(),
            address: join_host_port(&workload.address, port),
            metrics_path: path,
            labels: target_labels(workload),
        }],
        labels: Default::default(),
    }
}

fn join_host_port(
    host: &str,
    port: u32,
) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn store_error(e: Error) -> Error {
    match e {
        Error::Generation(_) => e,
        other => GenerationError::Store(other.to_string()).into(),
    }
}
