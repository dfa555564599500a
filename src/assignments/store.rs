use std::path::Path;

use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
use tonic::async_trait;
use tracing::info;

use super::Inventory;
use super::Mesh;
use super::Workload;
use crate::GenerationError;
use crate::Result;

/// Read side of the mesh and workload inventory.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkloadStore: Send + Sync + 'static {
    async fn meshes(&self) -> Result<Vec<Mesh>>;

    async fn workloads(&self) -> Result<Vec<Workload>>;
}

/// In-memory inventory. Updates become visible to the next reconciliation.
#[derive(Debug, Default)]
pub struct MemoryWorkloadStore {
    meshes: DashMap<String, Mesh>,
    /// Keyed by `(mesh, name)`
    workloads: DashMap<(String, String), Workload>,
}

impl MemoryWorkloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_inventory(inventory: Inventory) -> Self {
        let store = Self::new();
        for mesh in inventory.meshes {
            store.upsert_mesh(mesh);
        }
        for workload in inventory.workloads {
            store.upsert_workload(workload);
        }
        store
    }

    /// Reads a JSON inventory file.
    pub async fn load_inventory(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await?;
        let inventory: Inventory = serde_json::from_slice(&raw).map_err(|e| {
            GenerationError::Store(format!("invalid inventory {}: {}", path.display(), e))
        })?;
        info!(
            meshes = inventory.meshes.len(),
            workloads = inventory.workloads.len(),
            "loaded workload inventory from {}",
            path.display()
        );
        Ok(Self::from_inventory(inventory))
    }

    pub fn upsert_mesh(
        &self,
        mesh: Mesh,
    ) {
        self.meshes.insert(mesh.name.clone(), mesh);
    }

    pub fn remove_mesh(
        &self,
        name: &str,
    ) -> Option<Mesh> {
        self.meshes.remove(name).map(|(_, mesh)| mesh)
    }

    pub fn upsert_workload(
        &self,
        workload: Workload,
    ) {
        self.workloads
            .insert((workload.mesh.clone(), workload.name.clone()), workload);
    }

    pub fn remove_workload(
        &self,
        mesh: &str,
        name: &str,
    ) -> Option<Workload> {
        self.workloads
            .remove(&(mesh.to_string(), name.to_string()))
            .map(|(_, workload)| workload)
    }
}

#[async_trait]
impl WorkloadStore for MemoryWorkloadStore {
    async fn meshes(&self) -> Result<Vec<Mesh>> {
        let mut meshes: Vec<Mesh> = self.meshes.iter().map(|entry| entry.value().clone()).collect();
        meshes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(meshes)
    }

    async fn workloads(&self) -> Result<Vec<Workload>> {
        let mut workloads: Vec<Workload> =
            self.workloads.iter().map(|entry| entry.value().clone()).collect();
        workloads.sort_by(|a, b| (&a.mesh, &a.name).cmp(&(&b.mesh, &b.name)));
        Ok(workloads)
    }
}
