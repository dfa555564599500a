use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::SERVICE_TAG;

/// A mesh and its optional Prometheus metrics backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mesh {
    pub name: String,
    /// None disables metrics for every workload of the mesh
    #[serde(default)]
    pub prometheus: Option<PrometheusBackend>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrometheusBackend {
    #[serde(default = "default_metrics_port")]
    pub port: u32,
    #[serde(default = "default_metrics_path")]
    pub path: String,
    /// Scrapers that get this mesh in a group of their own
    #[serde(default)]
    pub client_ids: BTreeSet<String>,
}

impl Default for PrometheusBackend {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
            path: default_metrics_path(),
            client_ids: BTreeSet::new(),
        }
    }
}

/// Per-workload override of the mesh backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrometheusOverride {
    #[serde(default)]
    pub port: Option<u32>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbound {
    #[serde(default)]
    pub address: Option<String>,
    pub port: u32,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// One proxied workload (a dataplane).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub mesh: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub inbounds: Vec<Inbound>,
    /// Tags of a gateway workload, which has no inbounds
    #[serde(default)]
    pub gateway_tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub prometheus: Option<PrometheusOverride>,
    /// Platform identity, e.g. `k8s.kuma.io/namespace`
    #[serde(default)]
    pub name_extensions: BTreeMap<String, String>,
}

impl Workload {
    /// Tag sets in declaration order: one per inbound, or the gateway tags.
    pub fn tag_sets(&self) -> Vec<&BTreeMap<String, String>> {
        match &self.gateway_tags {
            Some(tags) if self.inbounds.is_empty() => vec![tags],
            _ => self.inbounds.iter().map(|inbound| &inbound.tags).collect(),
        }
    }

    pub fn first_tags(&self) -> Option<&BTreeMap<String, String>> {
        match &self.gateway_tags {
            Some(tags) if self.inbounds.is_empty() => Some(tags),
            _ => self.inbounds.first().map(|inbound| &inbound.tags),
        }
    }

    /// Service of the first tag set.
    pub fn service(&self) -> &str {
        self.first_tags()
            .and_then(|tags| tags.get(SERVICE_TAG))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Mesh and workload inventory as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub meshes: Vec<Mesh>,
    #[serde(default)]
    pub workloads: Vec<Workload>,
}

fn default_metrics_port() -> u32 {
    5670
}
fn default_metrics_path() -> String {
    "/metrics".into()
}
