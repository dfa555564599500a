//! Reference [`crate::SnapshotGenerator`]: monitoring assignments computed
//! from mesh and workload inventory.
//!
//! Every workload of a mesh with a Prometheus backend yields one
//! `MonitoringAssignment` telling a scraper where its metrics endpoint is and
//! which labels to attach.
mod generator;
mod labels;
mod store;
mod workload;

pub use generator::*;
pub use store::*;
pub use workload::*;
