//! Monitoring Assignment Discovery Service.
//!
//! An xDS-style discovery engine: versioned per-group snapshots, a watch
//! based long-poll/stream server and a supervised client that turns
//! monitoring assignments into scrape target groups.
//!
//! - [`SnapshotCache`] - snapshots and one-shot watches
//! - [`Reconciler`] / [`ReconcileTicker`] - publish-if-changed regeneration
//! - [`MonitoringAssignmentGenerator`] - reference generator over a [`WorkloadStore`]
//! - [`DiscoveryServer`] - gRPC and REST bindings
//! - [`MadsClient`] / [`Supervisor`] - discovery client
mod assignments;
mod cache;
mod client;
mod config;
mod constants;
mod errors;
pub mod metrics;
pub mod proto;
mod reconcile;
mod server;
mod snapshot;
pub mod utils;

pub use assignments::*;
pub use cache::*;
pub use client::*;
pub use config::*;
pub use constants::*;
pub use errors::*;
pub use reconcile::*;
pub use server::*;
pub use snapshot::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
