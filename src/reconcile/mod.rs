//! Snapshot reconciliation.
//!
//! The [`Reconciler`] turns generator output into versioned snapshots and
//! publishes them only when content changed. Two triggers drive it: the
//! [`ReconcileTicker`] (server-wide, or one watchdog per open stream) and an
//! on-demand call made by the discovery server for groups it has never seen.
mod generator;
mod reconciler;
mod ticker;

pub use generator::*;
pub use reconciler::*;
pub use ticker::*;
